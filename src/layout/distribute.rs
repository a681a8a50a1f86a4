//! Angular spread layout with collision-driven widening.
//!
//! Children of a node are placed one row below it, evenly spaced across a
//! wedge of `angle` degrees opening downward from the parent:
//!
//! ```text
//! width = 2 · row_height · tan(angle / 2)
//! ```
//!
//! After placement every adjacent pair of sibling subtrees is checked by
//! comparing the right-most leaf of the left subtree with the left-most leaf
//! of the right subtree. The worst overlap (plus padding) is added to every
//! interval, the angle is recomputed from the new width and the children are
//! placed again. Once a node is clean its parent is re-spread the same way,
//! up to the root.
//!
//! Moving a child moves its whole subtree, so grandchildren keep the shape
//! computed for them earlier.

use serde::Serialize;

use super::render::Renderer;
use crate::config::LayoutConfig;
use crate::error::{Result, SyntreeError};
use crate::graph::{NodeArena, NodeId};
use crate::tree::Tree;

/// Summary of one [`Distributor::distribute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutReport {
    /// Angle (degrees) finally used for the starting node's children.
    pub angle: f32,
    /// Widening passes needed at the starting node.
    pub widen_passes: u32,
    /// Nodes reported to the renderer afterwards.
    pub moved: usize,
}

/// Result of spreading a single node's children.
#[derive(Debug, Clone, Copy)]
struct Spread {
    angle: f32,
    widen_passes: u32,
}

/// Computes child positions for the collision-free angular layout.
#[derive(Debug, Clone)]
pub struct Distributor {
    config: LayoutConfig,
}

impl Distributor {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lay out under `start` with the configured angle, then every ancestor.
    pub fn distribute<R: Renderer + ?Sized>(
        &self,
        arena: &mut NodeArena,
        renderer: &mut R,
        start: NodeId,
    ) -> Result<LayoutReport> {
        self.distribute_with_angle(arena, renderer, start, self.config.spread_angle)
    }

    /// Lay out under `start` beginning from `angle` degrees. Ancestors are
    /// always re-spread from the configured angle.
    pub fn distribute_with_angle<R: Renderer + ?Sized>(
        &self,
        arena: &mut NodeArena,
        renderer: &mut R,
        start: NodeId,
        angle: f32,
    ) -> Result<LayoutReport> {
        if !(angle > 0.0 && angle < 180.0) {
            return Err(SyntreeError::InvalidArgument(format!(
                "spread angle must lie strictly between 0 and 180 degrees, got {angle}"
            )));
        }
        arena.get(start)?;

        let first = self.spread(arena, &*renderer, start, angle)?;
        let moved = self.ripple_and_notify(arena, renderer, start)?;

        Ok(LayoutReport {
            angle: first.angle,
            widen_passes: first.widen_passes,
            moved,
        })
    }

    /// Lay out every level under `start`, deepest first, then its ancestors.
    ///
    /// Used for trees whose nodes were never placed, such as a freshly
    /// decoded treestring.
    pub fn distribute_subtree<R: Renderer + ?Sized>(
        &self,
        arena: &mut NodeArena,
        renderer: &mut R,
        start: NodeId,
    ) -> Result<LayoutReport> {
        let order = arena.preorder(start)?;
        let mut first = Spread {
            angle: self.config.spread_angle,
            widen_passes: 0,
        };
        // Reverse pre-order visits every node after all of its descendants.
        for &id in order.iter().rev() {
            let spread = self.spread(arena, &*renderer, id, self.config.spread_angle)?;
            if id == start {
                first = spread;
            }
        }
        let moved = self.ripple_and_notify(arena, renderer, start)?;

        Ok(LayoutReport {
            angle: first.angle,
            widen_passes: first.widen_passes,
            moved,
        })
    }

    /// Re-spread every ancestor of `start`, then report the whole tree.
    fn ripple_and_notify<R: Renderer + ?Sized>(
        &self,
        arena: &mut NodeArena,
        renderer: &mut R,
        start: NodeId,
    ) -> Result<usize> {
        let mut current = arena.parent(start)?;
        while let Some(id) = current {
            self.spread(arena, &*renderer, id, self.config.spread_angle)?;
            current = arena.parent(id)?;
        }

        let root = arena.root_of(start)?;
        let nodes = arena.preorder(root)?;
        for &id in &nodes {
            renderer.move_node(id, arena.position(id)?);
        }
        Ok(nodes.len())
    }

    /// Place the children of `id`, widening until no sibling subtrees touch.
    fn spread<R: Renderer + ?Sized>(
        &self,
        arena: &mut NodeArena,
        renderer: &R,
        id: NodeId,
        angle: f32,
    ) -> Result<Spread> {
        let children = arena.children(id)?.to_vec();
        let origin = arena.position(id)?;
        let row_height = self.config.row_height;
        let target_y = origin.y + row_height;

        match children.as_slice() {
            [] => {
                return Ok(Spread {
                    angle,
                    widen_passes: 0,
                });
            }
            [only] => {
                Self::place(arena, *only, origin.x, target_y)?;
                return Ok(Spread {
                    angle,
                    widen_passes: 0,
                });
            }
            _ => {}
        }

        // The width is the loop state; the angle is derived from it once at
        // the end so repeated tan/atan round trips cannot stall the loop.
        let gaps = (children.len() - 1) as f32;
        let mut width = 2.0 * row_height * (angle / 2.0).to_radians().tan();
        let mut widen_passes = 0;
        loop {
            let left = origin.x - width / 2.0;
            let interval = width / gaps;
            for (i, &child) in children.iter().enumerate() {
                Self::place(arena, child, left + interval * i as f32, target_y)?;
            }

            let needed = self.overlap(arena, renderer, &children)?;
            if needed <= 0.0 {
                break;
            }

            widen_passes += 1;
            if widen_passes > self.config.max_widen_passes || !needed.is_finite() {
                tracing::warn!(node = id.0, passes = widen_passes, "layout widening ran away");
                return Err(SyntreeError::Layout {
                    node: id,
                    passes: widen_passes.min(self.config.max_widen_passes),
                });
            }

            // Every interval grows by the worst collision, so one pass
            // separates every pair no matter how many siblings there are.
            width += needed * gaps;
            tracing::trace!(node = id.0, pass = widen_passes, width, "widening spread");
        }

        let angle = if widen_passes == 0 {
            angle
        } else {
            2.0 * (width / (2.0 * row_height)).atan().to_degrees()
        };
        Ok(Spread {
            angle,
            widen_passes,
        })
    }

    /// Largest gap (overlap plus padding) any adjacent pair still needs.
    fn overlap<R: Renderer + ?Sized>(
        &self,
        arena: &NodeArena,
        renderer: &R,
        children: &[NodeId],
    ) -> Result<f32> {
        let mut needed: f32 = 0.0;
        for pair in children.windows(2) {
            let inner_right = Tree::right_most(arena, pair[0])?;
            let inner_left = Tree::left_most(arena, pair[1])?;

            let right_edge = {
                let node = arena.get(inner_right)?;
                node.position.x + renderer.label_bbox(inner_right, &node.label).w / 2.0
            };
            let left_edge = {
                let node = arena.get(inner_left)?;
                node.position.x - renderer.label_bbox(inner_left, &node.label).w / 2.0
            };

            // NaN edges count as a collision that can never be cleared.
            if !(right_edge < left_edge) {
                let gap = (right_edge - left_edge).abs() + self.config.collision_padding;
                needed = if gap.is_nan() { f32::INFINITY } else { needed.max(gap) };
            }
        }
        Ok(needed)
    }

    fn place(arena: &mut NodeArena, id: NodeId, x: f32, y: f32) -> Result<()> {
        let current = arena.position(id)?;
        arena.translate_subtree(id, x - current.x, y - current.y)
    }
}

impl Default for Distributor {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BBox, Node, Position};
    use crate::layout::render::TextMetrics;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Recorder {
        moved: Vec<NodeId>,
    }

    impl Renderer for Recorder {
        fn label_bbox(&self, _id: NodeId, label: &str) -> BBox {
            TextMetrics::default().measure(label)
        }

        fn move_node(&mut self, id: NodeId, _position: Position) {
            self.moved.push(id);
        }
    }

    fn build(labels: &[(u32, &str)], edges: &[(u32, u32)]) -> NodeArena {
        let mut arena = NodeArena::new();
        for &(id, label) in labels {
            arena.insert(Node::with_label(NodeId(id), label)).unwrap();
        }
        for &(parent, child) in edges {
            arena.add_child(NodeId(parent), NodeId(child), None).unwrap();
        }
        arena.move_node(NodeId(labels[0].0), 100.0, 50.0).unwrap();
        arena
    }

    fn x(arena: &NodeArena, id: u32) -> f32 {
        arena.position(NodeId(id)).unwrap().x
    }

    #[test]
    fn test_no_children_is_noop() {
        let mut arena = build(&[(1, "S")], &[]);
        let report = Distributor::default()
            .distribute(&mut arena, &mut TextMetrics::default(), NodeId(1))
            .unwrap();
        assert_eq!(report.widen_passes, 0);
        assert_eq!(arena.position(NodeId(1)).unwrap(), Position::new(100.0, 50.0));
    }

    #[test]
    fn test_single_child_directly_below() {
        let mut arena = build(&[(1, "S"), (2, "VP")], &[(1, 2)]);
        Distributor::default()
            .distribute(&mut arena, &mut TextMetrics::default(), NodeId(1))
            .unwrap();
        assert_eq!(arena.position(NodeId(2)).unwrap(), Position::new(100.0, 120.0));
    }

    #[test]
    fn test_two_children_spread_symmetrically() {
        let mut arena = build(&[(1, "S"), (2, "NP"), (3, "VP")], &[(1, 2), (1, 3)]);
        let report = Distributor::default()
            .distribute(&mut arena, &mut TextMetrics::default(), NodeId(1))
            .unwrap();

        let half = 70.0 * 30f32.to_radians().tan();
        assert!((x(&arena, 2) - (100.0 - half)).abs() < 1e-3);
        assert!((x(&arena, 3) - (100.0 + half)).abs() < 1e-3);
        assert_eq!(arena.position(NodeId(2)).unwrap().y, 120.0);
        assert_eq!(report.widen_passes, 0);
        assert_eq!(report.angle, 60.0);
    }

    #[test]
    fn test_wide_middle_label_widens_angle() {
        let wide = "Ooooooooooooooooooooooooooooooooooooooooooooooooooooo";
        let mut arena = build(
            &[(1, "S"), (2, "A"), (3, wide), (4, "B")],
            &[(1, 2), (1, 3), (1, 4)],
        );
        let report = Distributor::default()
            .distribute(&mut arena, &mut TextMetrics::default(), NodeId(1))
            .unwrap();

        assert!(report.widen_passes >= 1);
        assert!(report.angle > 60.0);

        let metrics = TextMetrics::default();
        let a_right = x(&arena, 2) + metrics.measure("A").w / 2.0;
        let wide_left = x(&arena, 3) - metrics.measure(wide).w / 2.0;
        let wide_right = x(&arena, 3) + metrics.measure(wide).w / 2.0;
        let b_left = x(&arena, 4) - metrics.measure("B").w / 2.0;
        assert!(a_right < wide_left);
        assert!(wide_right < b_left);
    }

    #[test]
    fn test_children_move_with_their_subtree() {
        let mut arena = build(
            &[(1, "S"), (2, "NP"), (3, "VP"), (4, "V"), (5, "NP")],
            &[(1, 2), (1, 3), (3, 4), (3, 5)],
        );
        let distributor = Distributor::default();
        distributor
            .distribute(&mut arena, &mut TextMetrics::default(), NodeId(3))
            .unwrap();

        let vp = arena.position(NodeId(3)).unwrap();
        let v = arena.position(NodeId(4)).unwrap();
        let obj = arena.position(NodeId(5)).unwrap();
        assert_eq!(v.y, vp.y + 70.0);
        assert!(((v.x + obj.x) / 2.0 - vp.x).abs() < 1e-3);
        // Root is never moved.
        assert_eq!(arena.position(NodeId(1)).unwrap(), Position::new(100.0, 50.0));
    }

    #[test]
    fn test_ripples_to_root_and_reports_moves() {
        let mut arena = build(
            &[(1, "S"), (2, "NP"), (3, "VP"), (4, "V")],
            &[(1, 2), (1, 3), (3, 4)],
        );
        let mut recorder = Recorder::default();
        let report = Distributor::default()
            .distribute(&mut arena, &mut recorder, NodeId(3))
            .unwrap();

        assert_eq!(report.moved, 4);
        assert_eq!(recorder.moved.len(), 4);
        assert_eq!(arena.position(NodeId(3)).unwrap().y, 120.0);
        assert_eq!(arena.position(NodeId(4)).unwrap().y, 190.0);
    }

    #[test]
    fn test_runaway_widening_is_reported() {
        struct Huge;
        impl Renderer for Huge {
            fn label_bbox(&self, _id: NodeId, _label: &str) -> BBox {
                BBox::new(f32::INFINITY, 10.0)
            }
        }

        let mut arena = build(&[(1, "S"), (2, "A"), (3, "B")], &[(1, 2), (1, 3)]);
        let distributor = Distributor::new(LayoutConfig {
            max_widen_passes: 4,
            ..LayoutConfig::default()
        });
        let err = distributor
            .distribute(&mut arena, &mut Huge, NodeId(1))
            .unwrap_err();
        assert!(matches!(err, SyntreeError::Layout { node: NodeId(1), .. }));
    }

    #[test]
    fn test_wide_row_converges_in_one_widening() {
        let long = "x".repeat(300);
        let mut labels: Vec<(u32, String)> = vec![(0, "S".to_string())];
        for i in 1..=200u32 {
            let label = if i == 100 { long.clone() } else { "A".to_string() };
            labels.push((i, label));
        }
        let borrowed: Vec<(u32, &str)> =
            labels.iter().map(|(id, label)| (*id, label.as_str())).collect();
        let edges: Vec<(u32, u32)> = (1..=200).map(|i| (0, i)).collect();
        let mut arena = build(&borrowed, &edges);

        let report = Distributor::default()
            .distribute(&mut arena, &mut TextMetrics::default(), NodeId(0))
            .unwrap();
        assert!(report.widen_passes <= 2, "took {} passes", report.widen_passes);
        assert!(report.angle > 60.0 && report.angle < 180.0);

        let metrics = TextMetrics::default();
        let children = arena.children(NodeId(0)).unwrap().to_vec();
        for pair in children.windows(2) {
            let left = arena.get(pair[0]).unwrap();
            let right = arena.get(pair[1]).unwrap();
            assert!(
                left.position.x + metrics.measure(&left.label).w / 2.0
                    < right.position.x - metrics.measure(&right.label).w / 2.0
            );
        }
    }

    #[test]
    fn test_distribute_subtree_places_every_level() {
        // Nothing has been placed yet: everything sits on the root.
        let mut arena = build(
            &[(1, "S"), (2, "NP"), (3, "VP"), (4, "V"), (5, "NP")],
            &[(1, 2), (1, 3), (3, 4), (3, 5)],
        );
        for id in 2..=5 {
            arena.move_node(NodeId(id), 100.0, 50.0).unwrap();
        }

        let report = Distributor::default()
            .distribute_subtree(&mut arena, &mut TextMetrics::default(), NodeId(1))
            .unwrap();

        assert_eq!(report.moved, 5);
        assert_eq!(arena.position(NodeId(4)).unwrap().y, 190.0);
        assert_eq!(arena.position(NodeId(5)).unwrap().y, 190.0);
        assert!(x(&arena, 4) < x(&arena, 3));
        assert!(x(&arena, 5) > x(&arena, 3));
        assert!(x(&arena, 2) < x(&arena, 3));
    }

    #[test]
    fn test_rejects_bad_angle() {
        let mut arena = build(&[(1, "S")], &[]);
        assert!(matches!(
            Distributor::default().distribute_with_angle(
                &mut arena,
                &mut TextMetrics::default(),
                NodeId(1),
                0.0
            ),
            Err(SyntreeError::InvalidArgument(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_sibling_leaves_never_overlap(labels in prop::collection::vec("[A-Za-z]{1,24}", 2..7)) {
            let mut arena = NodeArena::new();
            arena.insert(Node::with_label(NodeId(0), "S")).unwrap();
            for (i, label) in labels.iter().enumerate() {
                let id = NodeId(i as u32 + 1);
                arena.insert(Node::with_label(id, label.clone())).unwrap();
                arena.add_child(NodeId(0), id, None).unwrap();
            }

            let metrics = TextMetrics::default();
            Distributor::default()
                .distribute(&mut arena, &mut TextMetrics::default(), NodeId(0))
                .unwrap();

            let children = arena.children(NodeId(0)).unwrap().to_vec();
            for pair in children.windows(2) {
                let left = arena.get(pair[0]).unwrap();
                let right = arena.get(pair[1]).unwrap();
                let left_edge = left.position.x + metrics.measure(&left.label).w / 2.0;
                let right_edge = right.position.x - metrics.measure(&right.label).w / 2.0;
                prop_assert!(left_edge < right_edge);
            }
        }
    }
}
