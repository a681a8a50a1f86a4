//! Tree - a thin view over a root node in the arena.
//!
//! A Tree owns nothing but its root id and row height. Any node can serve as
//! the root of a temporary Tree, which is how subtrees are traversed,
//! serialised and laid out.

use serde::Serialize;

use crate::codec;
use crate::config::LayoutConfig;
use crate::error::{Result, SyntreeError};
use crate::graph::{NodeArena, NodeId};
use crate::layout::{Distributor, LayoutReport, Renderer};

/// Default vertical distance between parent and child rows.
pub const DEFAULT_ROW_HEIGHT: f32 = 70.0;

/// Nested view of a subtree, mirroring the parent/child shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subtree {
    pub id: NodeId,
    pub label: String,
    pub children: Vec<Subtree>,
}

/// Data-space extent of a laid-out tree, label boxes included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// A root id plus the spacing used to lay out beneath it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tree {
    root: NodeId,
    pub row_height: f32,
}

impl Tree {
    /// Wrap an existing root with the default row height.
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            row_height: DEFAULT_ROW_HEIGHT,
        }
    }

    pub fn with_row_height(root: NodeId, row_height: f32) -> Self {
        Self { root, row_height }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes reachable from the root.
    pub fn len(&self, arena: &NodeArena) -> Result<usize> {
        Ok(arena.preorder(self.root)?.len())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Flat pre-order descendants of `node` (the root when `None`).
    ///
    /// With `inclusive` the starting node comes first.
    pub fn descendants(
        &self,
        arena: &NodeArena,
        node: Option<NodeId>,
        inclusive: bool,
    ) -> Result<Vec<NodeId>> {
        let mut order = arena.preorder(node.unwrap_or(self.root))?;
        if !inclusive {
            order.remove(0);
        }
        Ok(order)
    }

    /// Nested descendants of `node`.
    ///
    /// Inclusive returns a single entry for `node`; otherwise one entry per
    /// child.
    pub fn descendants_nested(
        &self,
        arena: &NodeArena,
        node: Option<NodeId>,
        inclusive: bool,
    ) -> Result<Vec<Subtree>> {
        let start = node.unwrap_or(self.root);
        if inclusive {
            return Ok(vec![Self::nest(arena, start)?]);
        }
        arena
            .children(start)?
            .iter()
            .map(|&child| Self::nest(arena, child))
            .collect()
    }

    fn nest(arena: &NodeArena, id: NodeId) -> Result<Subtree> {
        let node = arena.get(id)?;
        let children = node
            .children()
            .iter()
            .map(|&child| Self::nest(arena, child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Subtree {
            id,
            label: node.label.clone(),
            children,
        })
    }

    /// Number of edges between `from` and its descendant `to`.
    pub fn node_offset(&self, arena: &NodeArena, from: NodeId, to: NodeId) -> Result<usize> {
        arena.get(from)?;
        let mut current = to;
        let mut offset = 0;
        while current != from {
            match arena.parent(current)? {
                Some(parent) => {
                    current = parent;
                    offset += 1;
                }
                None => {
                    return Err(SyntreeError::NotAncestor {
                        ancestor: from,
                        descendant: to,
                    });
                }
            }
        }
        Ok(offset)
    }

    /// Every node exactly `offset` edges below `node` (the root when `None`),
    /// left to right.
    pub fn nodes_by_offset(
        &self,
        arena: &NodeArena,
        offset: usize,
        node: Option<NodeId>,
    ) -> Result<Vec<NodeId>> {
        let mut row = vec![node.unwrap_or(self.root)];
        arena.get(row[0])?;
        for _ in 0..offset {
            let mut next = Vec::new();
            for id in row {
                next.extend_from_slice(arena.children(id)?);
            }
            if next.is_empty() {
                return Ok(next);
            }
            row = next;
        }
        Ok(row)
    }

    /// Leaf reached by always descending into the first child.
    pub fn left_most(arena: &NodeArena, node: NodeId) -> Result<NodeId> {
        let mut current = node;
        while let Some(&first) = arena.children(current)?.first() {
            current = first;
        }
        Ok(current)
    }

    /// Leaf reached by always descending into the last child.
    pub fn right_most(arena: &NodeArena, node: NodeId) -> Result<NodeId> {
        let mut current = node;
        while let Some(&last) = arena.children(current)?.last() {
            current = last;
        }
        Ok(current)
    }

    // =========================================================================
    // Layout & Export
    // =========================================================================

    /// Lay out the children of the root, rippling up through its ancestors.
    pub fn distribute<R: Renderer + ?Sized>(
        &self,
        arena: &mut NodeArena,
        renderer: &mut R,
        config: &LayoutConfig,
    ) -> Result<LayoutReport> {
        let config = LayoutConfig {
            row_height: self.row_height,
            ..config.clone()
        };
        Distributor::new(config).distribute(arena, renderer, self.root)
    }

    /// Like [`Tree::distribute`] but starting from an explicit angle.
    pub fn distribute_with_angle<R: Renderer + ?Sized>(
        &self,
        arena: &mut NodeArena,
        renderer: &mut R,
        config: &LayoutConfig,
        angle: f32,
    ) -> Result<LayoutReport> {
        let config = LayoutConfig {
            row_height: self.row_height,
            ..config.clone()
        };
        Distributor::new(config).distribute_with_angle(arena, renderer, self.root, angle)
    }

    /// Lay out every level of the tree, deepest first.
    pub fn distribute_all<R: Renderer + ?Sized>(
        &self,
        arena: &mut NodeArena,
        renderer: &mut R,
        config: &LayoutConfig,
    ) -> Result<LayoutReport> {
        let config = LayoutConfig {
            row_height: self.row_height,
            ..config.clone()
        };
        Distributor::new(config).distribute_subtree(arena, renderer, self.root)
    }

    /// Serialise this tree as a treestring.
    pub fn treestring(&self, arena: &NodeArena) -> Result<String> {
        codec::encode(arena, self.root)
    }

    /// One-way bracket notation export.
    pub fn bracket_notation(&self, arena: &NodeArena, node: Option<NodeId>) -> Result<String> {
        codec::bracket_notation(arena, node.unwrap_or(self.root))
    }

    /// Extent of every label box in the tree.
    pub fn bounds<R: Renderer + ?Sized>(&self, arena: &NodeArena, renderer: &R) -> Result<Bounds> {
        let mut bounds = Bounds {
            left: f32::INFINITY,
            top: f32::INFINITY,
            right: f32::NEG_INFINITY,
            bottom: f32::NEG_INFINITY,
        };
        for id in arena.preorder(self.root)? {
            let node = arena.get(id)?;
            let bbox = renderer.label_bbox(id, &node.label);
            let pos = node.position;
            bounds.left = bounds.left.min(pos.x - bbox.w / 2.0);
            bounds.right = bounds.right.max(pos.x + bbox.w / 2.0);
            bounds.top = bounds.top.min(pos.y - bbox.h / 2.0);
            bounds.bottom = bounds.bottom.max(pos.y + bbox.h / 2.0);
        }
        Ok(bounds)
    }

    /// Delete every node reachable from the root.
    ///
    /// Returns the removed ids in pre-order.
    pub fn delete(self, arena: &mut NodeArena) -> Result<Vec<NodeId>> {
        arena.remove_subtree(self.root)
    }
}
