//! R-tree over node positions, built on rstar.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::Result;
use crate::graph::{NodeArena, NodeId};

/// A node's id at its laid-out position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedNode {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
}

impl PlacedNode {
    pub fn new(id: NodeId, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }
}

impl RTreeObject for PlacedNode {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for PlacedNode {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f32; 2]) -> bool {
        (self.x - point[0]).abs() < f32::EPSILON && (self.y - point[1]).abs() < f32::EPSILON
    }
}

/// Index of node positions.
///
/// Positions change on every layout pass, so the index is a snapshot:
/// callers rebuild it from the arena before querying.
pub struct SpatialIndex {
    tree: RTree<PlacedNode>,
}

impl SpatialIndex {
    /// Bulk-load every node of the subtree under `root`.
    pub fn from_subtree(arena: &NodeArena, root: NodeId) -> Result<Self> {
        let placed = arena
            .preorder(root)?
            .into_iter()
            .map(|id| {
                let position = arena.position(id)?;
                Ok(PlacedNode::new(id, position.x, position.y))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tree: RTree::bulk_load(placed),
        })
    }

    /// Nearest node whose id is not in `exclude`.
    ///
    /// Dragging excludes the dragged subtree so a node never targets itself.
    pub fn nearest_excluding(&self, x: f32, y: f32, exclude: &[NodeId]) -> Option<NodeId> {
        self.tree
            .nearest_neighbor_iter(&[x, y])
            .find(|placed| !exclude.contains(&placed.id))
            .map(|placed| placed.id)
    }
}
