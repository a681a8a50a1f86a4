//! Movement arrows.
//!
//! An arrow annotates movement between two nodes of a tree (e.g. a trace
//! and its antecedent). It references both ends by id and owns nothing.

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// A movement arrow from one node to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrow {
    /// Session-unique id drawn from the same pool as node ids.
    pub id: u32,
    pub from: NodeId,
    pub to: NodeId,
}

impl Arrow {
    pub fn new(id: u32, from: NodeId, to: NodeId) -> Self {
        Self { id, from, to }
    }

    /// Whether either end is `node`.
    #[inline]
    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }
}
