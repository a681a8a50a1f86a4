//! Tree data structures.
//!
//! Nodes live in a [`NodeArena`] backed by petgraph's StableGraph, indexed
//! by stable [`NodeId`]. Parent and child links are id references, so a
//! [`crate::tree::Tree`] is just a root id plus a row height.

mod arena;
mod arrow;
mod node;

pub use arena::NodeArena;
pub use arrow::Arrow;
pub use node::{BBox, EditOutcome, EditPhase, Node, NodeId, NodeState, Position};
