//! Spatial lookup over laid-out node positions.
//!
//! Used for hit testing and for finding a drop target when a node is
//! dragged onto another one.

mod rtree;

pub use rtree::{PlacedNode, SpatialIndex};
