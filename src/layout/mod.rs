//! Layout for syntax trees.
//!
//! Layout works purely in data space: it reads label sizes from a
//! [`Renderer`], writes node positions into the arena, and then reports the
//! new positions back to the renderer.

pub mod distribute;
pub mod render;

pub use distribute::{Distributor, LayoutReport};
pub use render::{Renderer, TextMetrics};
