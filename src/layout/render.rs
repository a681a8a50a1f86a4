//! Rendering collaborator contract.
//!
//! The core never draws. It asks the renderer how big a label is, tells it
//! where nodes ended up, and tells it when nodes disappear.

use crate::graph::{BBox, NodeId, Position};

/// What the tree core needs from whatever draws it.
pub trait Renderer {
    /// Bounding box of `label` as it would be drawn for node `id`.
    fn label_bbox(&self, id: NodeId, label: &str) -> BBox;

    /// A node's position changed.
    fn move_node(&mut self, _id: NodeId, _position: Position) {}

    /// A node was removed from the model.
    fn delete_node(&mut self, _id: NodeId) {}
}

/// Headless renderer that estimates label size from character count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Advance per character.
    pub char_width: f32,
    /// Line height.
    pub line_height: f32,
    /// Horizontal padding added on each side.
    pub padding: f32,
}

impl TextMetrics {
    /// Estimate for a sans-serif 14px label.
    pub fn measure(&self, label: &str) -> BBox {
        let chars = label.chars().count().max(1) as f32;
        BBox::new(chars * self.char_width + 2.0 * self.padding, self.line_height)
    }
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 18.0,
            padding: 2.0,
        }
    }
}

impl Renderer for TextMetrics {
    fn label_bbox(&self, _id: NodeId, label: &str) -> BBox {
        self.measure(label)
    }
}
