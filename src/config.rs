//! Typed session configuration.
//!
//! Every option has a single default here. From JavaScript the same shape is
//! accepted as a plain object (camelCase keys, any subset).

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyntreeError};
use crate::graph::Position;

/// Layout tuning for [`crate::layout::distribute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Vertical distance between a parent and its children.
    pub row_height: f32,
    /// Initial spread angle (degrees) for multiple children.
    pub spread_angle: f32,
    /// Extra width added per detected subtree collision.
    pub collision_padding: f32,
    /// Widening passes allowed per node before layout gives up.
    pub max_widen_passes: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_height: 70.0,
            spread_angle: 60.0,
            collision_padding: 20.0,
            max_widen_passes: 256,
        }
    }
}

/// Retention policy for the action history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Maximum number of actions kept; `None` keeps everything.
    pub limit: Option<usize>,
}

/// Identifier generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdConfig {
    /// Exclusive upper bound of the first id pool.
    pub initial_bound: u32,
    /// RNG seed. The WASM entry point replaces this with a random value.
    pub seed: u64,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            initial_bound: 1000,
            seed: 0x5eed,
        }
    }
}

/// Everything a [`crate::session::Session`] needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub layout: LayoutConfig,
    pub history: HistoryConfig,
    pub ids: IdConfig,
    /// Where the main tree's root is placed.
    pub origin: Position,
    /// Label of the root in a fresh session.
    pub default_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            history: HistoryConfig::default(),
            ids: IdConfig::default(),
            origin: Position::new(400.0, 60.0),
            default_label: "S".to_string(),
        }
    }
}

impl SessionConfig {
    /// Reject values the layout and id generator cannot work with.
    pub fn validate(&self) -> Result<()> {
        let layout = &self.layout;
        if !(layout.row_height.is_finite() && layout.row_height > 0.0) {
            return Err(SyntreeError::InvalidArgument(format!(
                "rowHeight must be a positive number, got {}",
                layout.row_height
            )));
        }
        if !(layout.spread_angle > 0.0 && layout.spread_angle < 180.0) {
            return Err(SyntreeError::InvalidArgument(format!(
                "spreadAngle must lie strictly between 0 and 180 degrees, got {}",
                layout.spread_angle
            )));
        }
        if !(layout.collision_padding.is_finite() && layout.collision_padding >= 0.0) {
            return Err(SyntreeError::InvalidArgument(format!(
                "collisionPadding must be non-negative, got {}",
                layout.collision_padding
            )));
        }
        if layout.max_widen_passes == 0 {
            return Err(SyntreeError::InvalidArgument(
                "maxWidenPasses must be at least 1".to_string(),
            ));
        }
        if self.history.limit == Some(0) {
            return Err(SyntreeError::InvalidArgument(
                "history limit must be at least 1 when set".to_string(),
            ));
        }
        if self.ids.initial_bound < 2 {
            return Err(SyntreeError::InvalidArgument(format!(
                "initialBound must be at least 2, got {}",
                self.ids.initial_bound
            )));
        }
        if !(self.origin.x.is_finite() && self.origin.y.is_finite()) {
            return Err(SyntreeError::InvalidArgument(
                "origin must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
