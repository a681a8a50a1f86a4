//! Node type and related structures.
//!
//! Nodes are the units of a syntax tree. Each node has:
//! - A stable session-unique identifier (survives deletion of other nodes)
//! - A label (the grammatical category or word)
//! - An ordered list of children (left-to-right visual order)
//! - A data-space position written by layout
//! - Editing/selection/reality flags and a pre-edit label snapshot

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyntreeError};

/// Stable node identifier.
///
/// This ID remains valid even after other nodes are removed, and is never
/// reused within a session. It wraps a u32 for WebAssembly interop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new NodeId from a raw u32.
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl From<u32> for NodeId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<NodeId> for u32 {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// A point in data space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Label bounding box reported by the rendering collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    #[serde(alias = "width")]
    pub w: f32,
    #[serde(alias = "height")]
    pub h: f32,
}

impl BBox {
    #[inline]
    pub fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }
}

/// Node state flags packed into a single byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeState {
    flags: u8,
}

impl NodeState {
    const REAL: u8 = 0b0000_0001;
    const EDITING: u8 = 0b0000_0010;
    const SELECTED: u8 = 0b0000_0100;

    /// Create a new default node state (a draft that is not being edited).
    #[inline]
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    /// Check if the node has been committed by the user.
    #[inline]
    pub fn is_real(self) -> bool {
        self.flags & Self::REAL != 0
    }

    #[inline]
    pub fn set_real(&mut self, real: bool) {
        self.set(Self::REAL, real);
    }

    /// Check if the label is being typed.
    #[inline]
    pub fn is_editing(self) -> bool {
        self.flags & Self::EDITING != 0
    }

    #[inline]
    pub fn set_editing(&mut self, editing: bool) {
        self.set(Self::EDITING, editing);
    }

    /// Check if the node is selected.
    #[inline]
    pub fn is_selected(self) -> bool {
        self.flags & Self::SELECTED != 0
    }

    #[inline]
    pub fn set_selected(&mut self, selected: bool) {
        self.set(Self::SELECTED, selected);
    }

    #[inline]
    fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }
}

/// One step of the label editing state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditPhase {
    /// idle → editing; snapshots the current label.
    Init,
    /// Replace the live label while editing.
    Update(String),
    /// Commit the label and mark the node real.
    Save,
    /// Abandon the edit and restore the snapshot.
    Cancel,
}

/// What an [`EditPhase`] did to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Now (or still) editing.
    Editing,
    /// The label was committed.
    Saved {
        pre: String,
        post: String,
        was_real: bool,
    },
    /// The edit was abandoned and the old label restored.
    Cancelled,
    /// The edit was abandoned on a draft node, which must be removed.
    Discarded,
    /// Nothing to do (e.g. cancel while idle).
    Unchanged,
}

/// A syntax tree node.
///
/// Parent and children are non-owning id links; the
/// [`NodeArena`](super::NodeArena) owns the node and keeps the links
/// consistent, so `children` is only mutable from inside the arena.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    pub label: String,
    pub position: Position,
    pub state: NodeState,
    pub before_edit_label: Option<String>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    /// Create a draft node with an empty label.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            label: String::new(),
            position: Position::default(),
            state: NodeState::new(),
            before_edit_label: None,
            children: Vec::new(),
        }
    }

    /// Create a draft node with the given label.
    pub fn with_label(id: NodeId, label: impl Into<String>) -> Self {
        let mut node = Self::new(id);
        node.label = label.into();
        node
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Children in left-to-right order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn is_real(&self) -> bool {
        self.state.is_real()
    }

    #[inline]
    pub fn is_editing(&self) -> bool {
        self.state.is_editing()
    }

    #[inline]
    pub fn is_selected(&self) -> bool {
        self.state.is_selected()
    }

    /// Drive the editing state machine one step.
    ///
    /// A `Discarded` outcome leaves the node untouched; removing it is up to
    /// the owner.
    pub fn editing_action(&mut self, phase: EditPhase) -> Result<EditOutcome> {
        match phase {
            EditPhase::Init => {
                if !self.state.is_editing() {
                    self.before_edit_label = Some(self.label.clone());
                    self.state.set_editing(true);
                }
                Ok(EditOutcome::Editing)
            }
            EditPhase::Update(text) => {
                if !self.state.is_editing() {
                    return Err(SyntreeError::InvalidOperation(format!(
                        "{} is not being edited",
                        self.id
                    )));
                }
                self.label = text;
                Ok(EditOutcome::Editing)
            }
            EditPhase::Save => {
                let pre = self
                    .before_edit_label
                    .take()
                    .unwrap_or_else(|| self.label.clone());
                let was_real = self.state.is_real();
                self.state.set_editing(false);
                self.state.set_real(true);
                Ok(EditOutcome::Saved {
                    pre,
                    post: self.label.clone(),
                    was_real,
                })
            }
            EditPhase::Cancel => {
                if !self.state.is_editing() {
                    return Ok(EditOutcome::Unchanged);
                }
                self.state.set_editing(false);
                if let Some(before) = self.before_edit_label.take() {
                    self.label = before;
                }
                if self.state.is_real() {
                    Ok(EditOutcome::Cancelled)
                } else {
                    Ok(EditOutcome::Discarded)
                }
            }
        }
    }
}
