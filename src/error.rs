//! Error taxonomy shared by every Syntree operation.
//!
//! Operations that can fail validate their inputs before touching the arena,
//! so an `Err` never leaves a half-applied edit behind.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised by the tree model, layout, codec and session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntreeError {
    /// A required value was missing or of the wrong kind (unknown node ids,
    /// out-of-range indexes, invalid configuration).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A structurally illegal request, such as creating a cycle.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// An offset query between nodes with no ancestor relationship.
    #[error("{ancestor} is not an ancestor of {descendant}")]
    NotAncestor { ancestor: NodeId, descendant: NodeId },

    /// Treestring input failed structural validation.
    #[error("malformed treestring (record {record}): {reason}")]
    MalformedTreestring { record: usize, reason: String },

    /// The widening loop exceeded its pass cap.
    #[error("layout under {node} did not converge after {passes} widening passes")]
    Layout { node: NodeId, passes: u32 },
}

impl SyntreeError {
    pub(crate) fn unknown_node(id: NodeId) -> Self {
        Self::InvalidArgument(format!("{id} does not exist"))
    }

    pub(crate) fn malformed(record: usize, reason: impl Into<String>) -> Self {
        Self::MalformedTreestring {
            record,
            reason: reason.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SyntreeError>;
