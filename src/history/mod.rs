//! Action history.
//!
//! Actions are stored oldest-first but every read API returns them
//! most-recent-first. Undo removes the most recent *undoable* action and
//! leaves non-undoable ones (selections) where they are.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::HistoryConfig;
use crate::error::SyntreeError;
use crate::graph::{Arrow, NodeId};

/// Discriminant used for type-filtered lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Select,
    Create,
    Save,
    Delete,
    Reparent,
    CreateArrow,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Create => "create",
            Self::Save => "save",
            Self::Delete => "delete",
            Self::Reparent => "reparent",
            Self::CreateArrow => "createArrow",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = SyntreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(Self::Select),
            "create" => Ok(Self::Create),
            "save" => Ok(Self::Save),
            "delete" => Ok(Self::Delete),
            "reparent" => Ok(Self::Reparent),
            "createArrow" => Ok(Self::CreateArrow),
            other => Err(SyntreeError::InvalidArgument(format!(
                "unknown action type '{other}'"
            ))),
        }
    }
}

/// A discrete user action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    /// A node was selected.
    Select { node: NodeId },
    /// A draft node was committed for the first time.
    Create { node: NodeId },
    /// A committed node's label changed.
    Save {
        node: NodeId,
        pre: String,
        post: String,
    },
    /// A subtree was deleted; enough is kept to put it back.
    Delete {
        treestring: String,
        parent: Option<NodeId>,
        index: usize,
        arrows: Vec<Arrow>,
    },
    /// A node moved to a different parent.
    Reparent {
        node: NodeId,
        from_parent: NodeId,
        from_index: usize,
    },
    /// A movement arrow was drawn.
    CreateArrow { arrow: Arrow },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Select { .. } => ActionKind::Select,
            Self::Create { .. } => ActionKind::Create,
            Self::Save { .. } => ActionKind::Save,
            Self::Delete { .. } => ActionKind::Delete,
            Self::Reparent { .. } => ActionKind::Reparent,
            Self::CreateArrow { .. } => ActionKind::CreateArrow,
        }
    }

    /// Whether undo can reverse this action.
    pub fn is_undoable(&self) -> bool {
        match self {
            Self::Select { .. } => false,
            Self::Create { .. }
            | Self::Save { .. }
            | Self::Delete { .. }
            | Self::Reparent { .. }
            | Self::CreateArrow { .. } => true,
        }
    }
}

/// Chronological log of actions.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Oldest first.
    actions: Vec<Action>,
    limit: Option<usize>,
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            actions: Vec::new(),
            limit: config.limit,
        }
    }

    /// Append an action, dropping the oldest entries past the limit.
    pub fn add_action(&mut self, action: Action) {
        tracing::debug!(kind = %action.kind(), "action recorded");
        self.actions.push(action);
        if let Some(limit) = self.limit {
            if self.actions.len() > limit {
                let excess = self.actions.len() - limit;
                self.actions.drain(..excess);
            }
        }
    }

    /// Remove and return the most recent action.
    pub fn pop_action(&mut self) -> Option<Action> {
        self.actions.pop()
    }

    /// Most recent action.
    pub fn last(&self) -> Option<&Action> {
        self.actions.last()
    }

    /// Iterate most-recent-first.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().rev()
    }

    /// Copy of every action, most-recent-first.
    pub fn get_all(&self) -> Vec<Action> {
        self.iter().cloned().collect()
    }

    /// Copy of every action of `kind`, most-recent-first.
    pub fn get_all_by_type(&self, kind: ActionKind) -> Vec<Action> {
        self.iter().filter(|a| a.kind() == kind).cloned().collect()
    }

    /// Most recent action of `kind`.
    pub fn get_last_of_type(&self, kind: ActionKind) -> Option<&Action> {
        self.get_nth_of_type(kind, 0)
    }

    /// The `n`-th most recent action of `kind` (0 = most recent).
    pub fn get_nth_of_type(&self, kind: ActionKind, n: usize) -> Option<&Action> {
        self.iter().filter(|a| a.kind() == kind).nth(n)
    }

    /// Remove the action at `index` counted most-recent-first.
    pub fn remove_action(&mut self, index: usize) -> Option<Action> {
        let len = self.actions.len();
        if index >= len {
            return None;
        }
        Some(self.actions.remove(len - 1 - index))
    }

    /// Most recent undoable action and its index (most-recent-first), left
    /// in place.
    pub fn last_undoable(&self) -> Option<(usize, &Action)> {
        self.iter().enumerate().find(|(_, action)| action.is_undoable())
    }

    /// Remove and return the most recent undoable action.
    ///
    /// Non-undoable actions newer than it stay in the log. Returns `None`
    /// when nothing can be undone.
    pub fn take_last_undoable(&mut self) -> Option<Action> {
        let (index, _) = self.last_undoable()?;
        self.remove_action(index)
    }

    /// Ids of selected nodes, most-recent-first.
    pub fn node_selects(&self) -> Vec<NodeId> {
        self.iter()
            .filter_map(|action| match action {
                Action::Select { node } => Some(*node),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}
