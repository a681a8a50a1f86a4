//! NodeArena - owner of every live node in a session.
//!
//! The arena stores nodes in petgraph's StableGraph so indices stay valid
//! while other nodes are removed. Parent→child edges mirror each node's
//! ordered `children` list; the parent of a node is its single incoming
//! neighbour. Trees hold only a root id and read everything through here.

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::{Directed, Direction};
use std::collections::{HashMap, HashSet};

use super::node::{EditOutcome, EditPhase, Node, NodeId, Position};
use crate::error::{Result, SyntreeError};

/// Arena of nodes addressed by stable [`NodeId`].
pub struct NodeArena {
    /// Node weights; edges point parent → child.
    graph: StableGraph<Node, (), Directed>,

    /// Map from stable NodeId to petgraph NodeIndex
    node_id_to_index: HashMap<NodeId, NodeIndex>,

    /// Ids removed from the arena during this session.
    deleted: HashSet<NodeId>,
}

impl NodeArena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            node_id_to_index: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    // =========================================================================
    // Node Lifetime
    // =========================================================================

    /// Take ownership of a detached node.
    pub fn insert(&mut self, node: Node) -> Result<NodeId> {
        let id = node.id();
        if self.node_id_to_index.contains_key(&id) {
            return Err(SyntreeError::InvalidOperation(format!(
                "{id} is already in use"
            )));
        }
        if !node.children.is_empty() {
            return Err(SyntreeError::InvalidArgument(format!(
                "{id} must be inserted without children"
            )));
        }
        let index = self.graph.add_node(node);
        self.node_id_to_index.insert(id, index);
        self.deleted.remove(&id);
        Ok(id)
    }

    /// Delete a single childless node, detaching it from its parent.
    ///
    /// Deleting an id that was already deleted is a no-op. Nodes with live
    /// children must go through [`NodeArena::remove_subtree`].
    pub fn delete_node(&mut self, id: NodeId) -> Result<bool> {
        if self.deleted.contains(&id) {
            return Ok(false);
        }
        let index = self.index_of(id)?;
        if !self.graph[index].children.is_empty() {
            return Err(SyntreeError::InvalidOperation(format!(
                "{id} still has children; delete its subtree instead"
            )));
        }
        if let Some(parent) = self.parent(id)? {
            self.remove_child(parent, id)?;
        }
        self.forget(id, index);
        Ok(true)
    }

    /// Remove `root` and all of its descendants.
    ///
    /// `root` is detached from its parent first. Returns the removed ids in
    /// pre-order.
    pub fn remove_subtree(&mut self, root: NodeId) -> Result<Vec<NodeId>> {
        if self.deleted.contains(&root) {
            return Ok(Vec::new());
        }
        let removed = self.preorder(root)?;
        if let Some(parent) = self.parent(root)? {
            self.remove_child(parent, root)?;
        }
        for &id in &removed {
            if let Some(&index) = self.node_id_to_index.get(&id) {
                self.forget(id, index);
            }
        }
        tracing::debug!(root = root.0, count = removed.len(), "subtree removed");
        Ok(removed)
    }

    fn forget(&mut self, id: NodeId, index: NodeIndex) {
        self.graph.remove_node(index);
        self.node_id_to_index.remove(&id);
        self.deleted.insert(id);
    }

    /// Whether `id` is a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node_id_to_index.contains_key(&id)
    }

    /// Whether `id` was deleted during this session.
    pub fn is_deleted(&self, id: NodeId) -> bool {
        self.deleted.contains(&id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Ids of all live nodes, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph
            .node_indices()
            .map(move |index| self.graph[index].id())
    }

    /// Drop every node and the deletion record.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_id_to_index.clear();
        self.deleted.clear();
    }

    // =========================================================================
    // Access
    // =========================================================================

    fn index_of(&self, id: NodeId) -> Result<NodeIndex> {
        self.node_id_to_index
            .get(&id)
            .copied()
            .ok_or_else(|| SyntreeError::unknown_node(id))
    }

    /// Borrow a node.
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        let index = self.index_of(id)?;
        Ok(&self.graph[index])
    }

    /// Mutably borrow a node. Structure is only editable through the arena.
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        let index = self.index_of(id)?;
        Ok(&mut self.graph[index])
    }

    /// The node's parent, if any.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        let index = self.index_of(id)?;
        Ok(self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .next()
            .map(|parent| self.graph[parent].id()))
    }

    /// The node's children in order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.get(id)?.children())
    }

    /// Index of `id` among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Result<Option<usize>> {
        match self.parent(id)? {
            Some(parent) => Ok(self
                .children(parent)?
                .iter()
                .position(|&child| child == id)),
            None => Ok(None),
        }
    }

    pub fn label(&self, id: NodeId) -> Result<&str> {
        Ok(self.get(id)?.label.as_str())
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.label = label.into();
        Ok(())
    }

    pub fn position(&self, id: NodeId) -> Result<Position> {
        Ok(self.get(id)?.position)
    }

    /// Set a node's position without touching any other node.
    pub fn move_node(&mut self, id: NodeId, x: f32, y: f32) -> Result<()> {
        self.get_mut(id)?.position = Position::new(x, y);
        Ok(())
    }

    /// Shift `id` and every descendant by the same delta.
    pub fn translate_subtree(&mut self, id: NodeId, dx: f32, dy: f32) -> Result<()> {
        if dx == 0.0 && dy == 0.0 {
            return Ok(());
        }
        for node in self.preorder(id)? {
            let position = &mut self.get_mut(node)?.position;
            position.x += dx;
            position.y += dy;
        }
        Ok(())
    }

    /// The root reached by walking parents from `id`.
    pub fn root_of(&self, id: NodeId) -> Result<NodeId> {
        let mut current = id;
        while let Some(parent) = self.parent(current)? {
            current = parent;
        }
        Ok(current)
    }

    /// Whether `ancestor` is `node` or lies above it.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> Result<bool> {
        self.index_of(ancestor)?;
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.parent(id)?;
        }
        Ok(false)
    }

    /// `id` and all its descendants, root first, children left to right.
    pub fn preorder(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.index_of(id)?;
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            let children = self.children(current)?;
            stack.extend(children.iter().rev().copied());
        }
        Ok(order)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Attach `child` under `parent` at `index` (end when `None`).
    pub fn add_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: Option<usize>,
    ) -> Result<()> {
        let parent_index = self.index_of(parent)?;
        let child_index = self.index_of(child)?;

        let len = self.graph[parent_index].children.len();
        let at = index.unwrap_or(len);
        if at > len {
            return Err(SyntreeError::InvalidArgument(format!(
                "child index {at} is out of range for {parent} with {len} children"
            )));
        }
        if let Some(existing) = self.parent(child)? {
            return Err(SyntreeError::InvalidOperation(format!(
                "{child} is already a child of {existing}"
            )));
        }
        if self.is_ancestor_or_self(child, parent)? {
            return Err(SyntreeError::InvalidOperation(format!(
                "adding {child} under {parent} would create a cycle"
            )));
        }

        self.graph[parent_index].children.insert(at, child);
        self.graph.add_edge(parent_index, child_index, ());
        Ok(())
    }

    /// Detach `child` from `parent`, returning its former index.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<usize> {
        let parent_index = self.index_of(parent)?;
        let child_index = self.index_of(child)?;

        let Some(at) = self.graph[parent_index]
            .children
            .iter()
            .position(|&c| c == child)
        else {
            return Err(SyntreeError::InvalidOperation(format!(
                "{child} is not a child of {parent}"
            )));
        };

        self.graph[parent_index].children.remove(at);
        if let Some(edge) = self.graph.find_edge(parent_index, child_index) {
            self.graph.remove_edge(edge);
        }
        Ok(at)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Apply an editing phase; a discarded draft is removed with its subtree.
    pub fn editing_action(&mut self, id: NodeId, phase: EditPhase) -> Result<EditOutcome> {
        let outcome = self.get_mut(id)?.editing_action(phase)?;
        if outcome == EditOutcome::Discarded {
            self.remove_subtree(id)?;
        }
        Ok(outcome)
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}
