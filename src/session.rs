//! Editing session.
//!
//! A [`Session`] owns everything one editor needs: the node arena, the id
//! generator, the action history, the main tree, the current selection and
//! movement arrows. Every user intent (keyboard navigation, label editing,
//! drag-and-drop, deletion, undo) is a method here, so embedding code never
//! touches the arena directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::SessionConfig;
use crate::error::{Result, SyntreeError};
use crate::graph::{Arrow, EditOutcome, EditPhase, Node, NodeArena, NodeId};
use crate::history::{Action, ActionKind, History};
use crate::ids::IdGenerator;
use crate::layout::{LayoutReport, Renderer, TextMetrics};
use crate::spatial::SpatialIndex;
use crate::tree::{Bounds, Tree};

/// Horizontal direction for navigation and sibling creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

impl FromStr for Side {
    type Err = SyntreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(SyntreeError::InvalidArgument(format!(
                "direction must be 'left' or 'right', got '{other}'"
            ))),
        }
    }
}

/// One editor's worth of state.
pub struct Session<R: Renderer = TextMetrics> {
    config: SessionConfig,
    arena: NodeArena,
    ids: IdGenerator,
    history: History,
    tree: Tree,
    selected: Option<NodeId>,
    arrows: Vec<Arrow>,
    renderer: R,
}

impl Session<TextMetrics> {
    /// Session that estimates label sizes instead of asking a renderer.
    pub fn headless(config: SessionConfig) -> Result<Self> {
        Self::new(config, TextMetrics::default())
    }
}

impl<R: Renderer> Session<R> {
    /// Start a session with the default one-node tree.
    pub fn new(config: SessionConfig, renderer: R) -> Result<Self> {
        config.validate()?;
        let mut session = Self {
            arena: NodeArena::new(),
            ids: IdGenerator::new(config.ids.clone()),
            history: History::new(config.history.clone()),
            // Replaced by `plant_default_tree`.
            tree: Tree::new(NodeId(0)),
            selected: None,
            arrows: Vec::new(),
            renderer,
            config,
        };
        session.plant_default_tree()?;
        Ok(session)
    }

    fn plant_default_tree(&mut self) -> Result<()> {
        let id = NodeId(self.ids.gen_id());
        let mut root = Node::with_label(id, self.config.default_label.clone());
        root.position = self.config.origin;
        self.arena.insert(root)?;
        self.arena.editing_action(id, EditPhase::Save)?;
        self.tree = Tree::with_row_height(id, self.config.layout.row_height);
        self.renderer.move_node(id, self.config.origin);
        tracing::debug!(root = id.0, "default tree planted");
        Ok(())
    }

    /// Drop every node, action and arrow and start over.
    pub fn reset(&mut self) -> Result<()> {
        for id in self.arena.ids().collect::<Vec<_>>() {
            self.renderer.delete_node(id);
        }
        self.arena.clear();
        self.ids.reset();
        self.history.clear();
        self.arrows.clear();
        self.selected = None;
        self.plant_default_tree()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The main tree.
    pub fn tree(&self) -> Tree {
        self.tree
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.arena.get(id)
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select `id`, deselecting (and committing) whatever was selected.
    pub fn select(&mut self, id: NodeId) -> Result<()> {
        self.arena.get(id)?;
        if self.selected != Some(id) {
            self.deselect()?;
            // Committing the previous node never removes `id`.
            self.arena.get_mut(id)?.state.set_selected(true);
            self.selected = Some(id);
        }
        self.history.add_action(Action::Select { node: id });
        Ok(())
    }

    /// Clear the selection. A node still being edited is saved first.
    pub fn deselect(&mut self) -> Result<Option<NodeId>> {
        let Some(id) = self.selected else {
            return Ok(None);
        };
        if self.arena.contains(id) {
            if self.arena.get(id)?.is_editing() {
                self.edit(id, EditPhase::Save)?;
            }
            self.arena.get_mut(id)?.state.set_selected(false);
        }
        self.selected = None;
        Ok(Some(id))
    }

    fn selected_or_root(&mut self) -> Result<NodeId> {
        match self.selected {
            Some(id) => Ok(id),
            None => {
                let root = self.tree.root();
                self.select(root)?;
                Ok(root)
            }
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Append a draft child to `parent`, select it and start editing it.
    pub fn create_child(&mut self, parent: NodeId) -> Result<NodeId> {
        if !self.arena.get(parent)?.is_real() {
            return Err(SyntreeError::InvalidOperation(format!(
                "{parent} has not been saved yet"
            )));
        }
        self.spawn_draft(parent, None)
    }

    /// Insert a draft sibling directly to one side of `of`.
    pub fn create_sibling(&mut self, of: NodeId, side: Side) -> Result<NodeId> {
        if !self.arena.get(of)?.is_real() {
            return Err(SyntreeError::InvalidOperation(format!(
                "{of} has not been saved yet"
            )));
        }
        let Some(parent) = self.arena.parent(of)? else {
            return Err(SyntreeError::InvalidOperation(
                "the root cannot have siblings".to_string(),
            ));
        };
        let index = self.position_in(parent, of)?;
        let at = match side {
            Side::Left => index,
            Side::Right => index + 1,
        };
        self.spawn_draft(parent, Some(at))
    }

    fn spawn_draft(&mut self, parent: NodeId, index: Option<usize>) -> Result<NodeId> {
        let id = NodeId(self.ids.gen_id());
        let mut node = Node::new(id);
        node.position = self.arena.position(parent)?;
        self.arena.insert(node)?;
        if let Err(err) = self.arena.add_child(parent, id, index) {
            self.arena.delete_node(id)?;
            return Err(err);
        }
        if let Err(err) = self.relayout(parent) {
            self.arena.remove_child(parent, id)?;
            self.arena.delete_node(id)?;
            return Err(err);
        }
        tracing::debug!(node = id.0, parent = parent.0, "draft node created");

        self.select(id)?;
        self.arena.editing_action(id, EditPhase::Init)?;
        Ok(id)
    }

    fn position_in(&self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.arena
            .children(parent)?
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| {
                SyntreeError::InvalidOperation(format!("{child} is not a child of {parent}"))
            })
    }

    // =========================================================================
    // Keyboard Navigation
    // =========================================================================

    /// Select the parent of the selection.
    pub fn navigate_up(&mut self) -> Result<Option<NodeId>> {
        let current = self.selected_or_root()?;
        match self.arena.parent(current)? {
            Some(parent) => {
                self.select(parent)?;
                Ok(Some(parent))
            }
            None => Ok(None),
        }
    }

    /// Select a child of the selection, creating one when there is none.
    ///
    /// The most recently selected child wins, then the left-most. With
    /// `force_create` a new child is always appended.
    pub fn navigate_down(&mut self, force_create: bool) -> Result<Option<NodeId>> {
        let current = self.selected_or_root()?;
        let children = self.arena.children(current)?;

        if !children.is_empty() && !force_create {
            let target = self
                .history
                .node_selects()
                .into_iter()
                .find(|id| children.contains(id))
                .unwrap_or(children[0]);
            self.select(target)?;
            return Ok(Some(target));
        }

        if self.arena.get(current)?.is_real() {
            return self.spawn_draft(current, None).map(Some);
        }
        Ok(None)
    }

    /// Move along the selection's row, across cousins.
    ///
    /// At the end of the row (or with `force_create`) a sibling is created
    /// on that side instead.
    pub fn navigate_horizontal(
        &mut self,
        side: Side,
        force_create: bool,
    ) -> Result<Option<NodeId>> {
        let current = self.selected_or_root()?;
        let Some(parent) = self.arena.parent(current)? else {
            return Ok(None);
        };

        let offset = self.tree.node_offset(&self.arena, self.tree.root(), current)?;
        let row = self.tree.nodes_by_offset(&self.arena, offset, None)?;
        let index = row.iter().position(|&id| id == current).ok_or_else(|| {
            SyntreeError::InvalidOperation(format!("{current} is not in the main tree"))
        })?;

        let neighbour = match side {
            Side::Left => index.checked_sub(1).map(|i| row[i]),
            Side::Right => row.get(index + 1).copied(),
        };

        match neighbour {
            Some(next) if !force_create => {
                self.select(next)?;
                Ok(Some(next))
            }
            _ => {
                if !self.arena.get(current)?.is_real() {
                    return Ok(None);
                }
                let at = self.position_in(parent, current)?;
                let at = match side {
                    Side::Left => at,
                    Side::Right => at + 1,
                };
                self.spawn_draft(parent, Some(at)).map(Some)
            }
        }
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Drive label editing on the selected node.
    pub fn node_editing(&mut self, phase: EditPhase) -> Result<EditOutcome> {
        let Some(id) = self.selected else {
            return Err(SyntreeError::InvalidOperation(
                "no node is selected".to_string(),
            ));
        };
        self.edit(id, phase)
    }

    /// Commits record `Create` (first save) or `Save` (label changed). A
    /// cancelled draft is removed without a trace.
    fn edit(&mut self, id: NodeId, phase: EditPhase) -> Result<EditOutcome> {
        let parent = self.arena.parent(id)?;
        let subtree = match phase {
            EditPhase::Cancel => self.arena.preorder(id)?,
            _ => Vec::new(),
        };

        let outcome = self.arena.editing_action(id, phase)?;
        match &outcome {
            EditOutcome::Saved {
                pre,
                post,
                was_real,
            } => {
                if !*was_real {
                    self.history.add_action(Action::Create { node: id });
                } else if pre != post {
                    self.history.add_action(Action::Save {
                        node: id,
                        pre: pre.clone(),
                        post: post.clone(),
                    });
                }
                if let Some(parent) = parent {
                    self.relayout(parent)?;
                }
            }
            EditOutcome::Discarded => {
                self.forget_nodes(&subtree);
                if let Some(parent) = parent {
                    self.relayout(parent)?;
                }
            }
            EditOutcome::Cancelled => {
                if let Some(parent) = parent {
                    self.relayout(parent)?;
                }
            }
            EditOutcome::Editing | EditOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    // =========================================================================
    // Structural Edits
    // =========================================================================

    /// Move `node` (with its subtree) under `new_parent` at `index` (end
    /// when `None`).
    pub fn reparent(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        index: Option<usize>,
    ) -> Result<()> {
        let Some(old_parent) = self.arena.parent(node)? else {
            return Err(SyntreeError::InvalidOperation(
                "the root cannot be moved".to_string(),
            ));
        };
        if !self.arena.get(new_parent)?.is_real() {
            return Err(SyntreeError::InvalidOperation(format!(
                "{new_parent} has not been saved yet"
            )));
        }
        if self.arena.is_ancestor_or_self(node, new_parent)? {
            return Err(SyntreeError::InvalidOperation(format!(
                "moving {node} under {new_parent} would create a cycle"
            )));
        }

        let mut len = self.arena.children(new_parent)?.len();
        if new_parent == old_parent {
            len -= 1;
        }
        let at = index.unwrap_or(len);
        if at > len {
            return Err(SyntreeError::InvalidArgument(format!(
                "child index {at} is out of range for {new_parent} with {len} children"
            )));
        }

        let from_index = self.arena.remove_child(old_parent, node)?;
        self.arena.add_child(new_parent, node, Some(at))?;
        self.history.add_action(Action::Reparent {
            node,
            from_parent: old_parent,
            from_index,
        });
        tracing::debug!(node = node.0, from = old_parent.0, to = new_parent.0, "reparented");

        if old_parent != new_parent {
            self.relayout(old_parent)?;
        }
        self.relayout(new_parent)?;
        Ok(())
    }

    /// Delete `id` and everything under it. Returns the removed ids.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.arena.get(id)?;
        let Some(parent) = self.arena.parent(id)? else {
            return Err(SyntreeError::InvalidOperation(
                "the root of the main tree cannot be deleted".to_string(),
            ));
        };
        let index = self.position_in(parent, id)?;
        let treestring = codec::encode(&self.arena, id)?;

        let removed = self.arena.remove_subtree(id)?;
        let arrows = self.forget_nodes(&removed);
        self.history.add_action(Action::Delete {
            treestring,
            parent: Some(parent),
            index,
            arrows,
        });

        self.relayout(parent)?;
        Ok(removed)
    }

    /// Tell the renderer about removed nodes and drop what referenced them.
    ///
    /// Returns the arrows that were removed.
    fn forget_nodes(&mut self, removed: &[NodeId]) -> Vec<Arrow> {
        for &id in removed {
            self.renderer.delete_node(id);
        }
        if self.selected.is_some_and(|id| removed.contains(&id)) {
            self.selected = None;
        }
        let (dropped, kept): (Vec<Arrow>, Vec<Arrow>) = self
            .arrows
            .drain(..)
            .partition(|arrow| removed.iter().any(|&id| arrow.touches(id)));
        self.arrows = kept;
        dropped
    }

    // =========================================================================
    // Treestrings & Export
    // =========================================================================

    /// Load a treestring.
    ///
    /// Without `attach` the main tree is replaced (and the history cleared,
    /// since it refers to nodes that no longer exist). With `attach` the
    /// decoded root is inserted under a parent at an index, recorded as a
    /// `Create` so it can be undone.
    pub fn open_tree(
        &mut self,
        treestring: &str,
        attach: Option<(NodeId, usize)>,
    ) -> Result<NodeId> {
        match attach {
            Some((parent, index)) => {
                let len = self.arena.children(parent)?.len();
                if index > len {
                    return Err(SyntreeError::InvalidArgument(format!(
                        "child index {index} is out of range for {parent} with {len} children"
                    )));
                }
                let opened = codec::decode(treestring, &mut self.arena, &mut self.ids)?;
                let root = opened.root();
                self.arena.add_child(parent, root, Some(index))?;
                self.history.add_action(Action::Create { node: root });
                self.relayout_all(root)?;
                Ok(root)
            }
            None => {
                // Validate before the current tree is torn down.
                codec::parse(treestring)?;

                let removed = self.arena.remove_subtree(self.tree.root())?;
                self.forget_nodes(&removed);
                self.arrows.clear();
                self.history.clear();

                let opened = codec::decode(treestring, &mut self.arena, &mut self.ids)?;
                let root = opened.root();
                self.arena.move_node(root, self.config.origin.x, self.config.origin.y)?;
                self.tree = Tree::with_row_height(root, self.config.layout.row_height);
                self.relayout_all(root)?;
                tracing::debug!(root = root.0, "main tree replaced");
                Ok(root)
            }
        }
    }

    /// The main tree as a treestring.
    pub fn treestring(&self) -> Result<String> {
        self.tree.treestring(&self.arena)
    }

    /// The main tree (or the subtree under `node`) in bracket notation.
    pub fn bracket_notation(&self, node: Option<NodeId>) -> Result<String> {
        self.tree.bracket_notation(&self.arena, node)
    }

    /// Extent of the main tree's label boxes.
    pub fn bounds(&self) -> Result<Bounds> {
        self.tree.bounds(&self.arena, &self.renderer)
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Lay out the main tree from its root.
    pub fn distribute(&mut self) -> Result<LayoutReport> {
        self.relayout(self.tree.root())
    }

    fn relayout(&mut self, start: NodeId) -> Result<LayoutReport> {
        Tree::with_row_height(start, self.tree.row_height).distribute(
            &mut self.arena,
            &mut self.renderer,
            &self.config.layout,
        )
    }

    fn relayout_all(&mut self, start: NodeId) -> Result<LayoutReport> {
        Tree::with_row_height(start, self.tree.row_height).distribute_all(
            &mut self.arena,
            &mut self.renderer,
            &self.config.layout,
        )
    }

    // =========================================================================
    // Arrows
    // =========================================================================

    /// Draw a movement arrow between two distinct nodes.
    pub fn create_arrow(&mut self, from: NodeId, to: NodeId) -> Result<Arrow> {
        self.arena.get(from)?;
        self.arena.get(to)?;
        if from == to {
            return Err(SyntreeError::InvalidArgument(format!(
                "an arrow needs two different nodes, got {from} twice"
            )));
        }
        if self.arrows.iter().any(|a| a.from == from && a.to == to) {
            return Err(SyntreeError::InvalidOperation(format!(
                "an arrow from {from} to {to} already exists"
            )));
        }
        let arrow = Arrow::new(self.ids.gen_id(), from, to);
        self.arrows.push(arrow);
        self.history.add_action(Action::CreateArrow { arrow });
        Ok(arrow)
    }

    pub fn delete_arrow(&mut self, id: u32) -> Result<Arrow> {
        let index = self
            .arrows
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| SyntreeError::InvalidArgument(format!("arrow {id} does not exist")))?;
        Ok(self.arrows.remove(index))
    }

    // =========================================================================
    // Hit Testing
    // =========================================================================

    /// Node of the main tree nearest to `(x, y)`, skipping the subtree under
    /// `exclude` (the node being dragged).
    pub fn nearest_node(&self, x: f32, y: f32, exclude: Option<NodeId>) -> Result<Option<NodeId>> {
        let index = SpatialIndex::from_subtree(&self.arena, self.tree.root())?;
        let excluded = match exclude {
            Some(id) => self.arena.preorder(id)?,
            None => Vec::new(),
        };
        Ok(index.nearest_excluding(x, y, &excluded))
    }

    // =========================================================================
    // Undo
    // =========================================================================

    /// Revert the most recent undoable action.
    ///
    /// Selections are skipped and stay in the history. Returns the kind of
    /// action reverted, or `None` when there was nothing to undo.
    pub fn undo(&mut self) -> Result<Option<ActionKind>> {
        let Some((index, action)) = self.history.last_undoable() else {
            return Ok(None);
        };
        let action = action.clone();
        let kind = action.kind();
        tracing::debug!(kind = %kind, "undo");

        // The action stays on record until it has been reverted.
        self.revert(action)?;
        self.history.remove_action(index);
        Ok(Some(kind))
    }

    fn revert(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Select { .. } => {}
            Action::Create { node } => self.undo_create(node)?,
            Action::Save { node, pre, .. } => {
                if self.arena.contains(node) {
                    self.arena.set_label(node, pre)?;
                    let start = self.arena.parent(node)?.unwrap_or(node);
                    self.relayout(start)?;
                } else {
                    tracing::warn!(node = node.0, "undo: saved node no longer exists");
                }
            }
            Action::Delete {
                treestring,
                parent,
                index,
                arrows,
            } => self.undo_delete(&treestring, parent, index, arrows)?,
            Action::Reparent {
                node,
                from_parent,
                from_index,
            } => self.undo_reparent(node, from_parent, from_index)?,
            Action::CreateArrow { arrow } => self.arrows.retain(|a| a.id != arrow.id),
        }
        Ok(())
    }

    fn undo_create(&mut self, node: NodeId) -> Result<()> {
        if !self.arena.contains(node) {
            tracing::warn!(node = node.0, "undo: created node no longer exists");
            return Ok(());
        }
        let Some(parent) = self.arena.parent(node)? else {
            tracing::warn!(node = node.0, "undo: refusing to remove the root");
            return Ok(());
        };
        let removed = self.arena.remove_subtree(node)?;
        self.forget_nodes(&removed);
        self.relayout(parent)?;
        Ok(())
    }

    fn undo_delete(
        &mut self,
        treestring: &str,
        parent: Option<NodeId>,
        index: usize,
        arrows: Vec<Arrow>,
    ) -> Result<()> {
        let Some(parent) = parent.filter(|&p| self.arena.contains(p)) else {
            tracing::warn!("undo: parent of deleted subtree no longer exists");
            return Ok(());
        };
        let restored = codec::decode(treestring, &mut self.arena, &mut self.ids)?;
        let at = index.min(self.arena.children(parent)?.len());
        self.arena.add_child(parent, restored.root(), Some(at))?;

        for arrow in arrows {
            if self.arena.contains(arrow.from) && self.arena.contains(arrow.to) {
                self.arrows.push(arrow);
            }
        }
        self.relayout_all(restored.root())?;
        Ok(())
    }

    fn undo_reparent(&mut self, node: NodeId, from_parent: NodeId, from_index: usize) -> Result<()> {
        if !self.arena.contains(node)
            || !self.arena.contains(from_parent)
            || self.arena.is_ancestor_or_self(node, from_parent)?
        {
            tracing::warn!(node = node.0, "undo: cannot restore previous parent");
            return Ok(());
        }
        let Some(current) = self.arena.parent(node)? else {
            return Ok(());
        };
        self.arena.remove_child(current, node)?;
        let at = from_index.min(self.arena.children(from_parent)?.len());
        self.arena.add_child(from_parent, node, Some(at))?;

        if current != from_parent {
            self.relayout(current)?;
        }
        self.relayout(from_parent)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BBox, Position};

    fn session() -> Session {
        Session::headless(SessionConfig::default()).unwrap()
    }

    /// Create and save a child of `parent` labelled `label`.
    fn add(session: &mut Session, parent: NodeId, label: &str) -> NodeId {
        let id = session.create_child(parent).unwrap();
        session
            .node_editing(EditPhase::Update(label.to_string()))
            .unwrap();
        session.node_editing(EditPhase::Save).unwrap();
        id
    }

    /// S(NP(D, N), VP(V))
    fn sample() -> (Session, [NodeId; 6]) {
        let mut s = session();
        let root = s.tree().root();
        let np = add(&mut s, root, "NP");
        let d = add(&mut s, np, "D");
        let n = add(&mut s, np, "N");
        let vp = add(&mut s, root, "VP");
        let v = add(&mut s, vp, "V");
        (s, [root, np, d, n, vp, v])
    }

    #[test]
    fn test_new_session_has_saved_root() {
        let s = session();
        let root = s.tree().root();
        let node = s.node(root).unwrap();

        assert_eq!(node.label, "S");
        assert!(node.is_real());
        assert_eq!(node.position, Position::new(400.0, 60.0));
        assert!(s.history().is_empty());
        assert_eq!(
            s.treestring().unwrap(),
            format!("id:{}|children:undefined|parent:undefined|labelContent:S|;", root.0)
        );
    }

    #[test]
    fn test_create_child_starts_editing_a_draft() {
        let mut s = session();
        let root = s.tree().root();
        let child = s.create_child(root).unwrap();

        let node = s.node(child).unwrap();
        assert!(!node.is_real());
        assert!(node.is_editing());
        assert!(node.is_selected());
        assert_eq!(s.selected(), Some(child));
        assert_eq!(node.position, Position::new(400.0, 130.0));
    }

    #[test]
    fn test_create_child_of_draft_is_rejected() {
        let mut s = session();
        let root = s.tree().root();
        let draft = s.create_child(root).unwrap();
        assert!(matches!(
            s.create_child(draft),
            Err(SyntreeError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_first_save_records_create() {
        let mut s = session();
        let root = s.tree().root();
        let child = add(&mut s, root, "NP");

        assert_eq!(s.node(child).unwrap().label, "NP");
        assert!(s.node(child).unwrap().is_real());
        assert_eq!(
            s.history().get_last_of_type(ActionKind::Create),
            Some(&Action::Create { node: child })
        );
    }

    #[test]
    fn test_save_records_only_real_changes() {
        let (mut s, [_, np, ..]) = sample();
        s.select(np).unwrap();

        s.node_editing(EditPhase::Init).unwrap();
        s.node_editing(EditPhase::Save).unwrap();
        assert_eq!(s.history().get_last_of_type(ActionKind::Save), None);

        s.node_editing(EditPhase::Init).unwrap();
        s.node_editing(EditPhase::Update("DP".into())).unwrap();
        s.node_editing(EditPhase::Save).unwrap();
        assert_eq!(
            s.history().get_last_of_type(ActionKind::Save),
            Some(&Action::Save {
                node: np,
                pre: "NP".into(),
                post: "DP".into()
            })
        );
    }

    #[test]
    fn test_cancel_discards_draft_without_recording() {
        let mut s = session();
        let root = s.tree().root();
        let before = s.history().len();
        let draft = s.create_child(root).unwrap();
        let after_create = s.history().len();

        let outcome = s.node_editing(EditPhase::Cancel).unwrap();
        assert_eq!(outcome, EditOutcome::Discarded);
        assert!(!s.arena().contains(draft));
        assert_eq!(s.selected(), None);
        assert!(s.arena().children(root).unwrap().is_empty());
        // Only the select of the draft was recorded.
        assert_eq!(after_create, before + 1);
        assert_eq!(s.history().len(), after_create);
    }

    #[test]
    fn test_cancel_restores_real_label() {
        let (mut s, [_, np, ..]) = sample();
        s.select(np).unwrap();
        s.node_editing(EditPhase::Init).unwrap();
        s.node_editing(EditPhase::Update("XP".into())).unwrap();
        assert_eq!(s.node_editing(EditPhase::Cancel).unwrap(), EditOutcome::Cancelled);
        assert_eq!(s.node(np).unwrap().label, "NP");
    }

    #[test]
    fn test_deselect_commits_edit() {
        let mut s = session();
        let root = s.tree().root();
        let child = s.create_child(root).unwrap();
        s.node_editing(EditPhase::Update("VP".into())).unwrap();

        s.select(root).unwrap();
        let node = s.node(child).unwrap();
        assert!(node.is_real());
        assert!(!node.is_editing());
        assert!(!node.is_selected());
        assert!(s.node(root).unwrap().is_selected());
    }

    #[test]
    fn test_editing_without_selection_is_rejected() {
        let mut s = session();
        assert!(matches!(
            s.node_editing(EditPhase::Init),
            Err(SyntreeError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_delete_root_is_rejected() {
        let mut s = session();
        let root = s.tree().root();
        assert!(matches!(
            s.delete_subtree(root),
            Err(SyntreeError::InvalidOperation(_))
        ));
        assert!(s.arena().contains(root));
    }

    #[test]
    fn test_undo_delete_restores_identical_treestring() {
        let (mut s, [root, np, d, n, ..]) = sample();
        let before = s.treestring().unwrap();

        let removed = s.delete_subtree(np).unwrap();
        assert_eq!(removed, vec![np, d, n]);
        assert_eq!(s.arena().children(root).unwrap().len(), 1);
        assert!(s.arena().is_deleted(np));

        assert_eq!(s.undo().unwrap(), Some(ActionKind::Delete));
        assert_eq!(s.treestring().unwrap(), before);
        assert_eq!(s.arena().index_in_parent(np).unwrap(), Some(0));
    }

    #[test]
    fn test_failed_undo_keeps_action() {
        let (mut s, [_, np, d, n, vp, _]) = sample();
        let subtree = codec::encode(s.arena(), np).unwrap();
        s.delete_subtree(np).unwrap();

        // Bring the same ids back under VP, then forget that it happened.
        s.open_tree(&subtree, Some((vp, 0))).unwrap();
        assert!(matches!(
            s.history.remove_action(0),
            Some(Action::Create { .. })
        ));

        assert!(matches!(s.undo(), Err(SyntreeError::InvalidOperation(_))));
        assert!(matches!(
            s.history().last_undoable(),
            Some((_, Action::Delete { .. }))
        ));
        assert_eq!(s.arena().children(vp).unwrap()[0], np);
        assert!(s.arena().contains(d) && s.arena().contains(n));
    }

    #[test]
    fn test_undo_skips_selects() {
        let (mut s, [root, np, _, _, vp, _]) = sample();
        s.select(np).unwrap();
        s.node_editing(EditPhase::Init).unwrap();
        s.node_editing(EditPhase::Update("DP".into())).unwrap();
        s.node_editing(EditPhase::Save).unwrap();
        s.select(vp).unwrap();
        s.select(root).unwrap();

        assert_eq!(s.undo().unwrap(), Some(ActionKind::Save));
        assert_eq!(s.node(np).unwrap().label, "NP");
        // The two later selects are still on record.
        assert_eq!(&s.history().node_selects()[..2], &[root, vp]);
    }

    #[test]
    fn test_undo_create_removes_node() {
        let mut s = session();
        let root = s.tree().root();
        let child = add(&mut s, root, "NP");

        assert_eq!(s.undo().unwrap(), Some(ActionKind::Create));
        assert!(!s.arena().contains(child));
        assert_eq!(s.selected(), None);
        assert_eq!(s.undo().unwrap(), None);
    }

    #[test]
    fn test_reparent_and_undo() {
        let (mut s, [_, np, d, n, vp, v]) = sample();

        s.reparent(n, vp, Some(0)).unwrap();
        assert_eq!(s.arena().children(vp).unwrap(), &[n, v]);
        assert_eq!(s.arena().children(np).unwrap(), &[d]);

        assert_eq!(s.undo().unwrap(), Some(ActionKind::Reparent));
        assert_eq!(s.arena().children(np).unwrap(), &[d, n]);
        assert_eq!(s.arena().children(vp).unwrap(), &[v]);
    }

    #[test]
    fn test_reparent_rejects_cycles_and_root() {
        let (mut s, [root, np, d, ..]) = sample();
        let before = s.treestring().unwrap();

        assert!(matches!(
            s.reparent(np, d, None),
            Err(SyntreeError::InvalidOperation(_))
        ));
        assert!(matches!(
            s.reparent(np, np, None),
            Err(SyntreeError::InvalidOperation(_))
        ));
        assert!(matches!(
            s.reparent(root, d, None),
            Err(SyntreeError::InvalidOperation(_))
        ));
        assert!(matches!(
            s.reparent(d, root, Some(9)),
            Err(SyntreeError::InvalidArgument(_))
        ));
        assert_eq!(s.treestring().unwrap(), before);
    }

    #[test]
    fn test_reparent_under_draft_is_rejected() {
        let (mut s, [root, np, d, ..]) = sample();
        let draft = s.create_child(root).unwrap();

        assert!(matches!(
            s.reparent(np, draft, None),
            Err(SyntreeError::InvalidOperation(_))
        ));
        assert_eq!(s.arena().parent(np).unwrap(), Some(root));

        // Cancelling the draft leaves the saved subtree alone.
        s.node_editing(EditPhase::Cancel).unwrap();
        assert!(s.arena().contains(np));
        assert!(s.arena().contains(d));
        assert_eq!(s.history().get_last_of_type(ActionKind::Reparent), None);
    }

    #[test]
    fn test_reorder_within_same_parent() {
        let (mut s, [root, np, _, _, vp, _]) = sample();
        s.reparent(np, root, None).unwrap();
        assert_eq!(s.arena().children(root).unwrap(), &[vp, np]);
    }

    #[test]
    fn test_navigate_down_prefers_recent_child() {
        let (mut s, [root, np, _, _, vp, _]) = sample();
        s.select(vp).unwrap();
        s.select(root).unwrap();
        assert_eq!(s.navigate_down(false).unwrap(), Some(vp));

        s.select(np).unwrap();
        s.select(root).unwrap();
        assert_eq!(s.navigate_down(false).unwrap(), Some(np));
    }

    #[test]
    fn test_navigate_down_creates_on_leaf() {
        let (mut s, [.., v]) = sample();
        s.select(v).unwrap();
        let created = s.navigate_down(false).unwrap().unwrap();
        assert_eq!(s.arena().parent(created).unwrap(), Some(v));
        assert!(s.node(created).unwrap().is_editing());
    }

    #[test]
    fn test_navigate_up() {
        let (mut s, [root, np, d, ..]) = sample();
        s.select(d).unwrap();
        assert_eq!(s.navigate_up().unwrap(), Some(np));
        assert_eq!(s.navigate_up().unwrap(), Some(root));
        assert_eq!(s.navigate_up().unwrap(), None);
        assert_eq!(s.selected(), Some(root));
    }

    #[test]
    fn test_navigate_horizontal_walks_row_across_cousins() {
        let (mut s, [_, np, d, n, vp, v]) = sample();
        s.select(d).unwrap();
        assert_eq!(s.navigate_horizontal(Side::Right, false).unwrap(), Some(n));
        assert_eq!(s.navigate_horizontal(Side::Right, false).unwrap(), Some(v));

        // End of the row: a sibling of V appears to its right.
        let created = s.navigate_horizontal(Side::Right, false).unwrap().unwrap();
        assert_eq!(s.arena().children(vp).unwrap(), &[v, created]);

        s.node_editing(EditPhase::Cancel).unwrap();
        s.select(np).unwrap();
        let left = s.navigate_horizontal(Side::Left, false).unwrap().unwrap();
        assert_eq!(s.arena().index_in_parent(left).unwrap(), Some(0));
    }

    #[test]
    fn test_arrows_follow_deletions_and_undo() {
        let (mut s, [_, np, d, _, _, v]) = sample();
        let arrow = s.create_arrow(v, d).unwrap();
        assert!(matches!(
            s.create_arrow(v, d),
            Err(SyntreeError::InvalidOperation(_))
        ));
        assert!(matches!(
            s.create_arrow(v, v),
            Err(SyntreeError::InvalidArgument(_))
        ));

        s.delete_subtree(np).unwrap();
        assert!(s.arrows().is_empty());

        s.undo().unwrap();
        assert_eq!(s.arrows(), &[arrow]);

        assert_eq!(s.undo().unwrap(), Some(ActionKind::CreateArrow));
        assert!(s.arrows().is_empty());
    }

    #[test]
    fn test_delete_arrow() {
        let (mut s, [_, _, d, _, _, v]) = sample();
        let arrow = s.create_arrow(v, d).unwrap();
        assert_eq!(s.delete_arrow(arrow.id).unwrap(), arrow);
        assert!(s.delete_arrow(arrow.id).is_err());
    }

    #[test]
    fn test_open_tree_replaces_main_tree() {
        let mut s = session();
        let treestring = "id:1|children:2,3|parent:undefined|labelContent:S|;\
                          id:2|children:undefined|parent:1|labelContent:NP|;\
                          id:3|children:undefined|parent:1|labelContent:VP|;";
        let root = s.open_tree(treestring, None).unwrap();

        assert_eq!(root, NodeId(1));
        assert_eq!(s.tree().root(), NodeId(1));
        assert_eq!(s.arena().len(), 3);
        assert_eq!(s.treestring().unwrap(), treestring);
        assert_eq!(s.node(root).unwrap().position, Position::new(400.0, 60.0));
        assert_eq!(s.node(NodeId(2)).unwrap().position.y, 130.0);
        assert!(s.history().is_empty());
    }

    #[test]
    fn test_open_tree_rejects_garbage_without_touching_tree() {
        let (mut s, _) = sample();
        let before = s.treestring().unwrap();
        assert!(s.open_tree("id:1|children:9|labelContent:S|;", None).is_err());
        assert_eq!(s.treestring().unwrap(), before);
    }

    #[test]
    fn test_open_tree_attach_and_undo() {
        let (mut s, [_, _, _, _, vp, v]) = sample();
        let root = s
            .open_tree(
                "id:5000|children:5001|parent:undefined|labelContent:NP|;\
                 id:5001|children:undefined|parent:5000|labelContent:N|;",
                Some((vp, 1)),
            )
            .unwrap();

        assert_eq!(s.arena().children(vp).unwrap(), &[v, root]);
        assert_eq!(s.bracket_notation(Some(vp)).unwrap(), "[.VP [.V ] [.NP [.N ] ] ]");

        assert_eq!(s.undo().unwrap(), Some(ActionKind::Create));
        assert_eq!(s.arena().children(vp).unwrap(), &[v]);
    }

    #[test]
    fn test_nearest_node_excludes_dragged_subtree() {
        let (s, [_, np, d, n, ..]) = sample();
        let at = s.node(np).unwrap().position;

        assert_eq!(s.nearest_node(at.x, at.y, None).unwrap(), Some(np));
        let target = s.nearest_node(at.x, at.y, Some(np)).unwrap().unwrap();
        assert!(![np, d, n].contains(&target));
    }

    #[test]
    fn test_layout_keeps_siblings_apart() {
        let (s, [root, np, ..]) = sample();
        let vp = s.arena().children(root).unwrap()[1];
        let renderer = TextMetrics::default();
        let np_edge = s.node(Tree::right_most(s.arena(), np).unwrap()).unwrap();
        let vp_edge = s.node(Tree::left_most(s.arena(), vp).unwrap()).unwrap();

        let right = np_edge.position.x + renderer.measure(&np_edge.label).w / 2.0;
        let left = vp_edge.position.x - renderer.measure(&vp_edge.label).w / 2.0;
        assert!(right < left);
    }

    #[test]
    fn test_reset() {
        let (mut s, _) = sample();
        s.reset().unwrap();
        assert_eq!(s.arena().len(), 1);
        assert!(s.history().is_empty());
        assert_eq!(s.node(s.tree().root()).unwrap().label, "S");
    }

    #[derive(Default)]
    struct Recorder {
        deleted: Vec<NodeId>,
    }

    impl Renderer for Recorder {
        fn label_bbox(&self, _id: NodeId, label: &str) -> BBox {
            TextMetrics::default().measure(label)
        }

        fn delete_node(&mut self, id: NodeId) {
            self.deleted.push(id);
        }
    }

    #[test]
    fn test_renderer_hears_about_deletions() {
        let mut s = Session::new(SessionConfig::default(), Recorder::default()).unwrap();
        let root = s.tree().root();
        let child = s.create_child(root).unwrap();
        s.node_editing(EditPhase::Save).unwrap();
        s.delete_subtree(child).unwrap();
        assert_eq!(s.renderer().deleted, vec![child]);
    }

    /// Measures drafts (empty labels) as impossibly wide.
    struct WideDrafts;

    impl Renderer for WideDrafts {
        fn label_bbox(&self, _id: NodeId, label: &str) -> BBox {
            if label.is_empty() {
                BBox::new(f32::INFINITY, 18.0)
            } else {
                TextMetrics::default().measure(label)
            }
        }
    }

    #[test]
    fn test_failed_layout_removes_new_draft() {
        let mut s = Session::new(SessionConfig::default(), WideDrafts).unwrap();
        let root = s.tree().root();
        // A lone child never collides, so the first draft lays out fine.
        let np = s.create_child(root).unwrap();
        s.node_editing(EditPhase::Update("NP".into())).unwrap();
        s.node_editing(EditPhase::Save).unwrap();

        assert!(matches!(
            s.create_child(root),
            Err(SyntreeError::Layout { .. })
        ));
        assert_eq!(s.arena().children(root).unwrap(), &[np]);
        assert_eq!(s.arena().len(), 2);
        assert_eq!(s.selected(), Some(np));
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("left".parse::<Side>().unwrap(), Side::Left);
        assert_eq!(Side::Right.to_string(), "right");
        assert!("up".parse::<Side>().is_err());
    }
}
