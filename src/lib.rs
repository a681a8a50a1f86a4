//! Syntree - WASM Module
//!
//! This module provides the core of the Syntree syntax-tree editor: the node
//! model, the collision-free tree layout, treestring persistence and the
//! undo history. It is compiled to WebAssembly and exposes a
//! JavaScript-friendly API via wasm-bindgen.
//!
//! # Architecture
//!
//! - `graph`: node arena using petgraph's StableGraph, plus movement arrows
//! - `tree`: root-id views over the arena (traversal, offsets, export)
//! - `layout`: angular spread layout and the renderer contract
//! - `codec`: treestring encode/decode and bracket notation
//! - `history`: action log with selective undo
//! - `spatial`: R-tree hit testing over laid-out positions
//! - `session`: one editor's state and every user intent

use std::cell::Cell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod history;
pub mod ids;
pub mod layout;
pub mod session;
pub mod spatial;
pub mod tree;

use config::SessionConfig;
use error::SyntreeError;
use graph::{BBox, EditOutcome, EditPhase, NodeId, Position};
use history::ActionKind;
use layout::{Renderer, TextMetrics};
use session::{Session, Side};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn js_error(err: SyntreeError) -> JsError {
    JsError::new(&err.to_string())
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value).map_err(|err| JsError::new(&err.to_string()))
}

fn warn(message: &str) {
    tracing::warn!("{message}");
    web_sys::console::warn_1(&JsValue::from_str(message));
}

/// [`Renderer`] backed by a JavaScript object.
///
/// The object may provide `getLabelBBox(id, label)` returning `{w, h}` (or
/// `{width, height}`), `move(id, x, y)` and `delete(id)`. Missing or failing
/// methods fall back to text-metric estimates; the first failure is logged.
pub struct JsRenderer {
    target: Option<js_sys::Object>,
    fallback: TextMetrics,
    warned: Cell<bool>,
}

impl JsRenderer {
    pub fn new(target: JsValue) -> Self {
        Self {
            target: target.dyn_into::<js_sys::Object>().ok(),
            fallback: TextMetrics::default(),
            warned: Cell::new(false),
        }
    }

    fn method(&self, name: &str) -> Option<(&js_sys::Object, js_sys::Function)> {
        let target = self.target.as_ref()?;
        let value = js_sys::Reflect::get(target, &JsValue::from_str(name)).ok()?;
        let function = value.dyn_into::<js_sys::Function>().ok()?;
        Some((target, function))
    }

    fn warn_once(&self, message: &str) {
        if !self.warned.replace(true) {
            warn(message);
        }
    }
}

impl Renderer for JsRenderer {
    fn label_bbox(&self, id: NodeId, label: &str) -> BBox {
        let Some((target, function)) = self.method("getLabelBBox") else {
            self.warn_once("renderer has no getLabelBBox(); estimating label sizes");
            return self.fallback.measure(label);
        };
        let measured = function
            .call2(target, &JsValue::from(id.0), &JsValue::from_str(label))
            .map_err(|_| "getLabelBBox() threw".to_string())
            .and_then(|value| {
                serde_wasm_bindgen::from_value::<BBox>(value).map_err(|err| err.to_string())
            });
        match measured {
            Ok(bbox) => bbox,
            Err(reason) => {
                self.warn_once(&format!("getLabelBBox() failed ({reason}); estimating label sizes"));
                self.fallback.measure(label)
            }
        }
    }

    fn move_node(&mut self, id: NodeId, position: Position) {
        if let Some((target, function)) = self.method("move") {
            let args = js_sys::Array::of3(
                &JsValue::from(id.0),
                &JsValue::from(position.x),
                &JsValue::from(position.y),
            );
            if function.apply(target, &args).is_err() {
                warn(&format!("renderer move() threw for {id}"));
            }
        }
    }

    fn delete_node(&mut self, id: NodeId) {
        if let Some((target, function)) = self.method("delete") {
            if function.call1(target, &JsValue::from(id.0)).is_err() {
                warn(&format!("renderer delete() threw for {id}"));
            }
        }
    }
}

fn parse_phase(phase: &str, text: Option<String>) -> Result<EditPhase, SyntreeError> {
    match phase {
        "init" => Ok(EditPhase::Init),
        "update" => Ok(EditPhase::Update(text.unwrap_or_default())),
        "save" => Ok(EditPhase::Save),
        "cancel" => Ok(EditPhase::Cancel),
        other => Err(SyntreeError::InvalidArgument(format!(
            "unknown editing phase '{other}'"
        ))),
    }
}

fn outcome_name(outcome: &EditOutcome) -> &'static str {
    match outcome {
        EditOutcome::Editing => "editing",
        EditOutcome::Saved { .. } => "saved",
        EditOutcome::Cancelled => "cancelled",
        EditOutcome::Discarded => "discarded",
        EditOutcome::Unchanged => "unchanged",
    }
}

/// Main entry point for the tree editor.
///
/// This struct wraps a [`Session`] driven by a JavaScript renderer and
/// provides the public API exposed to JavaScript. Node ids cross the
/// boundary as plain numbers.
#[wasm_bindgen]
pub struct SyntreeWasm {
    session: Session<JsRenderer>,
}

#[wasm_bindgen]
impl SyntreeWasm {
    /// Create an editor with the default one-node tree.
    ///
    /// `config` is an optional plain object (camelCase keys, any subset).
    #[wasm_bindgen(constructor)]
    pub fn new(renderer: JsValue, config: JsValue) -> Result<SyntreeWasm, JsError> {
        let mut config: SessionConfig = if config.is_undefined() || config.is_null() {
            SessionConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|err| JsError::new(&err.to_string()))?
        };
        config.ids.seed = (js_sys::Math::random() * u32::MAX as f64) as u64;
        let session = Session::new(config, JsRenderer::new(renderer)).map_err(js_error)?;
        Ok(Self { session })
    }

    /// Discard everything and start over with the default tree.
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.session.reset().map_err(js_error)
    }

    // =========================================================================
    // Node Queries
    // =========================================================================

    #[wasm_bindgen(js_name = rootId)]
    pub fn root_id(&self) -> u32 {
        self.session.tree().root().0
    }

    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> usize {
        self.session.arena().len()
    }

    pub fn label(&self, node_id: u32) -> Result<String, JsError> {
        self.session
            .arena()
            .label(NodeId(node_id))
            .map(str::to_string)
            .map_err(js_error)
    }

    /// `{x, y}` of a node.
    pub fn position(&self, node_id: u32) -> Result<JsValue, JsError> {
        let position = self.session.arena().position(NodeId(node_id)).map_err(js_error)?;
        to_js(&position)
    }

    pub fn parent(&self, node_id: u32) -> Result<Option<u32>, JsError> {
        self.session
            .arena()
            .parent(NodeId(node_id))
            .map(|parent| parent.map(|p| p.0))
            .map_err(js_error)
    }

    pub fn children(&self, node_id: u32) -> Result<Vec<u32>, JsError> {
        self.session
            .arena()
            .children(NodeId(node_id))
            .map(|children| children.iter().map(|c| c.0).collect())
            .map_err(js_error)
    }

    /// Pre-order descendants of a node (the root when omitted).
    pub fn descendants(&self, node_id: Option<u32>, inclusive: bool) -> Result<Vec<u32>, JsError> {
        self.session
            .tree()
            .descendants(self.session.arena(), node_id.map(NodeId), inclusive)
            .map(|ids| ids.into_iter().map(|id| id.0).collect())
            .map_err(js_error)
    }

    /// Nested `{id, label, children}` view of the tree.
    #[wasm_bindgen(js_name = descendantsNested)]
    pub fn descendants_nested(&self, node_id: Option<u32>) -> Result<JsValue, JsError> {
        let nested = self
            .session
            .tree()
            .descendants_nested(self.session.arena(), node_id.map(NodeId), true)
            .map_err(js_error)?;
        to_js(&nested)
    }

    #[wasm_bindgen(js_name = isReal)]
    pub fn is_real(&self, node_id: u32) -> Result<bool, JsError> {
        Ok(self.session.node(NodeId(node_id)).map_err(js_error)?.is_real())
    }

    #[wasm_bindgen(js_name = isEditing)]
    pub fn is_editing(&self, node_id: u32) -> Result<bool, JsError> {
        Ok(self.session.node(NodeId(node_id)).map_err(js_error)?.is_editing())
    }

    // =========================================================================
    // Selection & Navigation
    // =========================================================================

    pub fn selected(&self) -> Option<u32> {
        self.session.selected().map(|id| id.0)
    }

    pub fn select(&mut self, node_id: u32) -> Result<(), JsError> {
        self.session.select(NodeId(node_id)).map_err(js_error)
    }

    pub fn deselect(&mut self) -> Result<Option<u32>, JsError> {
        self.session
            .deselect()
            .map(|id| id.map(|id| id.0))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = navigateUp)]
    pub fn navigate_up(&mut self) -> Result<Option<u32>, JsError> {
        self.session
            .navigate_up()
            .map(|id| id.map(|id| id.0))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = navigateDown)]
    pub fn navigate_down(&mut self, force_create: bool) -> Result<Option<u32>, JsError> {
        self.session
            .navigate_down(force_create)
            .map(|id| id.map(|id| id.0))
            .map_err(js_error)
    }

    /// `direction` is `"left"` or `"right"`.
    #[wasm_bindgen(js_name = navigateHorizontal)]
    pub fn navigate_horizontal(
        &mut self,
        direction: &str,
        force_create: bool,
    ) -> Result<Option<u32>, JsError> {
        let side: Side = direction.parse().map_err(js_error)?;
        self.session
            .navigate_horizontal(side, force_create)
            .map(|id| id.map(|id| id.0))
            .map_err(js_error)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    #[wasm_bindgen(js_name = createChild)]
    pub fn create_child(&mut self, parent_id: u32) -> Result<u32, JsError> {
        self.session
            .create_child(NodeId(parent_id))
            .map(|id| id.0)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = createSibling)]
    pub fn create_sibling(&mut self, node_id: u32, direction: &str) -> Result<u32, JsError> {
        let side: Side = direction.parse().map_err(js_error)?;
        self.session
            .create_sibling(NodeId(node_id), side)
            .map(|id| id.0)
            .map_err(js_error)
    }

    /// Drive label editing on the selected node.
    ///
    /// `phase` is `"init"`, `"update"` (with `text`), `"save"`, `"cancel"`
    /// or `"toggle"`. Returns what happened: `"editing"`, `"saved"`,
    /// `"cancelled"`, `"discarded"` or `"unchanged"`.
    #[wasm_bindgen(js_name = nodeEditing)]
    pub fn node_editing(&mut self, phase: &str, text: Option<String>) -> Result<String, JsError> {
        let phase = if phase == "toggle" {
            let editing = match self.session.selected() {
                Some(id) => self.session.node(id).map_err(js_error)?.is_editing(),
                None => false,
            };
            if editing { "save" } else { "init" }
        } else {
            phase
        };
        let phase = parse_phase(phase, text).map_err(js_error)?;
        let outcome = self.session.node_editing(phase).map_err(js_error)?;
        Ok(outcome_name(&outcome).to_string())
    }

    /// Move a node under a new parent (appended when `index` is omitted).
    pub fn reparent(
        &mut self,
        node_id: u32,
        new_parent_id: u32,
        index: Option<u32>,
    ) -> Result<(), JsError> {
        self.session
            .reparent(NodeId(node_id), NodeId(new_parent_id), index.map(|i| i as usize))
            .map_err(js_error)
    }

    /// Delete a node and its subtree. Returns the removed ids.
    #[wasm_bindgen(js_name = deleteSubtree)]
    pub fn delete_subtree(&mut self, node_id: u32) -> Result<Vec<u32>, JsError> {
        self.session
            .delete_subtree(NodeId(node_id))
            .map(|ids| ids.into_iter().map(|id| id.0).collect())
            .map_err(js_error)
    }

    // =========================================================================
    // Arrows
    // =========================================================================

    /// Returns `{id, from, to}`.
    #[wasm_bindgen(js_name = createArrow)]
    pub fn create_arrow(&mut self, from: u32, to: u32) -> Result<JsValue, JsError> {
        let arrow = self
            .session
            .create_arrow(NodeId(from), NodeId(to))
            .map_err(js_error)?;
        to_js(&arrow)
    }

    #[wasm_bindgen(js_name = deleteArrow)]
    pub fn delete_arrow(&mut self, arrow_id: u32) -> Result<(), JsError> {
        self.session.delete_arrow(arrow_id).map(|_| ()).map_err(js_error)
    }

    pub fn arrows(&self) -> Result<JsValue, JsError> {
        to_js(&self.session.arrows())
    }

    // =========================================================================
    // Treestrings & Export
    // =========================================================================

    /// Load a treestring, replacing the main tree or attaching it under
    /// `parent_id` at `index` (default 0).
    #[wasm_bindgen(js_name = openTree)]
    pub fn open_tree(
        &mut self,
        treestring: &str,
        parent_id: Option<u32>,
        index: Option<u32>,
    ) -> Result<u32, JsError> {
        let attach = parent_id.map(|parent| (NodeId(parent), index.unwrap_or(0) as usize));
        self.session
            .open_tree(treestring, attach)
            .map(|id| id.0)
            .map_err(js_error)
    }

    pub fn treestring(&self) -> Result<String, JsError> {
        self.session.treestring().map_err(js_error)
    }

    #[wasm_bindgen(js_name = bracketNotation)]
    pub fn bracket_notation(&self, node_id: Option<u32>) -> Result<String, JsError> {
        self.session
            .bracket_notation(node_id.map(NodeId))
            .map_err(js_error)
    }

    // =========================================================================
    // Layout & Hit Testing
    // =========================================================================

    /// Lay out the whole tree. Returns `{angle, widenPasses, moved}`.
    pub fn distribute(&mut self) -> Result<JsValue, JsError> {
        let report = self.session.distribute().map_err(js_error)?;
        to_js(&report)
    }

    /// `{left, top, right, bottom}` of the laid-out tree.
    pub fn bounds(&self) -> Result<JsValue, JsError> {
        let bounds = self.session.bounds().map_err(js_error)?;
        to_js(&bounds)
    }

    /// Nearest node to a point, skipping the subtree under `exclude_id`.
    #[wasm_bindgen(js_name = nearestNode)]
    pub fn nearest_node(&self, x: f32, y: f32, exclude_id: Option<u32>) -> Result<Option<u32>, JsError> {
        self.session
            .nearest_node(x, y, exclude_id.map(NodeId))
            .map(|id| id.map(|id| id.0))
            .map_err(js_error)
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Revert the last undoable action. Returns its type, if any.
    pub fn undo(&mut self) -> Result<Option<String>, JsError> {
        self.session
            .undo()
            .map(|kind| kind.map(|kind| kind.as_str().to_string()))
            .map_err(js_error)
    }

    /// Every recorded action, most recent first.
    pub fn history(&self) -> Result<JsValue, JsError> {
        to_js(&self.session.history().get_all())
    }

    /// Recorded actions of one type, most recent first.
    #[wasm_bindgen(js_name = historyByType)]
    pub fn history_by_type(&self, action_type: &str) -> Result<JsValue, JsError> {
        let kind: ActionKind = action_type.parse().map_err(js_error)?;
        to_js(&self.session.history().get_all_by_type(kind))
    }
}
