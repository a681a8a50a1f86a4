//! Treestring encode/decode.
//!
//! A treestring is one record per node in pre-order, root first:
//!
//! ```text
//! id:1|children:2,3|parent:undefined|labelContent:S|;id:2|children:undefined|parent:1|labelContent:NP|;...
//! ```
//!
//! Fields are `|`-terminated and records `;`-terminated. Inside a label the
//! characters `\`, `|` and `;` are backslash-escaped; labels without them are
//! written verbatim.
//!
//! Decoding validates the whole string before creating any node, then builds
//! in two passes: every node first, then the child links by id.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, SyntreeError};
use crate::graph::{EditPhase, Node, NodeArena, NodeId};
use crate::ids::IdGenerator;
use crate::tree::Tree;

const UNDEFINED: &str = "undefined";
const RECORD_END: char = ';';
const FIELD_END: char = '|';
const ESCAPE: char = '\\';

/// One parsed treestring record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: u32,
    pub children: Vec<u32>,
    pub parent: Option<u32>,
    pub label: String,
}

// ── Encoding ───────────────────────────────────────────────────────────

/// Encode the subtree rooted at `root`.
pub fn encode(arena: &NodeArena, root: NodeId) -> Result<String> {
    let mut out = String::new();
    for id in arena.preorder(root)? {
        let node = arena.get(id)?;

        out.push_str("id:");
        out.push_str(&id.0.to_string());
        out.push(FIELD_END);

        out.push_str("children:");
        if node.children().is_empty() {
            out.push_str(UNDEFINED);
        } else {
            let children: Vec<String> = node.children().iter().map(|c| c.0.to_string()).collect();
            out.push_str(&children.join(","));
        }
        out.push(FIELD_END);

        out.push_str("parent:");
        match arena.parent(id)? {
            Some(parent) => out.push_str(&parent.0.to_string()),
            None => out.push_str(UNDEFINED),
        }
        out.push(FIELD_END);

        out.push_str("labelContent:");
        escape_into(&node.label, &mut out);
        out.push(FIELD_END);

        out.push(RECORD_END);
    }
    Ok(out)
}

fn escape_into(label: &str, out: &mut String) {
    for ch in label.chars() {
        if matches!(ch, ESCAPE | FIELD_END | RECORD_END) {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
}

// ── Parsing ────────────────────────────────────────────────────────────

/// Split into records of unescaped fields.
fn tokenize(treestring: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = treestring.chars();

    while let Some(ch) = chars.next() {
        match ch {
            ESCAPE => match chars.next() {
                Some(escaped) => field.push(escaped),
                None => {
                    return Err(SyntreeError::malformed(
                        records.len(),
                        "dangling escape at end of input",
                    ));
                }
            },
            FIELD_END => fields.push(std::mem::take(&mut field)),
            RECORD_END => {
                if !field.is_empty() {
                    fields.push(std::mem::take(&mut field));
                }
                records.push(std::mem::take(&mut fields));
            }
            _ => field.push(ch),
        }
    }

    if !field.trim().is_empty() || !fields.is_empty() {
        return Err(SyntreeError::malformed(
            records.len(),
            "record is missing its ';' terminator",
        ));
    }
    Ok(records)
}

fn parse_id(value: &str, record: usize, what: &str) -> Result<u32> {
    value.trim().parse::<u32>().map_err(|_| {
        SyntreeError::malformed(record, format!("{what} '{value}' is not a valid id"))
    })
}

fn parse_record(fields: Vec<String>, index: usize) -> Result<Record> {
    let mut id = None;
    let mut children = Vec::new();
    let mut parent = None;
    let mut label = None;

    for field in fields {
        let Some((key, value)) = field.split_once(':') else {
            return Err(SyntreeError::malformed(
                index,
                format!("field '{field}' has no ':'"),
            ));
        };
        match key.trim() {
            "id" => id = Some(parse_id(value, index, "id")?),
            "children" => {
                if value != UNDEFINED && !value.is_empty() {
                    children = value
                        .split(',')
                        .map(|child| parse_id(child, index, "child id"))
                        .collect::<Result<Vec<_>>>()?;
                }
            }
            "parent" => {
                if value != UNDEFINED && !value.is_empty() {
                    parent = Some(parse_id(value, index, "parent id")?);
                }
            }
            "labelContent" => label = Some(value.to_string()),
            // Unknown keys from newer writers are tolerated.
            _ => {}
        }
    }

    let id = id.ok_or_else(|| SyntreeError::malformed(index, "missing 'id' field"))?;
    let label =
        label.ok_or_else(|| SyntreeError::malformed(index, "missing 'labelContent' field"))?;
    Ok(Record {
        id,
        children,
        parent,
        label,
    })
}

/// Parse and structurally validate a treestring without touching any arena.
///
/// The first record is the root. Its `parent` field is ignored, so encoded
/// subtrees of a larger tree parse as standalone trees.
pub fn parse(treestring: &str) -> Result<Vec<Record>> {
    let records = tokenize(treestring)?
        .into_iter()
        .enumerate()
        .map(|(index, fields)| parse_record(fields, index))
        .collect::<Result<Vec<_>>>()?;

    if records.is_empty() {
        return Err(SyntreeError::malformed(0, "treestring contains no records"));
    }

    let mut position: HashMap<u32, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if position.insert(record.id, index).is_some() {
            return Err(SyntreeError::malformed(
                index,
                format!("duplicate id {}", record.id),
            ));
        }
    }

    let root = records[0].id;
    let mut listed: HashSet<u32> = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        for &child in &record.children {
            let Some(&child_index) = position.get(&child) else {
                return Err(SyntreeError::malformed(
                    index,
                    format!("child {child} has no record"),
                ));
            };
            if child == root {
                return Err(SyntreeError::malformed(
                    index,
                    format!("root {child} is listed as a child"),
                ));
            }
            if !listed.insert(child) {
                return Err(SyntreeError::malformed(
                    index,
                    format!("node {child} is listed as a child more than once"),
                ));
            }
            if records[child_index].parent != Some(record.id) {
                return Err(SyntreeError::malformed(
                    child_index,
                    format!("parent field of {child} does not name {}", record.id),
                ));
            }
        }
    }

    // Every record must hang off the root.
    let mut reached = 1;
    let mut stack = vec![0];
    while let Some(index) = stack.pop() {
        for child in &records[index].children {
            reached += 1;
            stack.push(position[child]);
        }
    }
    if reached != records.len() {
        let orphan = records
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, record)| !listed.contains(&record.id))
            .map(|(index, _)| index)
            .unwrap_or(0);
        return Err(SyntreeError::malformed(
            orphan,
            "record is not reachable from the root",
        ));
    }

    Ok(records)
}

// ── Decoding ───────────────────────────────────────────────────────────

/// Rebuild the tree in `treestring` inside `arena`.
///
/// Nodes keep their recorded ids (reserved in `ids`) and come back saved.
/// Positions are left at the origin for the caller to lay out.
pub fn decode(treestring: &str, arena: &mut NodeArena, ids: &mut IdGenerator) -> Result<Tree> {
    let records = parse(treestring)?;

    if let Some(live) = records.iter().find(|r| arena.contains(NodeId(r.id))) {
        return Err(SyntreeError::InvalidOperation(format!(
            "{} already exists in this session",
            NodeId(live.id)
        )));
    }

    for record in &records {
        let id = NodeId(record.id);
        ids.reserve(record.id);
        arena.insert(Node::with_label(id, record.label.clone()))?;
        arena.editing_action(id, EditPhase::Save)?;
    }
    for record in &records {
        for &child in &record.children {
            arena.add_child(NodeId(record.id), NodeId(child), None)?;
        }
    }

    tracing::debug!(root = records[0].id, nodes = records.len(), "treestring decoded");
    Ok(Tree::new(NodeId(records[0].id)))
}
