//! Bracket notation export (`[.S [.NP ] [.VP ] ]`).
//!
//! This is a display format for external tools such as qtree. It cannot be
//! read back; use treestrings for persistence.

use crate::error::Result;
use crate::graph::{NodeArena, NodeId};

/// Render the subtree under `root` in bracket notation.
pub fn bracket_notation(arena: &NodeArena, root: NodeId) -> Result<String> {
    let mut out = String::new();
    write_node(arena, root, &mut out)?;
    Ok(out)
}

fn write_node(arena: &NodeArena, id: NodeId, out: &mut String) -> Result<()> {
    let node = arena.get(id)?;
    out.push_str("[.");
    out.push_str(&node.label);
    for &child in node.children() {
        out.push(' ');
        write_node(arena, child, out)?;
    }
    out.push_str(" ]");
    Ok(())
}
