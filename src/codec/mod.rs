//! Textual tree formats.
//!
//! - [`treestring`]: the persisted, reversible format.
//! - [`bracket`]: one-way bracket notation for external display.

pub mod bracket;
pub mod treestring;

pub use bracket::bracket_notation;
pub use treestring::{decode, encode, parse, Record};
