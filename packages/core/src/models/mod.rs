//! Data Models
//!
//! This module contains the core data structures of the thought graph:
//!
//! - `Thought` - a single outline node (id, value, rank, parent, children)
//! - `Lexeme` - inverted value-index entry listing every occurrence
//! - `Path` / `SimplePath` - id-sequence addressing
//! - `Block` - nested import/export shape
//!
//! The dual index pairing thoughts and lexemes lives in [`crate::store`].

mod block;
mod lexeme;
mod path;
mod thought;

pub use block::Block;
pub use lexeme::{normalize, Lexeme, ThoughtContext};
pub use path::{Path, SimplePath};
pub use thought::{Thought, ThoughtId, ValidationError, ARCHIVE_VALUE, ROOT_ID, SYSTEM_ID};
