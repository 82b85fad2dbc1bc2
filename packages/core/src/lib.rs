//! ThoughtSpace Core - the thought graph store
//!
//! This crate provides the data model, dual inverted index, and mutation
//! engine for an outliner in which any thought can occur under multiple
//! parents at once (through its lexeme) while the stored tree stays a tree.
//!
//! # Architecture
//!
//! - **Dual index**: thoughts by id, lexemes by normalized value, kept
//!   mutually consistent by the mutation engine alone
//! - **Stable ids**: descendants address ancestry by `parent_id`, so plain
//!   moves touch a single lexeme entry
//! - **State-in, state-out**: the store is an explicit value threaded
//!   through every operation; failed operations leave it untouched
//! - **Async at the edge only**: mutation is synchronous; the sync queue's
//!   flush to persistence collaborators is the one asynchronous seam
//!
//! # Modules
//!
//! - [`models`] - Thought, Lexeme, Path, Block
//! - [`store`] - the dual index and delta batches
//! - [`paths`] - context-view chain splitting, value-path ranking, hashes
//! - [`services`] - mutation, expansion, sync, import/export

pub mod models;
pub mod paths;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use models::*;
pub use services::*;
pub use store::{DeltaBatch, ThoughtStore, Tombstone};
