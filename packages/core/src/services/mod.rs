//! Business Services
//!
//! This module contains the engines that drive the thought graph:
//!
//! - `MutationEngine` - structural edits keeping both indices consistent
//! - `expansion` - visible-set computation around a focal path
//! - `SyncQueue` - delta batching, snapshot reconciliation, persistence seam
//! - `import_export` - nested-block bulk import and depth-first export
//!
//! Services coordinate between the store and external collaborators,
//! implementing the edit policies and orchestrating the delta pipeline.

pub mod error;
pub mod expansion;
pub mod import_export;
pub mod mutation;
pub mod sync;


pub use error::MutationError;
pub use expansion::{expand_thoughts, ExpansionOptions, MAX_EXPAND_DEPTH};
pub use import_export::{export_blocks, import_blocks};
pub use mutation::{DeferredOp, MutationEngine, MutationOutcome};
pub use sync::{hydrate, reconcile, PersistenceDriver, ReconcilePlan, Routing, SyncQueue};
