//! Service Layer Error Types
//!
//! Errors surfaced by structural mutations. Every variant maps to a
//! transient, user-facing alert: the store is guaranteed untouched when a
//! mutation returns `Err`, and nothing here ever terminates the session.
//!
//! Two failure families are deliberately *not* represented:
//!
//! - integrity violations (a lexeme entry pointing at a missing thought) are
//!   recovered locally - skipped and logged via `tracing::warn!`
//! - pending conflicts (mutating a not-yet-hydrated subtree) are queued for
//!   replay, not rejected

use thiserror::Error;

/// Mutation operation errors
///
/// Each variant's `Display` text is the message shown to the user.
#[derive(Error, Debug)]
pub enum MutationError {
    /// The caller's `(context, rank)` no longer matches any current child -
    /// stale caller state
    #[error("That thought no longer exists here: {context}")]
    InvalidOperand { context: String },

    /// Root/system/read-only/immovable guard blocked a structural edit
    #[error("{reason}")]
    PolicyRejection { reason: String },

    /// A repeated id was detected during an ancestor walk or merge
    #[error("Cycle detected: {context}")]
    CycleDetected { context: String },
}

impl MutationError {
    /// Create an invalid operand error
    pub fn invalid_operand(context: impl Into<String>) -> Self {
        Self::InvalidOperand {
            context: context.into(),
        }
    }

    /// Create a policy rejection error
    pub fn policy_rejection(reason: impl Into<String>) -> Self {
        Self::PolicyRejection {
            reason: reason.into(),
        }
    }

    /// Create a cycle detected error
    pub fn cycle_detected(context: impl Into<String>) -> Self {
        Self::CycleDetected {
            context: context.into(),
        }
    }
}
