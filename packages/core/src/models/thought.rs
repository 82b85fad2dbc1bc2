//! Thought Data Structures
//!
//! This module defines the core `Thought` struct: a single node of the
//! outline tree.
//!
//! # Architecture
//!
//! - **Arena node**: thoughts live in the store's id-keyed arena; `children`
//!   holds child ids only, never owned subtrees
//! - **Single owner**: every thought except the root has exactly one
//!   `parent_id`; multi-parent views are a lexeme-level concept
//! - **Fractional ranks**: sibling order is an `f64` rank, unique only
//!   within one sibling list
//!
//! # Examples
//!
//! ```rust
//! use thoughtspace_core::models::{Thought, ROOT_ID};
//!
//! let thought = Thought::new(
//!     "buy milk".to_string(),
//!     Some(ROOT_ID.to_string()),
//!     0.0,
//! );
//! assert_eq!(thought.value, "buy milk");
//! assert!(!thought.is_root());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier of a thought (UUID string, or a deterministic token
/// such as [`ROOT_ID`]).
pub type ThoughtId = String;

/// Deterministic id of the implicit root thought.
pub const ROOT_ID: &str = "__ROOT__";

/// Deterministic id of the implicit system context (settings, shortcuts and
/// other machine-managed thoughts live under it).
pub const SYSTEM_ID: &str = "__SYSTEM__";

/// Value of the conventional archive container directly under the root.
pub const ARCHIVE_VALUE: &str = "=archive";

/// Validation errors for Thought operations
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Invalid rank: {0}")]
    InvalidRank(f64),
}

/// A single node of the outline tree.
///
/// # Fields
///
/// - `id`: stable unique identifier, survives every edit
/// - `value`: display text (the raw, un-normalized form)
/// - `rank`: ordering key among siblings; a rational number, gaps allowed
/// - `parent_id`: owning parent (`None` only for the root)
/// - `children`: ordered child ids
/// - `last_updated`: timestamp of the last mutation touching this thought
/// - `archived`: set when the thought is moved under the archive container
/// - `pending`: subtree not yet hydrated from a persistence collaborator
///
/// # Examples
///
/// ```rust
/// # use thoughtspace_core::models::{Thought, ROOT_ID};
/// let child = Thought::new("a".to_string(), Some(ROOT_ID.to_string()), 1.0);
/// assert!(child.archived.is_none());
/// assert!(!child.pending);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    /// Stable unique identifier (UUID or deterministic token)
    pub id: ThoughtId,

    /// Display text of the thought
    pub value: String,

    /// Ordering key among siblings (meaningless across parents)
    pub rank: f64,

    /// Owning parent id (`None` only for the root)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ThoughtId>,

    /// Ordered child ids
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ThoughtId>,

    /// Last modification timestamp
    pub last_updated: DateTime<Utc>,

    /// Archive timestamp, set when moved under the archive container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<DateTime<Utc>>,

    /// Subtree not yet hydrated from persistence
    #[serde(default)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl Thought {
    /// Create a new Thought with an auto-generated UUID.
    pub fn new(value: String, parent_id: Option<ThoughtId>, rank: f64) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), value, parent_id, rank)
    }

    /// Create a new Thought with an explicit id (deterministic tokens such
    /// as [`ROOT_ID`], or ids pre-generated by a caller tracking optimistic
    /// state).
    pub fn new_with_id(
        id: ThoughtId,
        value: String,
        parent_id: Option<ThoughtId>,
        rank: f64,
    ) -> Self {
        Self {
            id,
            value,
            rank,
            parent_id,
            children: Vec::new(),
            last_updated: Utc::now(),
            archived: None,
            pending: false,
        }
    }

    /// Validate structural fields.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` is empty
    /// - the thought references itself as parent
    /// - `rank` is not a finite number
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if let Some(parent_id) = &self.parent_id {
            if parent_id == &self.id {
                return Err(ValidationError::InvalidParent(
                    "Thought cannot be its own parent".to_string(),
                ));
            }
        }

        if !self.rank.is_finite() {
            return Err(ValidationError::InvalidRank(self.rank));
        }

        Ok(())
    }

    /// Whether this is the implicit root (no owning parent).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether this thought is a metaprogramming attribute (`=`-prefixed
    /// value), hidden from expansion by default.
    pub fn is_attribute(&self) -> bool {
        self.value.starts_with('=')
    }

    /// Update the display value.
    pub fn set_value(&mut self, value: String) {
        self.value = value;
        self.last_updated = Utc::now();
    }

    /// Update the sibling rank.
    pub fn set_rank(&mut self, rank: f64) {
        self.rank = rank;
        self.last_updated = Utc::now();
    }

    /// Bump the modification timestamp without changing content.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thought_creation() {
        let thought = Thought::new("Test".to_string(), Some(ROOT_ID.to_string()), 0.0);

        assert!(!thought.id.is_empty());
        assert_eq!(thought.value, "Test");
        assert_eq!(thought.parent_id.as_deref(), Some(ROOT_ID));
        assert!(thought.children.is_empty());
        assert!(!thought.is_root());
    }

    #[test]
    fn test_thought_with_deterministic_id() {
        let root = Thought::new_with_id(ROOT_ID.to_string(), String::new(), None, 0.0);

        assert_eq!(root.id, ROOT_ID);
        assert!(root.is_root());
    }

    #[test]
    fn test_thought_validation() {
        let thought = Thought::new("ok".to_string(), Some(ROOT_ID.to_string()), 1.5);
        assert!(thought.validate().is_ok());
    }

    #[test]
    fn test_thought_validation_circular_parent() {
        let mut thought = Thought::new("x".to_string(), None, 0.0);
        thought.parent_id = Some(thought.id.clone());

        assert!(matches!(
            thought.validate(),
            Err(ValidationError::InvalidParent(_))
        ));
    }

    #[test]
    fn test_thought_validation_non_finite_rank() {
        let mut thought = Thought::new("x".to_string(), None, 0.0);
        thought.rank = f64::NAN;

        assert!(matches!(
            thought.validate(),
            Err(ValidationError::InvalidRank(_))
        ));
    }

    #[test]
    fn test_thought_is_attribute() {
        let pin = Thought::new("=pin".to_string(), Some(ROOT_ID.to_string()), 0.0);
        assert!(pin.is_attribute());

        let plain = Thought::new("pin".to_string(), Some(ROOT_ID.to_string()), 0.0);
        assert!(!plain.is_attribute());
    }

    #[test]
    fn test_thought_value_update() {
        let mut thought = Thought::new("Original".to_string(), None, 0.0);
        let original_modified = thought.last_updated;

        thought.set_value("Updated".to_string());

        assert_eq!(thought.value, "Updated");
        assert!(thought.last_updated >= original_modified);
    }

    #[test]
    fn test_thought_serialization() {
        let thought = Thought::new("Test".to_string(), Some(ROOT_ID.to_string()), 2.0);

        let json = serde_json::to_string(&thought).unwrap();
        let deserialized: Thought = serde_json::from_str(&json).unwrap();

        assert_eq!(thought, deserialized);
    }
}
