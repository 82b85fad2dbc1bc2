//! Lexeme Data Structures
//!
//! A `Lexeme` is the inverted value index: for every distinct normalized
//! text value it records each place in the tree that value occurs. Lexemes
//! are what make multi-parent ("context view") navigation possible without
//! storing a DAG: the tree stays a tree, and the lexeme lists the other
//! parents.
//!
//! Lexemes are created lazily on the first occurrence of a value and
//! garbage-collected the instant their `contexts` list empties.

use crate::models::ThoughtId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One occurrence of a value in the tree: the thought carrying it and its
/// rank within that thought's sibling list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtContext {
    pub thought_id: ThoughtId,
    pub rank: f64,
}

/// Inverted index entry for one normalized text value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lexeme {
    /// Normalized key (see [`normalize`])
    pub value: String,

    /// Every occurrence of this value in the tree
    #[serde(default)]
    pub contexts: Vec<ThoughtContext>,

    /// Creation timestamp (first occurrence)
    pub created: DateTime<Utc>,

    /// Last modification timestamp
    pub last_updated: DateTime<Utc>,
}

impl Lexeme {
    /// Create a lexeme for a value with no occurrences yet.
    pub fn new(value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            value: value.into(),
            contexts: Vec::new(),
            created: now,
            last_updated: now,
        }
    }

    /// Append an occurrence, replacing any stale entry for the same thought.
    pub fn add_context(&mut self, thought_id: ThoughtId, rank: f64) {
        self.contexts.retain(|c| c.thought_id != thought_id);
        self.contexts.push(ThoughtContext { thought_id, rank });
        self.last_updated = Utc::now();
    }

    /// Remove the occurrence for a thought, if present.
    pub fn remove_context(&mut self, thought_id: &str) {
        let before = self.contexts.len();
        self.contexts.retain(|c| c.thought_id != thought_id);
        if self.contexts.len() != before {
            self.last_updated = Utc::now();
        }
    }

    /// Update the rank of an existing occurrence in place.
    pub fn set_context_rank(&mut self, thought_id: &str, rank: f64) {
        if let Some(context) = self
            .contexts
            .iter_mut()
            .find(|c| c.thought_id == thought_id)
        {
            context.rank = rank;
            self.last_updated = Utc::now();
        }
    }

    /// Whether the lexeme has no remaining occurrences and should be
    /// garbage-collected.
    pub fn is_orphaned(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Fold a display value into its normalized index key: trimmed, internal
/// whitespace runs collapsed to a single space, lowercased.
///
/// # Examples
///
/// ```rust
/// use thoughtspace_core::models::normalize;
///
/// assert_eq!(normalize("  Buy   Milk "), "buy milk");
/// assert_eq!(normalize("buy milk"), "buy milk");
/// ```
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_case_and_whitespace() {
        assert_eq!(normalize("Hello  World"), "hello world");
        assert_eq!(normalize("\thello\nworld "), "hello world");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_add_context_replaces_stale_entry() {
        let mut lexeme = Lexeme::new("a");
        lexeme.add_context("t1".to_string(), 0.0);
        lexeme.add_context("t1".to_string(), 2.0);

        assert_eq!(lexeme.contexts.len(), 1);
        assert_eq!(lexeme.contexts[0].rank, 2.0);
    }

    #[test]
    fn test_remove_context() {
        let mut lexeme = Lexeme::new("a");
        lexeme.add_context("t1".to_string(), 0.0);
        lexeme.add_context("t2".to_string(), 1.0);

        lexeme.remove_context("t1");

        assert_eq!(lexeme.contexts.len(), 1);
        assert_eq!(lexeme.contexts[0].thought_id, "t2");
        assert!(!lexeme.is_orphaned());

        lexeme.remove_context("t2");
        assert!(lexeme.is_orphaned());
    }

    #[test]
    fn test_set_context_rank() {
        let mut lexeme = Lexeme::new("a");
        lexeme.add_context("t1".to_string(), 0.0);

        lexeme.set_context_rank("t1", 5.0);
        assert_eq!(lexeme.contexts[0].rank, 5.0);

        // Unknown thought id is a no-op
        lexeme.set_context_rank("t9", 9.0);
        assert_eq!(lexeme.contexts.len(), 1);
    }
}
