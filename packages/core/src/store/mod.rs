//! Thought Store - the dual inverted index
//!
//! This module holds the in-memory pair of indices the whole system is built
//! on:
//!
//! - `thought_index` - thoughts by id (the tree arena)
//! - `lexeme_index` - lexemes by normalized value (the value index)
//!
//! # Contract
//!
//! Reads are O(1) or O(children) and perform **no** structural validation;
//! keeping the two indices mutually consistent is the mutation engine's
//! responsibility. The store is an explicit value threaded through every
//! operation - never a hidden global - which keeps snapshot reconciliation
//! (see [`crate::services::sync`]) trivial to reason about.
//!
//! The write surface (`upsert_thought`, `remove_thought`, lexeme access) is
//! crate-private: only the mutation engine and the sync queue go through it.

use crate::models::{normalize, Lexeme, Thought, ThoughtContext, ThoughtId, ROOT_ID, SYSTEM_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deletion marker carried in a [`DeltaBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "key", rename_all = "camelCase")]
pub enum Tombstone {
    /// Thought removed, by id
    Thought(ThoughtId),
    /// Lexeme removed, by normalized value
    Lexeme(String),
}

/// One batch of index deltas produced by a mutation (or received from a
/// persistence collaborator).
///
/// Within a batch the *last* entry for a given key wins; [`DeltaBatch::merge`]
/// enforces that when batches from several mutations are coalesced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaBatch {
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub thought_upserts: Vec<Thought>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lexeme_upserts: Vec<Lexeme>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tombstones: Vec<Tombstone>,
}

impl DeltaBatch {
    pub fn is_empty(&self) -> bool {
        self.thought_upserts.is_empty()
            && self.lexeme_upserts.is_empty()
            && self.tombstones.is_empty()
    }

    /// Record a thought upsert, superseding any earlier entry or tombstone
    /// for the same id.
    pub fn record_thought(&mut self, thought: Thought) {
        self.thought_upserts.retain(|t| t.id != thought.id);
        self.tombstones
            .retain(|t| !matches!(t, Tombstone::Thought(id) if id == &thought.id));
        self.thought_upserts.push(thought);
    }

    /// Record a lexeme upsert, superseding any earlier entry or tombstone
    /// for the same normalized value.
    pub fn record_lexeme(&mut self, lexeme: Lexeme) {
        self.lexeme_upserts.retain(|l| l.value != lexeme.value);
        self.tombstones
            .retain(|t| !matches!(t, Tombstone::Lexeme(v) if v == &lexeme.value));
        self.lexeme_upserts.push(lexeme);
    }

    /// Record a thought deletion, superseding any earlier upsert.
    pub fn record_thought_delete(&mut self, id: ThoughtId) {
        self.thought_upserts.retain(|t| t.id != id);
        self.tombstones
            .retain(|t| !matches!(t, Tombstone::Thought(existing) if existing == &id));
        self.tombstones.push(Tombstone::Thought(id));
    }

    /// Record a lexeme deletion, superseding any earlier upsert.
    pub fn record_lexeme_delete(&mut self, value: String) {
        self.lexeme_upserts.retain(|l| l.value != value);
        self.tombstones
            .retain(|t| !matches!(t, Tombstone::Lexeme(existing) if existing == &value));
        self.tombstones.push(Tombstone::Lexeme(value));
    }

    /// Fold `other` into `self`, later entries winning per key.
    pub fn merge(&mut self, other: DeltaBatch) {
        for thought in other.thought_upserts {
            self.record_thought(thought);
        }
        for lexeme in other.lexeme_upserts {
            self.record_lexeme(lexeme);
        }
        for tombstone in other.tombstones {
            match tombstone {
                Tombstone::Thought(id) => self.record_thought_delete(id),
                Tombstone::Lexeme(value) => self.record_lexeme_delete(value),
            }
        }
    }
}

/// The dual-index thought store.
#[derive(Debug, Clone, Default)]
pub struct ThoughtStore {
    thought_index: HashMap<ThoughtId, Thought>,
    lexeme_index: HashMap<String, Lexeme>,
}

impl ThoughtStore {
    /// Empty store with no implicit contexts. Mostly useful for hydration
    /// from a persistence collaborator; interactive sessions start from
    /// [`ThoughtStore::seeded`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the implicit root and system contexts.
    pub fn seeded() -> Self {
        let mut store = Self::default();
        store.upsert_thought(Thought::new_with_id(
            ROOT_ID.to_string(),
            String::new(),
            None,
            0.0,
        ));
        store.upsert_thought(Thought::new_with_id(
            SYSTEM_ID.to_string(),
            String::new(),
            None,
            0.0,
        ));
        store
    }

    // ---- read contract -------------------------------------------------

    /// Thought by id, O(1).
    pub fn get_thought(&self, id: &str) -> Option<&Thought> {
        self.thought_index.get(id)
    }

    /// Lexeme by display or normalized value, O(1).
    pub fn get_lexeme(&self, value: &str) -> Option<&Lexeme> {
        self.lexeme_index.get(&normalize(value))
    }

    /// Children of a thought ordered by rank, O(children).
    ///
    /// Child ids with no backing thought (not yet hydrated, or an integrity
    /// skip) are silently omitted - the read side never validates.
    pub fn get_children(&self, id: &str) -> Vec<&Thought> {
        let Some(parent) = self.thought_index.get(id) else {
            return Vec::new();
        };
        let mut children: Vec<&Thought> = parent
            .children
            .iter()
            .filter_map(|child_id| self.thought_index.get(child_id))
            .collect();
        children.sort_by(|a, b| a.rank.total_cmp(&b.rank));
        children
    }

    /// Every occurrence of a value in the tree, O(1) lookup.
    pub fn get_contexts(&self, value: &str) -> Vec<ThoughtContext> {
        self.get_lexeme(value)
            .map(|lexeme| lexeme.contexts.clone())
            .unwrap_or_default()
    }

    pub fn contains_thought(&self, id: &str) -> bool {
        self.thought_index.contains_key(id)
    }

    pub fn thought_count(&self) -> usize {
        self.thought_index.len()
    }

    pub fn lexeme_count(&self) -> usize {
        self.lexeme_index.len()
    }

    /// Snapshot iterator over all thoughts (reconcile, cold-start flush).
    pub fn all_thoughts(&self) -> impl Iterator<Item = &Thought> {
        self.thought_index.values()
    }

    /// Snapshot iterator over all lexemes.
    pub fn all_lexemes(&self) -> impl Iterator<Item = &Lexeme> {
        self.lexeme_index.values()
    }

    // ---- write surface (mutation engine / sync queue only) -------------

    pub(crate) fn upsert_thought(&mut self, thought: Thought) {
        self.thought_index.insert(thought.id.clone(), thought);
    }

    pub(crate) fn remove_thought(&mut self, id: &str) -> Option<Thought> {
        self.thought_index.remove(id)
    }

    pub(crate) fn thought_mut(&mut self, id: &str) -> Option<&mut Thought> {
        self.thought_index.get_mut(id)
    }

    /// Mutable lexeme for a value, created empty on first use.
    pub(crate) fn lexeme_entry(&mut self, value: &str) -> &mut Lexeme {
        let key = normalize(value);
        self.lexeme_index
            .entry(key.clone())
            .or_insert_with(|| Lexeme::new(key))
    }

    pub(crate) fn lexeme_mut(&mut self, value: &str) -> Option<&mut Lexeme> {
        self.lexeme_index.get_mut(&normalize(value))
    }

    pub(crate) fn upsert_lexeme(&mut self, lexeme: Lexeme) {
        self.lexeme_index.insert(lexeme.value.clone(), lexeme);
    }

    pub(crate) fn remove_lexeme(&mut self, value: &str) -> Option<Lexeme> {
        self.lexeme_index.remove(&normalize(value))
    }

    /// Drop the lexeme for `value` if its context list has emptied.
    /// Returns the normalized key when a removal happened.
    pub(crate) fn prune_lexeme(&mut self, value: &str) -> Option<String> {
        let key = normalize(value);
        if self
            .lexeme_index
            .get(&key)
            .is_some_and(|lexeme| lexeme.is_orphaned())
        {
            self.lexeme_index.remove(&key);
            Some(key)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Thought;

    fn child_of(store: &mut ThoughtStore, parent_id: &str, value: &str, rank: f64) -> ThoughtId {
        let thought = Thought::new(value.to_string(), Some(parent_id.to_string()), rank);
        let id = thought.id.clone();
        store.upsert_thought(thought);
        if let Some(parent) = store.thought_mut(parent_id) {
            parent.children.push(id.clone());
        }
        store.lexeme_entry(value).add_context(id.clone(), rank);
        id
    }

    #[test]
    fn test_seeded_store_has_root_and_system() {
        let store = ThoughtStore::seeded();

        assert!(store.get_thought(ROOT_ID).is_some());
        assert!(store.get_thought(SYSTEM_ID).is_some());
        assert!(store.get_thought(ROOT_ID).unwrap().is_root());
    }

    #[test]
    fn test_get_children_sorted_by_rank() {
        let mut store = ThoughtStore::seeded();
        let b = child_of(&mut store, ROOT_ID, "b", 2.0);
        let a = child_of(&mut store, ROOT_ID, "a", 0.5);

        let children = store.get_children(ROOT_ID);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id, a);
        assert_eq!(children[1].id, b);
    }

    #[test]
    fn test_get_children_skips_unresolved_ids() {
        let mut store = ThoughtStore::seeded();
        child_of(&mut store, ROOT_ID, "a", 0.0);
        store
            .thought_mut(ROOT_ID)
            .unwrap()
            .children
            .push("ghost".to_string());

        assert_eq!(store.get_children(ROOT_ID).len(), 1);
    }

    #[test]
    fn test_lexeme_lookup_is_normalized() {
        let mut store = ThoughtStore::seeded();
        child_of(&mut store, ROOT_ID, "Buy  Milk", 0.0);

        assert!(store.get_lexeme("buy milk").is_some());
        assert!(store.get_lexeme("  BUY MILK ").is_some());
        assert_eq!(store.get_contexts("buy milk").len(), 1);
    }

    #[test]
    fn test_prune_lexeme_only_when_orphaned() {
        let mut store = ThoughtStore::seeded();
        let id = child_of(&mut store, ROOT_ID, "a", 0.0);

        assert!(store.prune_lexeme("a").is_none());

        store.lexeme_mut("a").unwrap().remove_context(&id);
        assert_eq!(store.prune_lexeme("a"), Some("a".to_string()));
        assert!(store.get_lexeme("a").is_none());
    }

    #[test]
    fn test_delta_batch_last_write_wins() {
        let mut batch = DeltaBatch::default();
        let mut thought = Thought::new_with_id("t1".into(), "old".into(), None, 0.0);
        batch.record_thought(thought.clone());

        thought.value = "new".into();
        batch.record_thought(thought);

        assert_eq!(batch.thought_upserts.len(), 1);
        assert_eq!(batch.thought_upserts[0].value, "new");
    }

    #[test]
    fn test_delta_batch_tombstone_supersedes_upsert() {
        let mut batch = DeltaBatch::default();
        batch.record_thought(Thought::new_with_id("t1".into(), "x".into(), None, 0.0));
        batch.record_thought_delete("t1".into());

        assert!(batch.thought_upserts.is_empty());
        assert_eq!(batch.tombstones, vec![Tombstone::Thought("t1".into())]);

        // ...and an upsert after a tombstone revives the entry
        batch.record_thought(Thought::new_with_id("t1".into(), "y".into(), None, 0.0));
        assert!(batch.tombstones.is_empty());
        assert_eq!(batch.thought_upserts.len(), 1);
    }

    #[test]
    fn test_delta_batch_merge() {
        let mut first = DeltaBatch::default();
        first.record_thought(Thought::new_with_id("t1".into(), "a".into(), None, 0.0));
        first.record_lexeme_delete("stale".into());

        let mut second = DeltaBatch::default();
        second.record_thought(Thought::new_with_id("t1".into(), "b".into(), None, 1.0));

        first.merge(second);

        assert_eq!(first.thought_upserts.len(), 1);
        assert_eq!(first.thought_upserts[0].value, "b");
        assert_eq!(first.tombstones.len(), 1);
    }
}
