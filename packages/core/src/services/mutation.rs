//! Mutation Engine - structural edits over the dual index
//!
//! This module provides the only write path into a [`ThoughtStore`]:
//!
//! - create / move / rename / delete operations
//! - duplicate-value sibling merging (destination wins)
//! - archive stamping and the `rerank` rebalance
//! - deferred operations against not-yet-hydrated (`pending`) subtrees,
//!   replayed FIFO on hydration
//!
//! # Atomicity
//!
//! Every operation runs all of its operand and policy checks *before* the
//! first index write, so an `Err` return always leaves the store untouched.
//! Successful operations return a [`MutationOutcome`] carrying the index
//! deltas for the sync queue and, when the caller's cursor lay on the edited
//! path, a rewritten cursor.
//!
//! # Addressing
//!
//! Descendants address their ancestry by stable `parent_id`, never by value
//! path. A plain (non-merge) move therefore touches exactly one lexeme
//! context entry; the recursive descendant rewrite runs only for duplicate
//! merges, where children really are reparented onto the surviving thought.

use crate::models::{normalize, Path, Thought, ThoughtId, ARCHIVE_VALUE, ROOT_ID, SYSTEM_ID};
use crate::services::error::MutationError;
use crate::services::expansion::MAX_EXPAND_DEPTH;
use crate::store::{DeltaBatch, ThoughtStore};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of one successful mutation.
#[derive(Debug, Default)]
pub struct MutationOutcome {
    /// Index deltas to funnel through the sync queue
    pub deltas: DeltaBatch,

    /// Rewritten cursor, present only when the caller's cursor lay on or
    /// beneath an edited path
    pub cursor: Option<Path>,

    /// Id of the thought created (or the surviving duplicate) for create
    /// operations
    pub created_id: Option<ThoughtId>,

    /// Whether part of the operation was queued for replay against a
    /// pending subtree
    pub deferred: bool,
}

impl MutationOutcome {
    /// Fold a later outcome into this one (deltas last-write-wins, latest
    /// cursor wins).
    pub fn absorb(&mut self, other: MutationOutcome) {
        self.deltas.merge(other.deltas);
        if other.cursor.is_some() {
            self.cursor = other.cursor;
        }
        if other.created_id.is_some() {
            self.created_id = other.created_id;
        }
        self.deferred |= other.deferred;
    }
}

/// A mutation queued against a pending subtree, replayed once the subtree
/// hydrates.
#[derive(Debug, Clone)]
pub enum DeferredOp {
    /// Re-run duplicate resolution for a move whose immediate entry was
    /// applied optimistically
    Move { old_path: Path, new_path: Path },

    /// Cascade a delete whose target subtree was not yet loaded
    Delete { context: Path, id: ThoughtId },
}

/// The mutation engine. Owns nothing but the deferred-op queues; the store
/// is threaded through every call.
#[derive(Debug, Default)]
pub struct MutationEngine {
    deferred: HashMap<ThoughtId, VecDeque<DeferredOp>>,
}

impl MutationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deferred operations queued against a pending thought.
    pub fn deferred_count(&self, id: &str) -> usize {
        self.deferred.get(id).map_or(0, VecDeque::len)
    }

    // ---- create ---------------------------------------------------------

    /// Insert a new child under the thought at `context`'s tail.
    ///
    /// Silently no-ops (with a warning) when the resolved parent does not
    /// exist - the caller's view was stale, and stale creates are dropped
    /// rather than alerted. A same-valued sibling already present wins:
    /// duplicates never coexist, so the existing id is returned instead.
    pub fn create_thought(
        &mut self,
        store: &mut ThoughtStore,
        context: &Path,
        value: &str,
        rank: f64,
        id: Option<ThoughtId>,
    ) -> Result<MutationOutcome, MutationError> {
        let mut outcome = MutationOutcome::default();

        let Some(parent_id) = context.head_id().cloned() else {
            tracing::warn!("create_thought: empty context");
            return Ok(outcome);
        };
        if !store.contains_thought(&parent_id) {
            tracing::warn!(parent = %parent_id, "create_thought: parent missing; dropping");
            return Ok(outcome);
        }
        if let Some(explicit) = &id {
            if store.contains_thought(explicit) {
                return Err(MutationError::invalid_operand(format!(
                    "id already in use: {explicit}"
                )));
            }
        }

        let key = normalize(value);
        if let Some(existing) = store
            .get_children(&parent_id)
            .iter()
            .find(|c| normalize(&c.value) == key)
        {
            tracing::debug!(value, existing = %existing.id, "create_thought: duplicate sibling wins");
            outcome.created_id = Some(existing.id.clone());
            return Ok(outcome);
        }

        let thought = match id {
            Some(id) => Thought::new_with_id(id, value.to_string(), Some(parent_id.clone()), rank),
            None => Thought::new(value.to_string(), Some(parent_id.clone()), rank),
        };
        let child_id = thought.id.clone();

        store.upsert_thought(thought);
        if let Some(parent) = store.thought_mut(&parent_id) {
            parent.children.push(child_id.clone());
            parent.touch();
        }
        store.lexeme_entry(value).add_context(child_id.clone(), rank);

        record_thought_state(store, &mut outcome.deltas, &parent_id);
        record_thought_state(store, &mut outcome.deltas, &child_id);
        record_lexeme_state(store, &mut outcome.deltas, value);
        outcome.created_id = Some(child_id);
        Ok(outcome)
    }

    // ---- move -----------------------------------------------------------

    /// Move the thought at `old_path` to the position named by `new_path`
    /// (whose tail is the moved id, parent the destination) with `new_rank`.
    ///
    /// Covers pure reorders, reparenting, duplicate merges (the destination
    /// sibling wins identity and rank), archive stamping, deferral against a
    /// pending destination, and cursor rewriting.
    pub fn move_thought(
        &mut self,
        store: &mut ThoughtStore,
        old_path: &Path,
        new_path: &Path,
        new_rank: f64,
        cursor: Option<&Path>,
    ) -> Result<MutationOutcome, MutationError> {
        let Some(moved_id) = old_path.head_id().cloned() else {
            return Err(MutationError::invalid_operand("empty path"));
        };
        if moved_id == ROOT_ID || moved_id == SYSTEM_ID {
            return Err(MutationError::policy_rejection("The root cannot be moved."));
        }
        let Some(thought) = store.get_thought(&moved_id).cloned() else {
            return Err(MutationError::invalid_operand(moved_id));
        };

        let old_parent_id = old_path.parent().and_then(|p| p.head_id().cloned());
        if thought.parent_id != old_parent_id {
            return Err(MutationError::invalid_operand(format!(
                "\"{}\" has moved since",
                thought.value
            )));
        }
        let Some(old_parent_id) = old_parent_id else {
            return Err(MutationError::policy_rejection("The root cannot be moved."));
        };

        let Some(new_parent_id) = new_path.parent().and_then(|p| p.head_id().cloned()) else {
            return Err(MutationError::policy_rejection(
                "Cannot move a thought above the root.",
            ));
        };
        if !store.contains_thought(&new_parent_id) {
            return Err(MutationError::invalid_operand(new_parent_id));
        }
        if new_path.head_id() != Some(&moved_id) {
            return Err(MutationError::invalid_operand(format!(
                "\"{}\" is not the destination path's target",
                thought.value
            )));
        }
        if new_parent_id == moved_id || is_ancestor(store, &moved_id, &new_parent_id)? {
            return Err(MutationError::policy_rejection(format!(
                "Cannot move \"{}\" into itself.",
                thought.value
            )));
        }
        if let Some(guard) = movement_guard(store, &moved_id) {
            return Err(MutationError::policy_rejection(format!(
                "\"{}\" is {guard}.",
                thought.value
            )));
        }

        let mut outcome = MutationOutcome::default();

        // Pure reorder within the same parent: ranks change, ids do not.
        if old_parent_id == new_parent_id {
            if thought.rank == new_rank {
                return Ok(outcome);
            }
            if let Some(t) = store.thought_mut(&moved_id) {
                t.set_rank(new_rank);
            }
            if let Some(lexeme) = store.lexeme_mut(&thought.value) {
                lexeme.set_context_rank(&moved_id, new_rank);
            }
            record_thought_state(store, &mut outcome.deltas, &moved_id);
            record_lexeme_state(store, &mut outcome.deltas, &thought.value);
            return Ok(outcome);
        }

        // Destination not yet hydrated: apply the immediate entry
        // optimistically and queue duplicate resolution for replay.
        let destination_pending = store
            .get_thought(&new_parent_id)
            .is_some_and(|t| t.pending);
        if destination_pending {
            let stamp = under_archive(store, &new_parent_id);
            reparent_single(
                store,
                &mut outcome.deltas,
                &moved_id,
                &thought.value,
                &old_parent_id,
                &new_parent_id,
                new_rank,
                stamp,
            );
            self.deferred
                .entry(new_parent_id.clone())
                .or_default()
                .push_back(DeferredOp::Move {
                    old_path: old_path.clone(),
                    new_path: new_path.clone(),
                });
            outcome.deferred = true;
            outcome.cursor = rewrite_cursor(cursor, old_path, new_path, &HashMap::new());
            tracing::debug!(parent = %new_parent_id, "move deferred against pending subtree");
            return Ok(outcome);
        }

        let key = normalize(&thought.value);
        let duplicate = store
            .get_children(&new_parent_id)
            .iter()
            .find(|c| c.id != moved_id && normalize(&c.value) == key)
            .map(|c| c.id.clone());

        match duplicate {
            None => {
                let stamp = under_archive(store, &new_parent_id);
                reparent_single(
                    store,
                    &mut outcome.deltas,
                    &moved_id,
                    &thought.value,
                    &old_parent_id,
                    &new_parent_id,
                    new_rank,
                    stamp,
                );
                outcome.cursor = rewrite_cursor(cursor, old_path, new_path, &HashMap::new());
            }
            Some(dup_id) => {
                // Merge: the destination duplicate wins identity and rank;
                // the moved subtree's contents are folded underneath it.
                let mut merges = HashMap::new();
                if let Some(old_parent) = store.thought_mut(&old_parent_id) {
                    old_parent.children.retain(|c| c != &moved_id);
                    old_parent.touch();
                }
                self.merge_into(store, &mut outcome.deltas, &moved_id, &dup_id, &mut merges, 0)?;
                record_thought_state(store, &mut outcome.deltas, &old_parent_id);

                let effective_new = match new_path.parent() {
                    Some(parent) => parent.append(dup_id),
                    None => Path::from_ids([dup_id]),
                };
                outcome.cursor = rewrite_cursor(cursor, old_path, &effective_new, &merges);
            }
        }

        Ok(outcome)
    }

    // ---- rename ---------------------------------------------------------

    /// Change the value of exactly one occurrence, identified by the id at
    /// `path`'s tail. Other occurrences of `old_value` elsewhere in the tree
    /// are untouched. Renaming into a sibling's value merges exactly like a
    /// move collision.
    pub fn rename_thought(
        &mut self,
        store: &mut ThoughtStore,
        path: &Path,
        old_value: &str,
        new_value: &str,
        cursor: Option<&Path>,
    ) -> Result<MutationOutcome, MutationError> {
        let Some(id) = path.head_id().cloned() else {
            return Err(MutationError::invalid_operand("empty path"));
        };
        if id == ROOT_ID || id == SYSTEM_ID {
            return Err(MutationError::policy_rejection(
                "The root cannot be renamed.",
            ));
        }
        let Some(thought) = store.get_thought(&id).cloned() else {
            return Err(MutationError::invalid_operand(id));
        };
        if normalize(&thought.value) != normalize(old_value) {
            return Err(MutationError::invalid_operand(format!(
                "\"{old_value}\" has changed since"
            )));
        }
        if movement_guard(store, &id) == Some("read-only") {
            return Err(MutationError::policy_rejection(format!(
                "\"{}\" is read-only.",
                thought.value
            )));
        }

        let mut outcome = MutationOutcome::default();

        // Display-only change (same normalized key): no lexeme movement.
        if normalize(&thought.value) == normalize(new_value) {
            if thought.value != new_value {
                if let Some(t) = store.thought_mut(&id) {
                    t.set_value(new_value.to_string());
                }
                record_thought_state(store, &mut outcome.deltas, &id);
            }
            return Ok(outcome);
        }

        let parent_id = thought.parent_id.clone().unwrap_or_default();
        let new_key = normalize(new_value);
        let duplicate = store
            .get_children(&parent_id)
            .iter()
            .find(|c| c.id != id && normalize(&c.value) == new_key)
            .map(|c| c.id.clone());

        // Old-value bookkeeping: drop this occurrence, GC the lexeme if it
        // was the last one.
        if let Some(lexeme) = store.lexeme_mut(&thought.value) {
            lexeme.remove_context(&id);
        }
        store.prune_lexeme(&thought.value);
        record_lexeme_state(store, &mut outcome.deltas, &thought.value);

        if let Some(t) = store.thought_mut(&id) {
            t.set_value(new_value.to_string());
        }

        match duplicate {
            None => {
                store.lexeme_entry(new_value).add_context(id.clone(), thought.rank);
                record_thought_state(store, &mut outcome.deltas, &id);
                record_lexeme_state(store, &mut outcome.deltas, new_value);
            }
            Some(dup_id) => {
                // Same-parent collision: the existing sibling wins, the
                // renamed subtree folds underneath it.
                let mut merges = HashMap::new();
                if let Some(parent) = store.thought_mut(&parent_id) {
                    parent.children.retain(|c| c != &id);
                    parent.touch();
                }
                self.merge_into(store, &mut outcome.deltas, &id, &dup_id, &mut merges, 0)?;
                record_thought_state(store, &mut outcome.deltas, &parent_id);

                if let Some(cursor) = cursor {
                    if cursor.starts_with(path) {
                        let effective = match path.parent() {
                            Some(parent) => parent.append(dup_id),
                            None => Path::from_ids([dup_id]),
                        };
                        outcome.cursor = rewrite_cursor(Some(cursor), path, &effective, &merges);
                    }
                }
            }
        }

        Ok(outcome)
    }

    // ---- delete ---------------------------------------------------------

    /// Remove the child `id` from `context`'s children.
    ///
    /// Cascades to every descendant unless a same-valued sibling remains in
    /// the list - in that case the duplicate sibling is assumed to own an
    /// equivalent subtree and descendant deletion is skipped entirely. This
    /// is a documented policy, not an oversight.
    pub fn delete_thought(
        &mut self,
        store: &mut ThoughtStore,
        context: &Path,
        id: &str,
        cursor: Option<&Path>,
    ) -> Result<MutationOutcome, MutationError> {
        if id == ROOT_ID || id == SYSTEM_ID {
            return Err(MutationError::policy_rejection(
                "The root cannot be deleted.",
            ));
        }
        let Some(thought) = store.get_thought(id).cloned() else {
            return Err(MutationError::invalid_operand(id.to_string()));
        };
        let parent_id = context.head_id().cloned();
        if thought.parent_id != parent_id {
            return Err(MutationError::invalid_operand(format!(
                "\"{}\" has moved since",
                thought.value
            )));
        }
        let Some(parent_id) = parent_id else {
            return Err(MutationError::policy_rejection(
                "The root cannot be deleted.",
            ));
        };
        if movement_guard(store, id) == Some("read-only") {
            return Err(MutationError::policy_rejection(format!(
                "\"{}\" is read-only.",
                thought.value
            )));
        }

        let mut outcome = MutationOutcome::default();

        let key = normalize(&thought.value);
        let has_duplicate_sibling = store
            .get_children(&parent_id)
            .iter()
            .any(|c| c.id != id && normalize(&c.value) == key);

        // Immediate entry: out of the parent's list and out of the lexeme.
        if let Some(parent) = store.thought_mut(&parent_id) {
            parent.children.retain(|c| c != id);
            parent.touch();
        }
        record_thought_state(store, &mut outcome.deltas, &parent_id);
        if let Some(lexeme) = store.lexeme_mut(&thought.value) {
            lexeme.remove_context(id);
        }
        store.prune_lexeme(&thought.value);
        record_lexeme_state(store, &mut outcome.deltas, &thought.value);
        store.remove_thought(id);
        outcome.deltas.record_thought_delete(id.to_string());

        // The duplicate-sibling skip applies pending or not: the sibling
        // list is known at delete time even when the target's own subtree
        // is not yet hydrated.
        if !has_duplicate_sibling {
            if thought.pending {
                // Descendants are unknown until hydration; queue the cascade.
                self.deferred
                    .entry(id.to_string())
                    .or_default()
                    .push_back(DeferredOp::Delete {
                        context: context.clone(),
                        id: id.to_string(),
                    });
                outcome.deferred = true;
                tracing::debug!(%id, "delete cascade deferred against pending subtree");
            } else {
                cascade_delete(store, &mut outcome.deltas, &thought.children);
            }
        }

        if let Some(cursor) = cursor {
            let deleted_path = context.append(id.to_string());
            if cursor.starts_with(&deleted_path) {
                outcome.cursor = Some(context.clone());
            }
        }

        Ok(outcome)
    }

    // ---- rerank ---------------------------------------------------------

    /// Rewrite a sibling list's ranks to `0..n`, preserving relative order.
    /// Used when repeated insert-before has crowded the rational gaps.
    pub fn rerank(
        &mut self,
        store: &mut ThoughtStore,
        parent_id: &str,
    ) -> Result<MutationOutcome, MutationError> {
        if !store.contains_thought(parent_id) {
            return Err(MutationError::invalid_operand(parent_id.to_string()));
        }

        let ordered: Vec<(ThoughtId, String)> = store
            .get_children(parent_id)
            .iter()
            .map(|c| (c.id.clone(), c.value.clone()))
            .collect();

        let mut outcome = MutationOutcome::default();
        for (i, (id, value)) in ordered.iter().enumerate() {
            let rank = i as f64;
            if let Some(t) = store.thought_mut(id) {
                if t.rank == rank {
                    continue;
                }
                t.set_rank(rank);
            }
            if let Some(lexeme) = store.lexeme_mut(value) {
                lexeme.set_context_rank(id, rank);
            }
            record_thought_state(store, &mut outcome.deltas, id);
            record_lexeme_state(store, &mut outcome.deltas, value);
        }
        Ok(outcome)
    }

    // ---- archive --------------------------------------------------------

    /// Soft-delete: move the child `id` under the `=archive` container at
    /// the root, creating the container on first use. The move stamps the
    /// thought's `archived` timestamp.
    pub fn archive_thought(
        &mut self,
        store: &mut ThoughtStore,
        context: &Path,
        id: &str,
        cursor: Option<&Path>,
    ) -> Result<MutationOutcome, MutationError> {
        if !store.contains_thought(id) {
            return Err(MutationError::invalid_operand(id.to_string()));
        }

        let mut outcome = MutationOutcome::default();
        let archive_id = match store
            .get_children(ROOT_ID)
            .iter()
            .find(|c| normalize(&c.value) == ARCHIVE_VALUE)
            .map(|c| c.id.clone())
        {
            Some(existing) => existing,
            None => {
                let rank = next_rank(store, ROOT_ID);
                let created = self.create_thought(
                    store,
                    &Path::from_ids([ROOT_ID]),
                    ARCHIVE_VALUE,
                    rank,
                    None,
                )?;
                let archive_id = created.created_id.clone().ok_or_else(|| {
                    MutationError::invalid_operand("archive container could not be created")
                })?;
                outcome.absorb(created);
                archive_id
            }
        };

        let old_path = context.append(id.to_string());
        let new_path = Path::from_ids([ROOT_ID.to_string(), archive_id.clone(), id.to_string()]);
        let rank = next_rank(store, &archive_id);
        let moved = self.move_thought(store, &old_path, &new_path, rank, cursor)?;
        outcome.absorb(moved);
        Ok(outcome)
    }

    // ---- hydration replay -----------------------------------------------

    /// Mark a pending thought hydrated and replay its queued operations in
    /// FIFO order against the now-loaded subtree.
    pub fn replay_deferred(&mut self, store: &mut ThoughtStore, hydrated_id: &str) -> MutationOutcome {
        let mut outcome = MutationOutcome::default();

        if let Some(t) = store.thought_mut(hydrated_id) {
            t.pending = false;
            t.touch();
            record_thought_state(store, &mut outcome.deltas, hydrated_id);
        }

        let Some(queue) = self.deferred.remove(hydrated_id) else {
            return outcome;
        };

        for op in queue {
            match op {
                DeferredOp::Move { new_path, .. } => {
                    self.replay_move(store, &mut outcome, &new_path);
                }
                DeferredOp::Delete { id, .. } => {
                    replay_delete(store, &mut outcome.deltas, &id);
                }
            }
        }
        outcome
    }

    /// Replayed half of a deferred move: the immediate entry already moved
    /// optimistically, so all that remains is duplicate resolution against
    /// the hydrated children.
    fn replay_move(&mut self, store: &mut ThoughtStore, outcome: &mut MutationOutcome, new_path: &Path) {
        let Some(moved_id) = new_path.head_id().cloned() else {
            return;
        };
        let Some(parent_id) = new_path.parent().and_then(|p| p.head_id().cloned()) else {
            return;
        };
        let Some(moved) = store.get_thought(&moved_id).cloned() else {
            // Integrity skip: the optimistic entry vanished before replay.
            tracing::warn!(id = %moved_id, "deferred move target missing; skipping replay");
            return;
        };
        let key = normalize(&moved.value);
        let duplicate = store
            .get_children(&parent_id)
            .iter()
            .find(|c| c.id != moved_id && normalize(&c.value) == key)
            .map(|c| c.id.clone());

        if let Some(dup_id) = duplicate {
            // The hydrated sibling is the destination; destination wins.
            let mut merges = HashMap::new();
            if let Some(parent) = store.thought_mut(&parent_id) {
                parent.children.retain(|c| c != &moved_id);
                parent.touch();
            }
            if let Err(err) =
                self.merge_into(store, &mut outcome.deltas, &moved_id, &dup_id, &mut merges, 0)
            {
                tracing::warn!(%err, "deferred merge aborted");
            }
            record_thought_state(store, &mut outcome.deltas, &parent_id);
        }
    }

    // ---- duplicate merge -------------------------------------------------

    /// Fold `source_id`'s subtree into `target_id` (which wins identity and
    /// rank) and delete the source. First-level children are appended after
    /// the target's last rank; same-valued children merge recursively.
    ///
    /// Depth-bounded and visited-guarded: context-view cycles in caller
    /// state must degrade to an error, never recurse unboundedly.
    fn merge_into(
        &mut self,
        store: &mut ThoughtStore,
        batch: &mut DeltaBatch,
        source_id: &str,
        target_id: &str,
        merges: &mut HashMap<ThoughtId, ThoughtId>,
        depth: usize,
    ) -> Result<(), MutationError> {
        if depth >= MAX_EXPAND_DEPTH {
            return Err(MutationError::cycle_detected(format!(
                "merge depth bound reached at {source_id}"
            )));
        }
        if merges.contains_key(source_id) {
            return Err(MutationError::cycle_detected(format!(
                "{source_id} merged twice"
            )));
        }
        merges.insert(source_id.to_string(), target_id.to_string());

        let Some(source) = store.get_thought(source_id).cloned() else {
            tracing::warn!(id = %source_id, "merge source missing; skipping");
            return Ok(());
        };

        let mut next_rank = next_rank(store, target_id);
        let source_children: Vec<(ThoughtId, String)> = store
            .get_children(source_id)
            .iter()
            .map(|c| (c.id.clone(), c.value.clone()))
            .collect();

        for (child_id, child_value) in source_children {
            let child_key = normalize(&child_value);
            let existing = store
                .get_children(target_id)
                .iter()
                .find(|c| c.id != child_id && normalize(&c.value) == child_key)
                .map(|c| c.id.clone());

            match existing {
                Some(dup_child) => {
                    self.merge_into(store, batch, &child_id, &dup_child, merges, depth + 1)?;
                }
                None => {
                    if let Some(child) = store.thought_mut(&child_id) {
                        child.parent_id = Some(target_id.to_string());
                        child.set_rank(next_rank);
                    }
                    if let Some(target) = store.thought_mut(target_id) {
                        target.children.push(child_id.clone());
                    }
                    if let Some(lexeme) = store.lexeme_mut(&child_value) {
                        lexeme.set_context_rank(&child_id, next_rank);
                    }
                    record_thought_state(store, batch, &child_id);
                    record_lexeme_state(store, batch, &child_value);
                    next_rank += 1.0;
                }
            }
        }

        // Drop the source's own occurrence and the source itself.
        if let Some(lexeme) = store.lexeme_mut(&source.value) {
            lexeme.remove_context(source_id);
        }
        store.prune_lexeme(&source.value);
        record_lexeme_state(store, batch, &source.value);
        store.remove_thought(source_id);
        batch.record_thought_delete(source_id.to_string());

        if let Some(target) = store.thought_mut(target_id) {
            target.touch();
        }
        record_thought_state(store, batch, target_id);
        Ok(())
    }
}

// ---- helpers -------------------------------------------------------------

/// Rank one past the current last child, or `0.0` for an empty list.
fn next_rank(store: &ThoughtStore, parent_id: &str) -> f64 {
    store
        .get_children(parent_id)
        .last()
        .map_or(0.0, |c| c.rank + 1.0)
}

/// Whether `ancestor_id` appears on the parent chain starting at `start_id`
/// (inclusive). Errors on a repeated id - the tree is acyclic by
/// construction, so a cycle here is corrupt caller state.
fn is_ancestor(
    store: &ThoughtStore,
    ancestor_id: &str,
    start_id: &str,
) -> Result<bool, MutationError> {
    let mut visited: HashSet<ThoughtId> = HashSet::new();
    let mut current = Some(start_id.to_string());

    while let Some(id) = current {
        if id == ancestor_id {
            return Ok(true);
        }
        if !visited.insert(id.clone()) || visited.len() > MAX_EXPAND_DEPTH {
            return Err(MutationError::cycle_detected(format!(
                "ancestor walk revisited {id}"
            )));
        }
        current = store.get_thought(&id).and_then(|t| t.parent_id.clone());
    }
    Ok(false)
}

/// Whether the parent chain starting at `start_id` (inclusive) passes
/// through the archive container. Best-effort on cycles: warns and answers
/// `false`.
fn under_archive(store: &ThoughtStore, start_id: &str) -> bool {
    let mut visited: HashSet<ThoughtId> = HashSet::new();
    let mut current = Some(start_id.to_string());

    while let Some(id) = current {
        if !visited.insert(id.clone()) || visited.len() > MAX_EXPAND_DEPTH {
            tracing::warn!(%id, "archive walk revisited an id; treating as not archived");
            return false;
        }
        let Some(thought) = store.get_thought(&id) else {
            return false;
        };
        if normalize(&thought.value) == ARCHIVE_VALUE {
            return true;
        }
        current = thought.parent_id.clone();
    }
    false
}

/// Policy guard on structural edits: `=readonly` blocks everything,
/// `=immovable` blocks moves.
fn movement_guard(store: &ThoughtStore, id: &str) -> Option<&'static str> {
    let children = store.get_children(id);
    if children.iter().any(|c| normalize(&c.value) == "=readonly") {
        Some("read-only")
    } else if children.iter().any(|c| normalize(&c.value) == "=immovable") {
        Some("immovable")
    } else {
        None
    }
}

/// Detach `moved_id` from its old parent and attach under the new one,
/// updating the single matching lexeme context entry in place.
#[allow(clippy::too_many_arguments)]
fn reparent_single(
    store: &mut ThoughtStore,
    batch: &mut DeltaBatch,
    moved_id: &str,
    value: &str,
    old_parent_id: &str,
    new_parent_id: &str,
    new_rank: f64,
    stamp_archive: bool,
) {
    if let Some(old_parent) = store.thought_mut(old_parent_id) {
        old_parent.children.retain(|c| c != moved_id);
        old_parent.touch();
    }
    if let Some(moved) = store.thought_mut(moved_id) {
        moved.parent_id = Some(new_parent_id.to_string());
        moved.rank = new_rank;
        moved.archived = stamp_archive.then(Utc::now);
        moved.touch();
    }
    if let Some(new_parent) = store.thought_mut(new_parent_id) {
        new_parent.children.push(moved_id.to_string());
        new_parent.touch();
    }
    if let Some(lexeme) = store.lexeme_mut(value) {
        lexeme.set_context_rank(moved_id, new_rank);
    }

    record_thought_state(store, batch, old_parent_id);
    record_thought_state(store, batch, new_parent_id);
    record_thought_state(store, batch, moved_id);
    record_lexeme_state(store, batch, value);
}

/// Depth-first cascade over descendant ids, removing each thought and its
/// lexeme occurrence. Visited-guarded; unresolved ids are integrity skips.
fn cascade_delete(store: &mut ThoughtStore, batch: &mut DeltaBatch, roots: &[ThoughtId]) {
    let mut stack: Vec<ThoughtId> = roots.to_vec();
    let mut visited: HashSet<ThoughtId> = HashSet::new();

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            tracing::warn!(%id, "cascade revisited an id; skipping");
            continue;
        }
        let Some(thought) = store.remove_thought(&id) else {
            tracing::warn!(%id, "cascade target missing; skipping");
            continue;
        };
        batch.record_thought_delete(id.clone());
        if let Some(lexeme) = store.lexeme_mut(&thought.value) {
            lexeme.remove_context(&id);
        }
        store.prune_lexeme(&thought.value);
        record_lexeme_state(store, batch, &thought.value);
        stack.extend(thought.children.iter().cloned());
    }
}

/// Replayed half of a deferred delete: cascade whatever hydration delivered
/// under the already-removed id.
fn replay_delete(store: &mut ThoughtStore, batch: &mut DeltaBatch, deleted_id: &str) {
    let orphans: Vec<ThoughtId> = store
        .all_thoughts()
        .filter(|t| t.parent_id.as_deref() == Some(deleted_id))
        .map(|t| t.id.clone())
        .collect();
    if !orphans.is_empty() {
        tracing::debug!(id = %deleted_id, count = orphans.len(), "replaying deferred delete cascade");
        cascade_delete(store, batch, &orphans);
    }
}

/// Rewrite a cursor that lies on or beneath `old_path`, substituting the
/// moved prefix with `new_path` and mapping any merged-away suffix ids to
/// their survivors.
fn rewrite_cursor(
    cursor: Option<&Path>,
    old_path: &Path,
    new_path: &Path,
    merges: &HashMap<ThoughtId, ThoughtId>,
) -> Option<Path> {
    let cursor = cursor?;
    let rebased = cursor.rebase(old_path, new_path)?;
    if merges.is_empty() {
        return Some(rebased);
    }
    let ids = rebased
        .ids()
        .iter()
        .map(|id| merges.get(id).unwrap_or(id).clone())
        .collect();
    Some(Path(ids))
}

/// Snapshot the current state of a thought into the delta batch (or a
/// tombstone if it no longer exists).
fn record_thought_state(store: &ThoughtStore, batch: &mut DeltaBatch, id: &str) {
    match store.get_thought(id) {
        Some(thought) => batch.record_thought(thought.clone()),
        None => batch.record_thought_delete(id.to_string()),
    }
}

/// Snapshot the current state of a lexeme into the delta batch (or a
/// tombstone if it was garbage-collected).
fn record_lexeme_state(store: &ThoughtStore, batch: &mut DeltaBatch, value: &str) {
    match store.get_lexeme(value) {
        Some(lexeme) => batch.record_lexeme(lexeme.clone()),
        None => batch.record_lexeme_delete(normalize(value)),
    }
}
