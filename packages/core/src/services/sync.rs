//! Sync Queue - delta batching, reconciliation, and the persistence seam
//!
//! Every successful mutation funnels its [`DeltaBatch`] through here. The
//! queue:
//!
//! - merges the deltas into the store (last write wins within a batch)
//! - recomputes the expansion set for the tracked focal path, so renderers
//!   always observe a consistent `(store, expanded)` pair
//! - appends the deltas to an outbound queue with local/remote routing,
//!   coalescing everything queued between two flushes into one payload
//!
//! Flushing is the only asynchronous edge of the system. It is a debounce,
//! not a distributed transaction: callers schedule `flush` on the next tick
//! and must not assume durability before it resolves.

use crate::models::{Lexeme, Path, Thought, ThoughtId, ROOT_ID, SYSTEM_ID};
use crate::services::expansion::{expand_thoughts, ExpansionOptions};
use crate::store::{DeltaBatch, ThoughtStore, Tombstone};
use async_trait::async_trait;
use std::collections::HashSet;

/// Destination flags for an outbound batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub local: bool,
    pub remote: bool,
}

impl Routing {
    pub const BOTH: Routing = Routing {
        local: true,
        remote: true,
    };
    pub const LOCAL_ONLY: Routing = Routing {
        local: true,
        remote: false,
    };
    pub const REMOTE_ONLY: Routing = Routing {
        local: false,
        remote: true,
    };
}

/// Reconciliation result: what each side is missing or holds stale.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub to_local: DeltaBatch,
    pub to_remote: DeltaBatch,
}

/// Persistence collaborator (local or remote - the interface is symmetric).
#[async_trait]
pub trait PersistenceDriver: Send + Sync {
    /// Cold-start hydration: every stored thought.
    async fn get_all_thoughts(&self) -> anyhow::Result<Vec<Thought>>;

    /// Cold-start hydration: every stored lexeme.
    async fn get_all_lexemes(&self) -> anyhow::Result<Vec<Lexeme>>;

    /// Apply one outbound batch. Shape is identical to the queue's payload.
    async fn apply_deltas(&self, batch: &DeltaBatch) -> anyhow::Result<()>;
}

/// The outbound delta queue and expansion tracker.
///
/// The sync queue is the sole writer of the outbound queue; no other
/// component appends to it.
#[derive(Default)]
pub struct SyncQueue {
    local_pending: DeltaBatch,
    remote_pending: DeltaBatch,
    focal: Option<Path>,
    options: ExpansionOptions,
    expanded: HashSet<ThoughtId>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new focal path (and display options), recomputing the
    /// expansion set against the current store.
    pub fn set_focus(&mut self, store: &ThoughtStore, focal: Option<Path>, options: ExpansionOptions) {
        self.focal = focal;
        self.options = options;
        self.recompute_expansion(store);
    }

    /// The expansion set as of the last apply/focus change.
    pub fn expanded(&self) -> &HashSet<ThoughtId> {
        &self.expanded
    }

    /// Whether any deltas are waiting to be flushed.
    pub fn has_pending(&self) -> bool {
        !self.local_pending.is_empty() || !self.remote_pending.is_empty()
    }

    /// Merge a delta batch into the store, recompute expansion, and queue
    /// the same deltas outbound under `routing`.
    ///
    /// Within the batch (and across batches coalesced before the next
    /// flush) the last delta for a given id wins.
    pub fn apply_deltas(&mut self, store: &mut ThoughtStore, batch: DeltaBatch, routing: Routing) {
        apply_batch_to_store(store, &batch);
        self.recompute_expansion(store);

        if routing.local {
            self.local_pending.merge(batch.clone());
        }
        if routing.remote {
            self.remote_pending.merge(batch);
        }
    }

    /// Drain the outbound queue into the given drivers. Everything queued
    /// since the previous flush goes out as one coalesced payload per side.
    pub async fn flush(
        &mut self,
        local: Option<&dyn PersistenceDriver>,
        remote: Option<&dyn PersistenceDriver>,
    ) -> anyhow::Result<usize> {
        let mut flushed = 0;

        if let Some(driver) = local {
            let batch = std::mem::take(&mut self.local_pending);
            if !batch.is_empty() {
                driver.apply_deltas(&batch).await?;
                flushed += 1;
            }
        }
        if let Some(driver) = remote {
            let batch = std::mem::take(&mut self.remote_pending);
            if !batch.is_empty() {
                driver.apply_deltas(&batch).await?;
                flushed += 1;
            }
        }

        tracing::debug!(flushed, "sync queue flushed");
        Ok(flushed)
    }

    fn recompute_expansion(&mut self, store: &ThoughtStore) {
        self.expanded = match &self.focal {
            Some(focal) => expand_thoughts(store, focal, &self.options),
            None => HashSet::new(),
        };
    }
}

/// Merge one batch into a store: upserts replace, tombstones remove.
fn apply_batch_to_store(store: &mut ThoughtStore, batch: &DeltaBatch) {
    for thought in &batch.thought_upserts {
        store.upsert_thought(thought.clone());
    }
    for lexeme in &batch.lexeme_upserts {
        store.upsert_lexeme(lexeme.clone());
    }
    for tombstone in &batch.tombstones {
        match tombstone {
            Tombstone::Thought(id) => {
                store.remove_thought(id);
            }
            Tombstone::Lexeme(value) => {
                store.remove_lexeme(value);
            }
        }
    }
}

/// Hydrate an empty store from a persistence driver (cold start).
pub async fn hydrate(store: &mut ThoughtStore, driver: &dyn PersistenceDriver) -> anyhow::Result<()> {
    for thought in driver.get_all_thoughts().await? {
        store.upsert_thought(thought);
    }
    for lexeme in driver.get_all_lexemes().await? {
        store.upsert_lexeme(lexeme);
    }
    Ok(())
}

/// Reconcile two snapshots by last-write-wins.
///
/// For every entity present in either snapshot, the newer `last_updated`
/// wins; an entity missing from one side is copied to it. The implicit
/// root and system contexts are "topped up" instead - their children are
/// unioned, since both sides grow them independently.
pub fn reconcile(local: &ThoughtStore, remote: &ThoughtStore) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    let mut thought_ids: HashSet<&ThoughtId> = local.all_thoughts().map(|t| &t.id).collect();
    thought_ids.extend(remote.all_thoughts().map(|t| &t.id));

    for id in thought_ids {
        let l = local.get_thought(id);
        let r = remote.get_thought(id);
        match (l, r) {
            (Some(l), Some(r)) if id == ROOT_ID || id == SYSTEM_ID => {
                let merged = top_up(l, r);
                if merged.children != l.children {
                    plan.to_local.record_thought(merged.clone());
                }
                if merged.children != r.children {
                    plan.to_remote.record_thought(merged);
                }
            }
            (Some(l), Some(r)) => {
                if l.last_updated > r.last_updated {
                    plan.to_remote.record_thought(l.clone());
                } else if r.last_updated > l.last_updated {
                    plan.to_local.record_thought(r.clone());
                }
            }
            (Some(l), None) => plan.to_remote.record_thought(l.clone()),
            (None, Some(r)) => plan.to_local.record_thought(r.clone()),
            (None, None) => unreachable!(),
        }
    }

    let mut lexeme_values: HashSet<&String> = local.all_lexemes().map(|l| &l.value).collect();
    lexeme_values.extend(remote.all_lexemes().map(|l| &l.value));

    for value in lexeme_values {
        let l = local.get_lexeme(value);
        let r = remote.get_lexeme(value);
        match (l, r) {
            (Some(l), Some(r)) => {
                if l.last_updated > r.last_updated {
                    plan.to_remote.record_lexeme(l.clone());
                } else if r.last_updated > l.last_updated {
                    plan.to_local.record_lexeme(r.clone());
                }
            }
            (Some(l), None) => plan.to_remote.record_lexeme(l.clone()),
            (None, Some(r)) => plan.to_local.record_lexeme(r.clone()),
            (None, None) => unreachable!(),
        }
    }

    plan
}

/// Union of both sides' children, local order first, newer timestamp kept.
fn top_up(l: &Thought, r: &Thought) -> Thought {
    let mut merged = if l.last_updated >= r.last_updated {
        l.clone()
    } else {
        r.clone()
    };
    let mut children = l.children.clone();
    for child in &r.children {
        if !children.contains(child) {
            children.push(child.clone());
        }
    }
    merged.children = children;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROOT_ID;
    use crate::services::mutation::MutationEngine;
    use std::sync::Mutex;

    /// In-memory persistence driver for round-trip tests.
    #[derive(Default)]
    struct MemoryDriver {
        batches: Mutex<Vec<DeltaBatch>>,
    }

    #[async_trait]
    impl PersistenceDriver for MemoryDriver {
        async fn get_all_thoughts(&self) -> anyhow::Result<Vec<Thought>> {
            let mut store = ThoughtStore::new();
            for batch in self.batches.lock().unwrap().iter() {
                apply_batch_to_store(&mut store, batch);
            }
            Ok(store.all_thoughts().cloned().collect())
        }

        async fn get_all_lexemes(&self) -> anyhow::Result<Vec<Lexeme>> {
            let mut store = ThoughtStore::new();
            for batch in self.batches.lock().unwrap().iter() {
                apply_batch_to_store(&mut store, batch);
            }
            Ok(store.all_lexemes().cloned().collect())
        }

        async fn apply_deltas(&self, batch: &DeltaBatch) -> anyhow::Result<()> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    fn root_path() -> Path {
        Path::from_ids([ROOT_ID])
    }

    #[test]
    fn test_apply_deltas_updates_store_and_expansion() {
        let mut store = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();
        let mut queue = SyncQueue::new();
        queue.set_focus(&store, Some(root_path()), ExpansionOptions::default());

        let outcome = engine
            .create_thought(&mut store, &root_path(), "a", 0.0, None)
            .unwrap();
        let id = outcome.created_id.clone().unwrap();

        // Apply against a second store to exercise the merge path.
        let mut replica = ThoughtStore::seeded();
        queue.set_focus(&replica, Some(root_path()), ExpansionOptions::default());
        queue.apply_deltas(&mut replica, outcome.deltas, Routing::BOTH);

        assert!(replica.get_thought(&id).is_some());
        assert!(replica.get_lexeme("a").is_some());
        assert!(queue.expanded().contains(ROOT_ID));
        assert!(queue.has_pending());
    }

    #[tokio::test]
    async fn test_flush_coalesces_batches() {
        let mut store = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();
        let mut queue = SyncQueue::new();
        let driver = MemoryDriver::default();

        // Several mutations in one tick, each applied against a replica...
        let mut replica = ThoughtStore::seeded();
        for (i, value) in ["a", "b", "c"].iter().enumerate() {
            let outcome = engine
                .create_thought(&mut store, &root_path(), value, i as f64, None)
                .unwrap();
            queue.apply_deltas(&mut replica, outcome.deltas, Routing::LOCAL_ONLY);
        }

        // ...flush exactly once.
        let flushed = queue.flush(Some(&driver), None).await.unwrap();
        assert_eq!(flushed, 1);
        assert!(!queue.has_pending());
        assert_eq!(driver.batches.lock().unwrap().len(), 1);

        // Nothing pending - a second flush is a no-op.
        let flushed = queue.flush(Some(&driver), None).await.unwrap();
        assert_eq!(flushed, 0);
    }

    #[tokio::test]
    async fn test_hydrate_round_trip() {
        let mut store = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();
        let mut queue = SyncQueue::new();
        let driver = MemoryDriver::default();

        let outcome = engine
            .create_thought(&mut store, &root_path(), "persisted", 0.0, None)
            .unwrap();
        let id = outcome.created_id.clone().unwrap();
        let mut replica = ThoughtStore::seeded();
        queue.apply_deltas(&mut replica, outcome.deltas, Routing::LOCAL_ONLY);
        queue.flush(Some(&driver), None).await.unwrap();

        let mut cold = ThoughtStore::new();
        hydrate(&mut cold, &driver).await.unwrap();

        assert!(cold.get_thought(&id).is_some());
        assert_eq!(cold.get_contexts("persisted").len(), 1);
    }

    #[test]
    fn test_reconcile_last_write_wins() {
        let mut local = ThoughtStore::seeded();
        let mut remote = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();

        // Same id on both sides, remote newer.
        let shared = engine
            .create_thought(&mut local, &root_path(), "shared", 0.0, None)
            .unwrap()
            .created_id
            .unwrap();
        let mut newer = local.get_thought(&shared).unwrap().clone();
        newer.set_value("shared (edited remotely)".to_string());
        remote.upsert_thought(newer);

        // Local-only thought.
        let local_only = engine
            .create_thought(&mut local, &root_path(), "local only", 1.0, None)
            .unwrap()
            .created_id
            .unwrap();

        let plan = reconcile(&local, &remote);

        assert!(plan
            .to_local
            .thought_upserts
            .iter()
            .any(|t| t.id == shared && t.value.contains("remotely")));
        assert!(plan
            .to_remote
            .thought_upserts
            .iter()
            .any(|t| t.id == local_only));
    }

    #[test]
    fn test_reconcile_tops_up_root_children() {
        let mut local = ThoughtStore::seeded();
        let mut remote = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();

        engine
            .create_thought(&mut local, &root_path(), "mine", 0.0, None)
            .unwrap();
        engine
            .create_thought(&mut remote, &root_path(), "yours", 0.0, None)
            .unwrap();

        let plan = reconcile(&local, &remote);

        // Both sides get a root holding the union, regardless of timestamps.
        let to_local_root = plan
            .to_local
            .thought_upserts
            .iter()
            .find(|t| t.id == ROOT_ID)
            .unwrap();
        let to_remote_root = plan
            .to_remote
            .thought_upserts
            .iter()
            .find(|t| t.id == ROOT_ID)
            .unwrap();
        assert_eq!(to_local_root.children.len(), 2);
        assert_eq!(to_remote_root.children.len(), 2);
    }
}
