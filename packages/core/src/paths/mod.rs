//! Path Resolution
//!
//! Pure path algebra lives on [`Path`]/[`SimplePath`] themselves; this module
//! adds the resolvers that need the store:
//!
//! - [`split_chain`] - decompose a path that crosses context-view boundaries
//!   into contiguous tree-shaped segments
//! - [`rank_path_from_values`] - resolve a sequence of bare values to a
//!   concrete ranked path
//! - [`path_hash`] / [`resolve_hash`] - the stable per-path hash consumed by
//!   the navigation collaborator to persist the cursor across restarts
//!
//! All walks over lexeme contexts are depth-bounded and visited-set guarded:
//! context-view traversal can revisit an id, and a cycle must degrade to a
//! best-effort partial result, never an infinite loop.

use crate::models::{normalize, Path, SimplePath, ThoughtId, ROOT_ID};
use crate::services::expansion::MAX_EXPAND_DEPTH;
use crate::store::ThoughtStore;
use std::collections::HashSet;

/// Separator used by [`path_hash`]. Ids are UUIDs or `__`-delimited tokens,
/// so a tilde can never collide with id content.
const HASH_SEPARATOR: char = '~';

/// Decompose `path` into contiguous [`SimplePath`] segments.
///
/// Walks `path` left to right accumulating ids into the current segment.
/// Whenever the id at position `i` is in `context_views` and is not the last
/// element, the current segment is closed and a new one opens, rooted at the
/// *other* parent of the next id: the next id is an occurrence of the viewed
/// value under a different parent, found through its own lexeme entry.
///
/// This is the mechanism that linearizes the multi-parent value graph into
/// tree-shaped paths for traversal and rendering.
///
/// Degrades on inconsistency: an id whose lexeme occurrence cannot be
/// confirmed starts its segment without a parent root, and a revisited
/// segment root (context-view cycle) truncates the walk with a warning.
pub fn split_chain(
    store: &ThoughtStore,
    path: &Path,
    context_views: &HashSet<ThoughtId>,
) -> Vec<SimplePath> {
    let ids = path.ids();
    if ids.is_empty() {
        return Vec::new();
    }

    let mut segments: Vec<SimplePath> = Vec::new();
    let mut current: Vec<ThoughtId> = Vec::new();
    let mut seen_roots: HashSet<ThoughtId> = HashSet::new();

    for (i, id) in ids.iter().enumerate() {
        current.push(id.clone());

        let crosses_boundary = context_views.contains(id) && i + 1 < ids.len();
        if !crosses_boundary {
            continue;
        }
        if segments.len() >= MAX_EXPAND_DEPTH {
            tracing::warn!(path_len = ids.len(), "split_chain exceeded depth bound");
            break;
        }

        segments.push(SimplePath(std::mem::take(&mut current)));

        // The next id names an occurrence of the viewed value under another
        // parent. Confirm it through its lexeme and root the new segment at
        // that parent.
        let next_id = &ids[i + 1];
        let other_parent = store.get_thought(next_id).and_then(|next| {
            let confirmed = store
                .get_lexeme(&next.value)
                .is_some_and(|lexeme| lexeme.contexts.iter().any(|c| &c.thought_id == next_id));
            if !confirmed {
                tracing::warn!(id = %next_id, "context-view hop not present in lexeme; skipping root");
                return None;
            }
            next.parent_id.clone()
        });

        if let Some(parent_id) = other_parent {
            if !seen_roots.insert(parent_id.clone()) {
                tracing::warn!(root = %parent_id, "context-view cycle detected; truncating chain");
                return segments;
            }
            current.push(parent_id);
        }
    }

    if !current.is_empty() {
        segments.push(SimplePath(current));
    }
    segments
}

/// Resolve a sequence of bare values to a concrete ranked path under the
/// root.
///
/// At each step the candidates are the current parent's children matching
/// the next normalized value. Ambiguity between same-valued siblings is
/// broken by preferring the candidate whose own children contain the value
/// that follows; the first such match wins. That tie-break is deliberate:
/// callers address by value, and the continuation is the only signal that
/// distinguishes duplicates.
///
/// Returns `None` when any value fails to resolve.
pub fn rank_path_from_values(store: &ThoughtStore, values: &[&str]) -> Option<SimplePath> {
    let mut ids: Vec<ThoughtId> = Vec::with_capacity(values.len());
    let mut parent_id: ThoughtId = ROOT_ID.to_string();

    for (i, value) in values.iter().enumerate() {
        let key = normalize(value);
        let candidates: Vec<ThoughtId> = store
            .get_children(&parent_id)
            .into_iter()
            .filter(|child| normalize(&child.value) == key)
            .map(|child| child.id.clone())
            .collect();

        let chosen = match candidates.len() {
            0 => return None,
            1 => candidates[0].clone(),
            _ => {
                let next_key = values.get(i + 1).map(|v| normalize(v));
                candidates
                    .iter()
                    .find(|candidate| {
                        let Some(next_key) = &next_key else {
                            return false;
                        };
                        store
                            .get_children(candidate.as_str())
                            .iter()
                            .any(|grandchild| &normalize(&grandchild.value) == next_key)
                    })
                    .cloned()
                    .unwrap_or_else(|| candidates[0].clone())
            }
        };

        ids.push(chosen.clone());
        parent_id = chosen;
    }

    Some(SimplePath(ids))
}

/// Deterministic, invertible hash of a path's ordered id sequence.
pub fn path_hash(path: &Path) -> String {
    path.ids().join(&HASH_SEPARATOR.to_string())
}

/// Resolve a [`path_hash`] string back to a path, verifying every id still
/// resolves in the store. Returns `None` for an empty or stale hash.
pub fn resolve_hash(store: &ThoughtStore, hash: &str) -> Option<Path> {
    if hash.is_empty() {
        return None;
    }
    let ids: Vec<ThoughtId> = hash.split(HASH_SEPARATOR).map(str::to_string).collect();
    if ids.iter().all(|id| store.contains_thought(id)) {
        Some(Path(ids))
    } else {
        None
    }
}
