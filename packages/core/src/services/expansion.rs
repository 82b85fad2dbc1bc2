//! Expansion Engine - which thoughts are visible around a focus
//!
//! Given a focal path, computes the set of thought ids whose children should
//! be considered expanded. The set drives both rendering and prefetch: a
//! collapsed-but-about-to-expand subtree that is still `pending` must be
//! pulled from persistence before the user reaches it.
//!
//! The computation is recursive but strictly bounded by
//! [`MAX_EXPAND_DEPTH`] and a seen-set, because context-view traversal can
//! revisit ids.

use crate::models::{normalize, Path, Thought, ThoughtId};
use crate::store::ThoughtStore;
use std::collections::HashSet;

/// Depth bound shared by every recursive walk that can cross context-view
/// boundaries.
pub const MAX_EXPAND_DEPTH: usize = 100;

/// Per-session display state consulted during expansion.
#[derive(Debug, Clone, Default)]
pub struct ExpansionOptions {
    /// Thought ids currently toggled into context-view mode
    pub context_views: HashSet<ThoughtId>,

    /// Show `=`-prefixed attribute thoughts
    pub show_hidden: bool,
}

/// Compute the expanded set for `focal`.
///
/// Always contains the focal path's own ids (the ancestor chain stays
/// visible above the focus), windowed to the last [`MAX_EXPAND_DEPTH`]
/// entries. From the focal thought downward, a child is additionally
/// expanded when any of:
///
/// - it lies on the focal path itself
/// - it carries a `=pin` marker, or its parent pins all children
///   (`=children` containing `=pin`)
/// - its parent is in table view (`=view` containing `Table`), which
///   auto-expands the first column
/// - it is its parent's only non-hidden child and not an external-link leaf
pub fn expand_thoughts(
    store: &ThoughtStore,
    focal: &Path,
    options: &ExpansionOptions,
) -> HashSet<ThoughtId> {
    let mut expanded: HashSet<ThoughtId> = HashSet::new();
    let Some(focal_tail) = focal.head_id() else {
        return expanded;
    };

    // The ancestor window above the focus is bounded like the downward walk.
    let window_start = focal.len().saturating_sub(MAX_EXPAND_DEPTH);
    let window = &focal.ids()[window_start..];
    for id in window {
        expanded.insert(id.clone());
    }
    let on_focal_chain: HashSet<&ThoughtId> = window.iter().collect();

    expand_from(store, &mut expanded, focal_tail, 0, options, &on_focal_chain);
    expanded
}

fn expand_from(
    store: &ThoughtStore,
    expanded: &mut HashSet<ThoughtId>,
    id: &ThoughtId,
    depth: usize,
    options: &ExpansionOptions,
    on_focal_chain: &HashSet<&ThoughtId>,
) {
    if depth >= MAX_EXPAND_DEPTH {
        tracing::warn!(%id, "expansion depth bound reached");
        return;
    }

    let children = visible_children(store, id, options, on_focal_chain);
    let only_child = children.len() == 1;

    for child in &children {
        if expanded.contains(&child.id) {
            // Already handled (or a context-view cycle); do not re-descend.
            continue;
        }

        let auto_expand = on_focal_chain.contains(&child.id)
            || is_pinned(store, &child.id)
            || pins_all_children(store, id)
            || is_table_view(store, id)
            || (only_child && !is_external_link(child));

        if auto_expand {
            expanded.insert(child.id.clone());
            expand_from(store, expanded, &child.id, depth + 1, options, on_focal_chain);
        }
    }
}

/// Children for expansion purposes: real children normally, lexeme contexts
/// when the node is toggled into context view. Attribute children are
/// excluded unless shown or on the focal chain.
fn visible_children<'a>(
    store: &'a ThoughtStore,
    id: &ThoughtId,
    options: &ExpansionOptions,
    on_focal_chain: &HashSet<&ThoughtId>,
) -> Vec<&'a Thought> {
    let raw: Vec<&Thought> = if options.context_views.contains(id) {
        let Some(thought) = store.get_thought(id) else {
            return Vec::new();
        };
        store
            .get_contexts(&thought.value)
            .iter()
            .filter(|c| &c.thought_id != id)
            .filter_map(|c| store.get_thought(&c.thought_id))
            .collect()
    } else {
        store.get_children(id)
    };

    raw.into_iter()
        .filter(|child| {
            !child.is_attribute() || options.show_hidden || on_focal_chain.contains(&child.id)
        })
        .collect()
}

fn has_attribute_child(store: &ThoughtStore, id: &str, attribute: &str) -> bool {
    store
        .get_children(id)
        .iter()
        .any(|c| normalize(&c.value) == attribute)
}

/// `=pin` directly under the thought.
fn is_pinned(store: &ThoughtStore, id: &str) -> bool {
    has_attribute_child(store, id, "=pin")
}

/// `=children` under the parent containing `=pin`.
fn pins_all_children(store: &ThoughtStore, parent_id: &str) -> bool {
    store
        .get_children(parent_id)
        .iter()
        .filter(|c| normalize(&c.value) == "=children")
        .any(|meta| has_attribute_child(store, &meta.id, "=pin"))
}

/// `=view` under the parent containing `Table`.
fn is_table_view(store: &ThoughtStore, parent_id: &str) -> bool {
    store
        .get_children(parent_id)
        .iter()
        .filter(|c| normalize(&c.value) == "=view")
        .any(|meta| has_attribute_child(store, &meta.id, "table"))
}

/// A leaf whose value is a bare URL; auto-collapse never drills into these.
fn is_external_link(thought: &Thought) -> bool {
    thought.children.is_empty()
        && (thought.value.starts_with("http://") || thought.value.starts_with("https://"))
}
