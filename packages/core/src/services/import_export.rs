//! Bulk import and export
//!
//! The import collaborator supplies nested [`Block`]s; importing under a
//! destination context is equivalent to repeated `create_thought` calls,
//! with given order preserved as ascending ranks. Export is the inverse: a
//! depth-first walk of every visible (non-attribute) descendant. The two
//! round-trip isomorphically - values, order and nesting survive, ids do
//! not.

use crate::models::{Block, Path};
use crate::services::error::MutationError;
use crate::services::expansion::MAX_EXPAND_DEPTH;
use crate::services::mutation::{MutationEngine, MutationOutcome};
use crate::store::ThoughtStore;
use std::collections::HashSet;

/// Insert `blocks` under the thought at `context`'s tail, in order.
///
/// Same-valued siblings merge on the way in (the store never holds
/// duplicates), so importing a block whose text matches an existing child
/// folds the block's children under that child.
pub fn import_blocks(
    engine: &mut MutationEngine,
    store: &mut ThoughtStore,
    context: &Path,
    blocks: &[Block],
) -> Result<MutationOutcome, MutationError> {
    let mut outcome = MutationOutcome::default();
    import_level(engine, store, context, blocks, &mut outcome, 0)?;
    Ok(outcome)
}

fn import_level(
    engine: &mut MutationEngine,
    store: &mut ThoughtStore,
    context: &Path,
    blocks: &[Block],
    outcome: &mut MutationOutcome,
    depth: usize,
) -> Result<(), MutationError> {
    if depth >= MAX_EXPAND_DEPTH {
        tracing::warn!("import depth bound reached; truncating");
        return Ok(());
    }

    // Continue after the destination's existing children.
    let mut rank = context
        .head_id()
        .map(|parent_id| {
            store
                .get_children(parent_id)
                .last()
                .map_or(0.0, |c| c.rank + 1.0)
        })
        .unwrap_or(0.0);

    for block in blocks {
        let created = engine.create_thought(store, context, &block.text, rank, None)?;
        let child_id = created.created_id.clone();
        outcome.absorb(created);
        rank += 1.0;

        if let Some(child_id) = child_id {
            if !block.children.is_empty() {
                let child_context = context.append(child_id);
                import_level(engine, store, &child_context, &block.children, outcome, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Depth-first export of every visible descendant of the thought at
/// `context`'s tail. Attribute (`=`-prefixed) subtrees are excluded.
pub fn export_blocks(store: &ThoughtStore, context: &Path) -> Vec<Block> {
    let Some(id) = context.head_id() else {
        return Vec::new();
    };
    let mut visited = HashSet::new();
    export_level(store, id, &mut visited, 0)
}

fn export_level(
    store: &ThoughtStore,
    id: &str,
    visited: &mut HashSet<String>,
    depth: usize,
) -> Vec<Block> {
    if depth >= MAX_EXPAND_DEPTH || !visited.insert(id.to_string()) {
        tracing::warn!(%id, "export walk bounded; truncating");
        return Vec::new();
    }

    store
        .get_children(id)
        .iter()
        .filter(|child| !child.is_attribute())
        .map(|child| Block {
            text: child.value.clone(),
            children: export_level(store, &child.id, visited, depth + 1),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROOT_ID;

    fn root_path() -> Path {
        Path::from_ids([ROOT_ID])
    }

    fn sample_blocks() -> Vec<Block> {
        vec![
            Block::with_children(
                "projects",
                vec![
                    Block::with_children("outliner", vec![Block::leaf("ship it")]),
                    Block::leaf("garden"),
                ],
            ),
            Block::leaf("inbox"),
        ]
    }

    #[test]
    fn test_import_preserves_order_as_ranks() {
        let mut store = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();

        import_blocks(&mut engine, &mut store, &root_path(), &sample_blocks()).unwrap();

        let children = store.get_children(ROOT_ID);
        let values: Vec<&str> = children.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["projects", "inbox"]);
        assert!(children[0].rank < children[1].rank);

        let projects = children[0].id.clone();
        let nested: Vec<&str> = store
            .get_children(&projects)
            .iter()
            .map(|c| c.value.as_str())
            .collect();
        assert_eq!(nested, vec!["outliner", "garden"]);
    }

    #[test]
    fn test_import_merges_duplicate_siblings() {
        let mut store = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();

        import_blocks(&mut engine, &mut store, &root_path(), &sample_blocks()).unwrap();
        // Importing again folds into the existing thoughts.
        import_blocks(&mut engine, &mut store, &root_path(), &sample_blocks()).unwrap();

        assert_eq!(store.get_children(ROOT_ID).len(), 2);
        assert_eq!(store.get_contexts("projects").len(), 1);
    }

    #[test]
    fn test_round_trip_is_isomorphic() {
        let mut store = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();
        let blocks = sample_blocks();

        import_blocks(&mut engine, &mut store, &root_path(), &blocks).unwrap();
        let exported = export_blocks(&store, &root_path());
        assert_eq!(exported, blocks);

        // Re-import the export elsewhere and export again: still isomorphic.
        let elsewhere = engine
            .create_thought(&mut store, &root_path(), "copy", 10.0, None)
            .unwrap()
            .created_id
            .unwrap();
        let copy_path = root_path().append(elsewhere);
        import_blocks(&mut engine, &mut store, &copy_path, &exported).unwrap();
        assert_eq!(export_blocks(&store, &copy_path), blocks);
    }

    #[test]
    fn test_export_excludes_attributes() {
        let mut store = ThoughtStore::seeded();
        let mut engine = MutationEngine::new();
        engine
            .create_thought(&mut store, &root_path(), "visible", 0.0, None)
            .unwrap();
        engine
            .create_thought(&mut store, &root_path(), "=pin", 1.0, None)
            .unwrap();

        let exported = export_blocks(&store, &root_path());
        assert_eq!(exported, vec![Block::leaf("visible")]);
    }
}
