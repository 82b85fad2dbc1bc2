//! Path Data Structures
//!
//! A path addresses a thought by the ordered id sequence leading to it.
//! Two flavors exist:
//!
//! - [`SimplePath`] - contiguous, cycle-free real parent-to-child edges only
//! - [`Path`] - may additionally cross context-view boundaries, where a
//!   segment continues under one of the value's *other* parents
//!
//! Both are thin newtypes over `Vec<ThoughtId>`; the algebra here is pure
//! and error-free. Context-view decomposition of a [`Path`] into
//! [`SimplePath`] segments lives in [`crate::paths`].

use crate::models::ThoughtId;
use serde::{Deserialize, Serialize};

/// A contiguous sequence of real parent→child edges, root-relative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimplePath(pub Vec<ThoughtId>);

/// A navigable id sequence that may cross context-view boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<ThoughtId>);

macro_rules! path_algebra {
    ($ty:ident) => {
        impl $ty {
            /// Path holding the given id sequence.
            pub fn from_ids<I, S>(ids: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<ThoughtId>,
            {
                Self(ids.into_iter().map(Into::into).collect())
            }

            /// The addressed thought: the last id in the sequence.
            pub fn head_id(&self) -> Option<&ThoughtId> {
                self.0.last()
            }

            /// Path of the parent, or `None` at the root.
            pub fn parent(&self) -> Option<Self> {
                if self.0.len() <= 1 {
                    None
                } else {
                    Some(Self(self.0[..self.0.len() - 1].to_vec()))
                }
            }

            /// Path extended by one child id.
            pub fn append(&self, id: impl Into<ThoughtId>) -> Self {
                let mut ids = self.0.clone();
                ids.push(id.into());
                Self(ids)
            }

            /// The raw id sequence.
            pub fn ids(&self) -> &[ThoughtId] {
                &self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Whether `prefix` is a (non-strict) leading subsequence.
            pub fn starts_with(&self, prefix: &Self) -> bool {
                self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
            }
        }
    };
}

path_algebra!(SimplePath);
path_algebra!(Path);

impl From<SimplePath> for Path {
    fn from(simple: SimplePath) -> Self {
        Path(simple.0)
    }
}

impl Path {
    /// Reinterpret as a [`SimplePath`]. Only valid when the caller knows the
    /// sequence crosses no context-view boundary.
    pub fn as_simple(&self) -> SimplePath {
        SimplePath(self.0.clone())
    }

    /// Replace the leading `old_prefix` with `new_prefix`, preserving any
    /// descendant suffix. Returns `None` when `old_prefix` is not a prefix.
    pub fn rebase(&self, old_prefix: &Path, new_prefix: &Path) -> Option<Path> {
        if !self.starts_with(old_prefix) {
            return None;
        }
        let mut ids = new_prefix.0.clone();
        ids.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Some(Path(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_and_append() {
        let path = Path::from_ids(["a", "b", "c"]);

        assert_eq!(path.head_id().map(String::as_str), Some("c"));
        assert_eq!(path.parent(), Some(Path::from_ids(["a", "b"])));
        assert_eq!(path.append("d"), Path::from_ids(["a", "b", "c", "d"]));
    }

    #[test]
    fn test_parent_of_root_is_none() {
        assert_eq!(Path::from_ids(["a"]).parent(), None);
        assert_eq!(Path(Vec::new()).parent(), None);
    }

    #[test]
    fn test_starts_with() {
        let path = Path::from_ids(["a", "b", "c"]);

        assert!(path.starts_with(&Path::from_ids(["a", "b"])));
        assert!(path.starts_with(&path.clone()));
        assert!(!path.starts_with(&Path::from_ids(["a", "x"])));
        assert!(!Path::from_ids(["a"]).starts_with(&path));
    }

    #[test]
    fn test_rebase_preserves_suffix() {
        let cursor = Path::from_ids(["a", "b", "c", "d"]);
        let old_prefix = Path::from_ids(["a", "b"]);
        let new_prefix = Path::from_ids(["x", "b"]);

        assert_eq!(
            cursor.rebase(&old_prefix, &new_prefix),
            Some(Path::from_ids(["x", "b", "c", "d"]))
        );
        assert_eq!(cursor.rebase(&Path::from_ids(["z"]), &new_prefix), None);
    }
}
