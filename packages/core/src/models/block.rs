//! Block import/export shape
//!
//! The nested structure exchanged with the bulk import and export
//! collaborators. Sibling order in `children` is significant and maps to
//! ascending ranks on import.

use serde::{Deserialize, Serialize};

/// One node of an imported or exported outline fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Display text of the node
    pub text: String,

    /// Nested children, in sibling order
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    /// Leaf block with no children.
    pub fn leaf(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Block with the given children.
    pub fn with_children(text: impl Into<String>, children: Vec<Block>) -> Self {
        Self {
            text: text.into(),
            children,
        }
    }
}
