//! Documentation tree model and the seeded project template.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

const DOC_TREE_TEMPLATE: &str = include_str!("../templates/doc_tree.json");

/// A node in the documentation tree.
///
/// Folder children are shared (`Arc`) so that copy-on-write updates only
/// reallocate the spine from the root to the edited file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocNode {
    Folder {
        name: String,
        description: String,
        children: Vec<Arc<DocNode>>,
    },
    File {
        name: String,
        description: String,
        content: String,
    },
}

impl DocNode {
    pub fn folder(name: &str, description: &str, children: Vec<DocNode>) -> Self {
        DocNode::Folder {
            name: name.to_string(),
            description: description.to_string(),
            children: children.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn file(name: &str, description: &str, content: &str) -> Self {
        DocNode::File {
            name: name.to_string(),
            description: description.to_string(),
            content: content.to_string(),
        }
    }

    /// Path segment of this node (unique among its siblings).
    pub fn name(&self) -> &str {
        match self {
            DocNode::Folder { name, .. } | DocNode::File { name, .. } => name,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, DocNode::File { .. })
    }

    /// File body, or `None` for folders.
    pub fn content(&self) -> Option<&str> {
        match self {
            DocNode::File { content, .. } => Some(content),
            DocNode::Folder { .. } => None,
        }
    }

    /// Children in display order; empty for files.
    pub fn children(&self) -> &[Arc<DocNode>] {
        match self {
            DocNode::Folder { children, .. } => children,
            DocNode::File { .. } => &[],
        }
    }
}

/// The documentation scaffold every session starts from (root folder `docs`).
pub fn default_tree() -> Arc<DocNode> {
    let tree: DocNode = serde_json::from_str(DOC_TREE_TEMPLATE)
        .expect("embedded documentation template should be valid");
    Arc::new(tree)
}
