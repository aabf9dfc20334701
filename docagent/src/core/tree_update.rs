//! Copy-on-write file edits with structural sharing.

use std::sync::Arc;

use crate::core::path::resolve;
use crate::tree::DocNode;

/// Replace the content of the file at `path`, returning the new root.
///
/// Only the nodes on the path from the root to the file are reallocated; every
/// other subtree is the same `Arc` as in `root`. When `path` does not resolve
/// to a file (missing path or folder) the original root is returned unchanged.
pub fn update_file(root: &Arc<DocNode>, path: &str, content: &str) -> Arc<DocNode> {
    if !resolve(root, path).is_some_and(DocNode::is_file) {
        return Arc::clone(root);
    }
    // The first segment is the root's own name (checked by `resolve`).
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    rebuild(root, &segments, content)
}

fn rebuild(node: &Arc<DocNode>, rest: &[&str], content: &str) -> Arc<DocNode> {
    let Some((head, tail)) = rest.split_first() else {
        return match node.as_ref() {
            DocNode::File {
                name, description, ..
            } => Arc::new(DocNode::File {
                name: name.clone(),
                description: description.clone(),
                content: content.to_string(),
            }),
            DocNode::Folder { .. } => Arc::clone(node),
        };
    };

    match node.as_ref() {
        DocNode::Folder {
            name,
            description,
            children,
        } => {
            let children = children
                .iter()
                .map(|child| {
                    if child.name() == *head {
                        rebuild(child, tail, content)
                    } else {
                        Arc::clone(child)
                    }
                })
                .collect();
            Arc::new(DocNode::Folder {
                name: name.clone(),
                description: description.clone(),
                children,
            })
        }
        DocNode::File { .. } => Arc::clone(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_tree;

    #[test]
    fn update_then_resolve_returns_new_content() {
        let root = sample_tree();
        let next = update_file(&root, "docs/design/uml/class.md", "classDiagram\n");
        let node = resolve(&next, "docs/design/uml/class.md").expect("resolves");
        assert_eq!(node.content(), Some("classDiagram\n"));
        // Original tree is untouched.
        let old = resolve(&root, "docs/design/uml/class.md").expect("resolves");
        assert_eq!(old.content(), Some(""));
    }

    #[test]
    fn unaffected_subtrees_are_shared() {
        let root = sample_tree();
        let next = update_file(&root, "docs/design/api.md", "GET /users\n");

        assert!(!Arc::ptr_eq(&root, &next));
        // README.md and notes.md are siblings of the edited spine.
        assert!(Arc::ptr_eq(&root.children()[0], &next.children()[0]));
        assert!(Arc::ptr_eq(&root.children()[2], &next.children()[2]));
        // `uml` is a sibling of the edited file inside `design`.
        let old_design = &root.children()[1];
        let new_design = &next.children()[1];
        assert!(!Arc::ptr_eq(old_design, new_design));
        assert!(Arc::ptr_eq(&old_design.children()[1], &new_design.children()[1]));
    }

    #[test]
    fn update_is_idempotent() {
        let root = sample_tree();
        let once = update_file(&root, "docs/README.md", "# New\n");
        let twice = update_file(&once, "docs/README.md", "# New\n");
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_path_is_a_no_op() {
        let root = sample_tree();
        let next = update_file(&root, "docs/MISSING.md", "lost");
        assert!(Arc::ptr_eq(&root, &next));
    }

    #[test]
    fn folder_path_is_a_no_op() {
        let root = sample_tree();
        let next = update_file(&root, "docs/design", "not a file");
        assert!(Arc::ptr_eq(&root, &next));
    }

    #[test]
    fn empty_content_is_applied() {
        let root = sample_tree();
        let next = update_file(&root, "docs/README.md", "");
        assert_eq!(
            resolve(&next, "docs/README.md").and_then(DocNode::content),
            Some("")
        );
    }
}
