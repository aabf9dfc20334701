//! Path addressing for the documentation tree.
//!
//! A path is the `/`-joined sequence of node names starting with the root's
//! own name (e.g. `docs/design/api_design.md`).

use crate::tree::DocNode;

/// Resolve `path` against `root`.
///
/// Returns `None` when the first segment is not the root's name or any later
/// segment has no matching child.
pub fn resolve<'a>(root: &'a DocNode, path: &str) -> Option<&'a DocNode> {
    if path.is_empty() {
        return None;
    }
    let mut segments = path.split('/');
    if segments.next() != Some(root.name()) {
        return None;
    }

    let mut current = root;
    for segment in segments {
        current = current
            .children()
            .iter()
            .find(|child| child.name() == segment)
            .map(|child| &**child)?;
    }
    Some(current)
}

/// Return every file path in depth-first display order.
pub fn file_paths(root: &DocNode) -> Vec<String> {
    let mut paths = Vec::new();
    let mut prefix = Vec::new();
    file_paths_inner(root, &mut prefix, &mut paths);
    paths
}

fn file_paths_inner<'a>(node: &'a DocNode, prefix: &mut Vec<&'a str>, out: &mut Vec<String>) {
    prefix.push(node.name());
    match node {
        DocNode::File { .. } => out.push(prefix.join("/")),
        DocNode::Folder { children, .. } => {
            for child in children {
                file_paths_inner(child, prefix, out);
            }
        }
    }
    prefix.pop();
}
