//! Tree structure for hierarchical panel display

use crate::store::Store;

/// Tree node for hierarchical display
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// A folder containing child nodes
    Folder {
        name: String,
        /// Full folder path
        path: String,
        collapsed: bool,
        children: Vec<TreeNode>,
    },
    /// A leaf input (full path into the store)
    Input(String),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Folder { name, .. } => name,
            TreeNode::Input(path) => path,
        }
    }
}

/// Build the display tree of every live input
///
/// Inputs are visited in display order, so folders appear where their
/// first input does.
pub fn build_tree(store: &Store) -> Vec<TreeNode> {
    let separator = store.config().separator.clone();
    let mut root_nodes: Vec<TreeNode> = Vec::new();

    for path in store.paths() {
        let parts: Vec<&str> = path.split(separator.as_str()).collect();
        insert_into_tree(store, &separator, &mut root_nodes, &parts, 0, &path);
    }

    root_nodes
}

fn insert_into_tree(
    store: &Store,
    separator: &str,
    nodes: &mut Vec<TreeNode>,
    parts: &[&str],
    depth: usize,
    full_path: &str,
) {
    if depth >= parts.len() {
        return;
    }

    if depth == parts.len() - 1 {
        nodes.push(TreeNode::Input(full_path.to_string()));
        return;
    }

    let folder_name = parts[depth];
    let existing = nodes
        .iter()
        .position(|n| matches!(n, TreeNode::Folder { name, .. } if name == folder_name));

    let idx = match existing {
        Some(idx) => idx,
        None => {
            let path = parts[..=depth].join(separator);
            let collapsed = store
                .folder_settings(&path)
                .map(|s| s.collapsed)
                .unwrap_or(store.config().folder.collapsed);
            nodes.push(TreeNode::Folder {
                name: folder_name.to_string(),
                path,
                collapsed,
                children: Vec::new(),
            });
            nodes.len() - 1
        }
    };

    if let TreeNode::Folder { children, .. } = &mut nodes[idx] {
        insert_into_tree(store, separator, children, parts, depth + 1, full_path);
    }
}
