use std::{collections::HashMap, path::Path};

use crate::patternset::path_segments;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeId(pub(crate) usize);

pub(crate) struct Node {
    pub(crate) children: HashMap<String, NodeId>,
    pub(crate) paths: Vec<String>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            paths: Vec::new(),
        }
    }
}

/// A trie of path segments. Paths that share a directory share the nodes for
/// that directory, so batch matching only steps through each directory once.
pub(crate) struct PathTree {
    nodes: Vec<Node>,
}

impl PathTree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
        }
    }

    pub(crate) fn root_id() -> NodeId {
        NodeId(0)
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Add `path` under the node for its normalised segments. Paths that climb
    /// out of the root with `..` have no node and are left out.
    pub(crate) fn insert(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let Some(segments) = path_segments(path) else {
            return;
        };

        let node_id = segments.into_iter().fold(Self::root_id(), |parent, segment| {
            if let Some(&child) = self.nodes[parent.0].children.get(&*segment) {
                return child;
            }
            let child = NodeId(self.nodes.len());
            self.nodes.push(Node::new());
            self.nodes[parent.0].children.insert(segment.into_owned(), child);
            child
        });
        self.nodes[node_id.0]
            .paths
            .push(path.to_string_lossy().into_owned());
    }
}
