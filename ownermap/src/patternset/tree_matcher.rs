use std::{collections::HashMap, path::Path};

use crate::path_tree::{NodeId, PathTree};

use super::nfa::{Nfa, StateId};

/// Matches a batch of paths against a set of patterns. The paths are first
/// arranged into a [`PathTree`], so each directory is stepped through the NFA
/// once however many files sit in it, and whole subtrees are skipped as soon
/// as no state survives.
#[derive(Clone)]
pub struct TreeMatcher {
    nfa: Nfa,
}

impl TreeMatcher {
    pub(crate) fn new(nfa: Nfa) -> TreeMatcher {
        Self { nfa }
    }

    /// Map each matched path, as given, to the ascending ids of the patterns
    /// that match it. Paths that match nothing are left out, as are paths
    /// that climb out of the repository with `..`.
    pub fn matches_for_paths(&self, paths: &[impl AsRef<Path>]) -> HashMap<String, Vec<usize>> {
        let mut tree = PathTree::new();
        for path in paths {
            tree.insert(path);
        }

        let mut matches = HashMap::new();
        let root = tree.node(PathTree::root_id());
        for (segment, &child) in &root.children {
            let states = self.nfa.step(&self.nfa.initial_states(), segment);
            self.visit(&tree, child, states, &mut matches);
        }

        tracing::trace!(
            paths = paths.len(),
            matched = matches.len(),
            "matched paths against pattern set"
        );
        matches
    }

    fn visit(
        &self,
        tree: &PathTree,
        node_id: NodeId,
        states: Vec<StateId>,
        matches: &mut HashMap<String, Vec<usize>>,
    ) {
        if states.is_empty() {
            return;
        }

        let node = tree.node(node_id);
        if !node.paths.is_empty() {
            let accepted = self.nfa.accepted_patterns(&states);
            if !accepted.is_empty() {
                for path in &node.paths {
                    matches.insert(path.clone(), accepted.clone());
                }
            }
        }

        for (segment, &child) in &node.children {
            self.visit(tree, child, self.nfa.step(&states, segment), matches);
        }
    }
}
