use std::{
    borrow::Cow,
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use super::{
    nfa::{Nfa, StateId},
    path_segments,
};

/// Matches one path at a time against a set of patterns.
///
/// The NFA states reached after each directory are cached, so files in a
/// directory that was seen before only cost one step. The cache is shared by
/// clones and safe to use from several threads. It holds one entry per
/// distinct directory looked up and is never evicted on its own, so a
/// long-lived matcher fed unbounded input should call
/// [`Matcher::clear_cache`] now and then.
#[derive(Clone)]
pub struct Matcher {
    nfa: Nfa,
    directory_states: Arc<RwLock<HashMap<String, Vec<StateId>>>>,
}

impl Matcher {
    pub(crate) fn new(nfa: Nfa) -> Matcher {
        Self {
            nfa,
            directory_states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Ids of the patterns that match `path`, in ascending order. Paths that
    /// are empty or climb out of the repository with `..` match nothing.
    pub fn matching_patterns(&self, path: impl AsRef<Path>) -> Vec<usize> {
        let Some(segments) = path_segments(path.as_ref()) else {
            return Vec::new();
        };
        let Some((file_name, directories)) = segments.split_last() else {
            return Vec::new();
        };

        let states = self.states_after(directories);
        self.nfa.accepted_patterns(&self.nfa.step(&states, file_name))
    }

    /// Drop every cached directory.
    pub fn clear_cache(&self) {
        self.directory_states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[cfg(test)]
    fn cached_directories(&self) -> usize {
        self.directory_states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // States after stepping through `directories`, resuming from the deepest
    // ancestor already in the cache and caching every directory past it.
    fn states_after(&self, directories: &[Cow<'_, str>]) -> Vec<StateId> {
        let keys = directories
            .iter()
            .scan(String::new(), |key, segment| {
                if !key.is_empty() {
                    key.push('/');
                }
                key.push_str(segment);
                Some(key.clone())
            })
            .collect::<Vec<_>>();

        let (depth, mut states) = {
            let cache = self
                .directory_states
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            keys.iter()
                .enumerate()
                .rev()
                .find_map(|(idx, key)| cache.get(key).map(|states| (idx + 1, states.clone())))
                .unwrap_or_else(|| (0, self.nfa.initial_states()))
        };
        if depth == directories.len() {
            return states;
        }

        let mut computed = Vec::with_capacity(directories.len() - depth);
        for (segment, key) in directories[depth..].iter().zip(&keys[depth..]) {
            states = self.nfa.step(&states, segment);
            computed.push((key.clone(), states.clone()));
        }

        self.directory_states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(computed);
        states
    }
}
