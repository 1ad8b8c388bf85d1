use super::{
    nfa::{Edge, Nfa, StateId},
    Matcher, TreeMatcher,
};

/// Compiles patterns into one shared NFA, from which either kind of matcher
/// can be built. Patterns with a common prefix share the states for it.
#[derive(Clone)]
pub struct Builder {
    nfa: Nfa,
    patterns: usize,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            nfa: Nfa::new(),
            patterns: 0,
        }
    }

    /// Build a [`Matcher`] for one-path-at-a-time lookups.
    pub fn build(self) -> Matcher {
        Matcher::new(self.nfa)
    }

    /// Build a [`TreeMatcher`] for matching many paths at once.
    pub fn build_tree_matcher(self) -> TreeMatcher {
        TreeMatcher::new(self.nfa)
    }

    /// Number of patterns added so far.
    pub fn len(&self) -> usize {
        self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns == 0
    }

    /// Compile `pattern` into the NFA and return its id. Ids count up from
    /// zero in the order patterns are added, so a higher id means a later rule.
    pub fn add(&mut self, pattern: &str) -> usize {
        let id = self.patterns;
        self.patterns += 1;

        let shape = PatternShape::parse(pattern);
        let entry = if shape.anchored {
            Nfa::START_STATE
        } else {
            self.any_depth(Nfa::START_STATE)
        };

        let body_end = shape.segments.iter().fold(entry, |state, &glob| match glob {
            "**" => self.any_depth(state),
            _ => self.segment_step(state, glob),
        });

        let accepting = match shape.reach {
            Reach::Exact => body_end,
            Reach::Subtree => self.any_depth(body_end),
            Reach::Contents => {
                let child = self.segment_step(body_end, "*");
                self.any_depth(child)
            }
        };
        self.nfa.state_mut(accepting).accepts.push(id);

        id
    }

    // The state reached from `from` by an edge for `glob`, reusing an existing
    // edge for the same glob. Loop edges are skipped: a loop state can't stand
    // in for the next segment.
    fn segment_step(&mut self, from: StateId, glob: &str) -> StateId {
        let existing = self
            .nfa
            .edges_from(from)
            .find(|edge| edge.glob == glob && edge.target != from)
            .map(|edge| edge.target);
        existing.unwrap_or_else(|| {
            let target = self.nfa.add_state();
            self.nfa.state_mut(from).edges.push(Edge::new(glob, target));
            target
        })
    }

    // A state that accepts `from` followed by zero or more segments of any
    // name. `from` itself qualifies if it already loops, which collapses
    // repeated `**`.
    fn any_depth(&mut self, from: StateId) -> StateId {
        if self.loops_on_any_segment(from) {
            return from;
        }
        if let Some(target) = self.nfa.state(from).epsilon {
            return target;
        }

        let target = self.nfa.add_state();
        self.nfa.state_mut(target).edges.push(Edge::new("*", target));
        self.nfa.state_mut(from).epsilon = Some(target);
        target
    }

    fn loops_on_any_segment(&self, id: StateId) -> bool {
        self.nfa
            .edges_from(id)
            .any(|edge| edge.glob == "*" && edge.target == id)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// How far below the matched segments a pattern reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    /// Only paths that end on the last segment. Used for a trailing `*`,
    /// which owns the files directly in a directory and nothing deeper.
    Exact,
    /// The matched path and everything under it.
    Subtree,
    /// Everything under the matched directory, but not the directory itself.
    /// Written as a trailing `/` or `/**`.
    Contents,
}

#[derive(Debug, PartialEq, Eq)]
struct PatternShape<'a> {
    segments: Vec<&'a str>,
    /// Anchored patterns match from the repository root. A pattern is
    /// anchored when it starts with `/` or has a `/` anywhere but the end.
    anchored: bool,
    reach: Reach,
}

impl<'a> PatternShape<'a> {
    fn parse(pattern: &'a str) -> Self {
        let (body, rooted) = match pattern.strip_prefix('/') {
            Some(rest) => (rest, true),
            None => (pattern, false),
        };
        let (body, directory) = match body.strip_suffix('/') {
            Some(rest) => (rest, true),
            None => (body, false),
        };

        let mut segments = body.split('/').collect::<Vec<_>>();
        let anchored = rooted || segments.len() > 1;
        let reach = if segments.last() == Some(&"**") && !directory {
            segments.pop();
            Reach::Contents
        } else if directory {
            Reach::Contents
        } else if segments.last() == Some(&"*") {
            Reach::Exact
        } else {
            Reach::Subtree
        };

        Self {
            segments,
            anchored,
            reach,
        }
    }
}
