/// A nondeterministic automaton over path segments. Each edge consumes one
/// segment of a path. A state may also carry a single epsilon edge, always to
/// a state that loops on any segment, which is how `**` and unanchored
/// patterns are expressed.
#[derive(Clone)]
pub(crate) struct Nfa {
    states: Vec<State>,
}

impl Nfa {
    pub(crate) const START_STATE: StateId = StateId(0);

    pub(crate) fn new() -> Self {
        Self {
            states: vec![State::default()],
        }
    }

    pub(crate) fn add_state(&mut self) -> StateId {
        self.states.push(State::default());
        StateId(self.states.len() - 1)
    }

    #[inline]
    pub(crate) fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    #[inline]
    pub(crate) fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id.0]
    }

    #[cfg(test)]
    pub(crate) fn states_iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    /// The states a match starts from: the root, plus the any-depth loop
    /// shared by every unanchored pattern.
    pub(crate) fn initial_states(&self) -> Vec<StateId> {
        std::iter::once(Self::START_STATE)
            .chain(self.state(Self::START_STATE).epsilon)
            .collect()
    }

    pub(crate) fn edges_from(&self, id: StateId) -> impl Iterator<Item = &Edge> {
        self.state(id).edges.iter()
    }

    /// Advance a set of states over one path segment. Epsilon edges of the
    /// states reached are followed too, since they consume nothing.
    pub(crate) fn step(&self, from_states: &[StateId], segment: &str) -> Vec<StateId> {
        let reached = from_states
            .iter()
            .flat_map(|&id| self.edges_from(id))
            .filter(|edge| edge.matches(segment))
            .map(|edge| edge.target)
            .collect::<Vec<_>>();
        let skipped = reached
            .iter()
            .filter_map(|&id| self.state(id).epsilon)
            .collect::<Vec<_>>();
        [reached, skipped].concat()
    }

    /// Ids of the patterns accepted in any of `states`, ascending and unique.
    pub(crate) fn accepted_patterns(&self, states: &[StateId]) -> Vec<usize> {
        let mut ids = states
            .iter()
            .flat_map(|&id| self.state(id).accepts.iter().copied())
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StateId(pub(crate) usize);

#[derive(Debug, Clone, Default)]
pub(crate) struct State {
    /// Patterns that match a path ending in this state.
    pub(crate) accepts: Vec<usize>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) epsilon: Option<StateId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Edge {
    /// The segment glob as written in the pattern, used to share edges
    /// between patterns with a common prefix.
    pub(crate) glob: String,
    condition: SegmentCondition,
    pub(crate) target: StateId,
}

impl Edge {
    pub(crate) fn new(glob: &str, target: StateId) -> Edge {
        Self {
            glob: glob.to_owned(),
            condition: SegmentCondition::new(glob),
            target,
        }
    }

    pub(crate) fn matches(&self, segment: &str) -> bool {
        self.condition.is_match(segment)
    }
}

/// The test a path segment must pass to follow an edge. Globs in real
/// CODEOWNERS files are mostly literals or have a single leading or trailing
/// star, so those get plain string comparisons instead of a regex.
#[derive(Debug, Clone)]
enum SegmentCondition {
    Any,
    Literal(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(regex::Regex),
}

impl SegmentCondition {
    fn new(glob: &str) -> Self {
        if glob == "*" {
            return Self::Any;
        }

        let tokens = tokenize(glob);
        let starts_with_star = tokens.first() == Some(&Token::Star);
        let ends_with_star = tokens.len() > 1 && tokens.last() == Some(&Token::Star);
        let middle = &tokens[usize::from(starts_with_star)
            ..(tokens.len() - usize::from(ends_with_star)).max(usize::from(starts_with_star))];

        match (literal_text(middle), starts_with_star, ends_with_star) {
            (Some(text), false, false) => Self::Literal(text),
            (Some(text), false, true) => Self::Prefix(text),
            (Some(text), true, false) => Self::Suffix(text),
            (Some(text), true, true) => Self::Contains(text),
            (None, _, _) => Self::Regex(segment_regex(&tokens)),
        }
    }

    fn is_match(&self, segment: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Literal(text) => segment == text,
            Self::Prefix(text) => segment.starts_with(text.as_str()),
            Self::Suffix(text) => segment.ends_with(text.as_str()),
            Self::Contains(text) => {
                memchr::memmem::find(segment.as_bytes(), text.as_bytes()).is_some()
            }
            Self::Regex(re) => re.is_match(segment),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Star,
    Question,
    Char(char),
}

// Split a segment glob into wildcards and literal characters, resolving
// backslash escapes along the way. A trailing lone backslash is kept literally.
fn tokenize(glob: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::with_capacity(glob.len());
    let mut chars = glob.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '\\' => Token::Char(chars.next().unwrap_or('\\')),
            '?' => Token::Question,
            // Runs of stars inside one segment mean the same as a single star
            '*' if tokens.last() == Some(&Token::Star) => continue,
            '*' => Token::Star,
            _ => Token::Char(c),
        };
        tokens.push(token);
    }
    tokens
}

fn literal_text(tokens: &[Token]) -> Option<String> {
    tokens
        .iter()
        .map(|t| match t {
            Token::Char(c) => Some(*c),
            _ => None,
        })
        .collect()
}

// Wildcards never cross a `/`, although segments can't contain one anyway.
fn segment_regex(tokens: &[Token]) -> regex::Regex {
    let body = tokens
        .iter()
        .map(|token| match token {
            Token::Star => "[^/]*".to_owned(),
            Token::Question => "[^/]".to_owned(),
            Token::Char(c) if regex_syntax::is_meta_character(*c) => format!("\\{}", c),
            Token::Char(c) => c.to_string(),
        })
        .collect::<String>();
    let source = format!("\\A{}\\z", body);
    // Every literal character is escaped above, so this can't fail
    regex::Regex::new(&source).unwrap_or_else(|_| panic!("invalid segment regex: {}", source))
}
