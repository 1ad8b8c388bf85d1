use std::{collections::HashMap, fmt, path::Path};

use crate::patternset::{Builder, Matcher, TreeMatcher};

/// A single CODEOWNERS rule: a pattern and the owners of the paths it
/// matches. An empty owner list explicitly leaves matching paths unowned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: String,
    pub owners: Vec<Owner>,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, owners: impl IntoIterator<Item = Owner>) -> Rule {
        Rule {
            pattern: pattern.into(),
            owners: owners.into_iter().collect(),
        }
    }
}

/// An owner handle as written in a CODEOWNERS file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    pub value: String,
    pub kind: OwnerKind,
}

impl Owner {
    pub fn new(value: String, kind: OwnerKind) -> Self {
        Self { value, kind }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    /// `@login`
    User,
    /// `@org/team-name`
    Team,
    /// `someone@example.com`
    Email,
}

/// Returned when a string isn't a user, team or email address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid owner: {0}")]
pub struct InvalidOwnerError(String);

impl TryFrom<String> for Owner {
    type Error = InvalidOwnerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let kind = if let Some(handle) = value.strip_prefix('@') {
            match handle.split_once('/') {
                Some((org, team)) if is_login(org) && is_team_slug(team) => OwnerKind::Team,
                None if is_login(handle) => OwnerKind::User,
                _ => return Err(InvalidOwnerError(value)),
            }
        } else if is_email(&value) {
            OwnerKind::Email
        } else {
            return Err(InvalidOwnerError(value));
        };
        Ok(Owner::new(value, kind))
    }
}

impl TryFrom<&str> for Owner {
    type Error = InvalidOwnerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Owner::try_from(value.to_owned())
    }
}

fn is_login(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_team_slug(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

/// A compiled set of rules that resolves the owners of paths. The last rule
/// that matches a path decides its owners; earlier matches are overridden no
/// matter how specific they are.
#[derive(Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    matcher: Matcher,
    tree_matcher: TreeMatcher,
}

impl RuleSet {
    /// Compile a rule set. Rule order is significant: later rules take
    /// precedence over earlier ones.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut builder = Builder::new();
        for rule in &rules {
            builder.add(&rule.pattern);
        }
        tracing::debug!(rules = rules.len(), "compiled rule set");
        Self {
            rules,
            matcher: builder.clone().build(),
            tree_matcher: builder.build_tree_matcher(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The owners of `path`, or `None` if the path is unowned: either no rule
    /// matches it or the deciding rule lists no owners.
    pub fn owners(&self, path: impl AsRef<Path>) -> Option<&[Owner]> {
        self.matching_rule(path).and_then(|(_, rule)| owners_of(rule))
    }

    /// The rule that decides the owners of `path` along with its index.
    pub fn matching_rule(&self, path: impl AsRef<Path>) -> Option<(usize, &Rule)> {
        self.matcher
            .matching_patterns(path)
            .last()
            .map(|&idx| (idx, &self.rules[idx]))
    }

    /// Every rule that matches `path`, in file order. The last entry is the
    /// one that decides the owners.
    pub fn all_matching_rules(&self, path: impl AsRef<Path>) -> Vec<(usize, &Rule)> {
        self.matcher
            .matching_patterns(path)
            .into_iter()
            .map(|idx| (idx, &self.rules[idx]))
            .collect()
    }

    /// Resolve the owners of many paths at once. Every input path has an entry
    /// in the result, keyed by its lossy string form.
    pub fn owners_for_paths(&self, paths: &[impl AsRef<Path>]) -> HashMap<String, Option<&[Owner]>> {
        let matches = self.tree_matcher.matches_for_paths(paths);
        paths
            .iter()
            .map(|path| {
                let key = path.as_ref().to_string_lossy().to_string();
                let owners = matches
                    .get(&key)
                    .and_then(|ids| ids.last())
                    .and_then(|&idx| owners_of(&self.rules[idx]));
                (key, owners)
            })
            .collect()
    }

    /// Batch version of [`RuleSet::all_matching_rules`]. Paths that match no
    /// rule map to an empty vec.
    pub fn all_matching_rules_for_paths(
        &self,
        paths: &[impl AsRef<Path>],
    ) -> HashMap<String, Vec<(usize, &Rule)>> {
        let mut matches = self.tree_matcher.matches_for_paths(paths);
        paths
            .iter()
            .map(|path| {
                let key = path.as_ref().to_string_lossy().to_string();
                let rules = matches
                    .remove(&key)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|idx| (idx, &self.rules[idx]))
                    .collect();
                (key, rules)
            })
            .collect()
    }
}

fn owners_of(rule: &Rule) -> Option<&[Owner]> {
    if rule.owners.is_empty() {
        None
    } else {
        Some(rule.owners.as_ref())
    }
}

/// Incrementally assembles a [`RuleSet`].
pub struct RuleSetBuilder {
    rules: Vec<Rule>,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn build(self) -> RuleSet {
        RuleSet::new(self.rules)
    }
}

impl Default for RuleSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}
