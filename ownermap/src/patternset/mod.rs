//! Compiles CODEOWNERS glob patterns into an NFA over path segments and
//! matches paths against the whole set of patterns at once.

mod builder;
mod matcher;
mod nfa;
mod tree_matcher;

use std::{
    borrow::Cow,
    path::{Component, Path},
};

pub use self::builder::Builder;
pub use self::matcher::Matcher;
pub use self::tree_matcher::TreeMatcher;

/// Split a repository-relative path into the segments the NFA consumes.
///
/// `.` and root components are dropped and `..` removes the segment before
/// it, so `docs/../src/a.py` is `src/a.py`. Returns `None` when `..` climbs
/// above the repository root; such a path is outside the repository and can't
/// be owned.
pub(crate) fn path_segments(path: &Path) -> Option<Vec<Cow<'_, str>>> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy()),
            Component::ParentDir => {
                segments.pop()?;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(path: &str) -> Option<String> {
        path_segments(Path::new(path)).map(|segments| segments.join("/"))
    }

    #[test]
    fn test_path_segments() {
        let examples = [
            ("docs/index.md", Some("docs/index.md")),
            ("./docs/index.md", Some("docs/index.md")),
            ("/docs/index.md", Some("docs/index.md")),
            ("docs/../src/a.py", Some("src/a.py")),
            ("craft_platforms/rock/../charm/foo.py", Some("craft_platforms/charm/foo.py")),
            ("docs/..", Some("")),
            ("", Some("")),
            ("../docs/a.md", None),
            ("docs/../../a.md", None),
        ];

        for (path, expected) in examples {
            assert_eq!(joined(path).as_deref(), expected, "path {:?}", path);
        }
    }
}
