//! Parse CODEOWNERS files and resolve the owners of repository paths.
//!
//! Owners are resolved with last-match-wins precedence: of all the rules whose
//! pattern matches a path, the one that appears latest in the file decides
//! the owners.
//!
//! ```
//! let ruleset = ownermap::parser::parse("* @lengau\n/docs/ @medubelko\n").into_ruleset();
//! let owners = ruleset.owners("docs/index.md").unwrap();
//! assert_eq!(owners[0].value, "@medubelko");
//! ```

mod error;
pub mod parser;
mod path_tree;
pub mod patternset;
mod ruleset;

use std::path::{Path, PathBuf};

pub use error::{Error, Result};
pub use ruleset::{InvalidOwnerError, Owner, OwnerKind, Rule, RuleSet, RuleSetBuilder};

/// Places the hosting platform looks for a CODEOWNERS file, in priority order.
pub const CODEOWNERS_LOCATIONS: [&str; 3] = [".github/CODEOWNERS", "CODEOWNERS", "docs/CODEOWNERS"];

/// Find the CODEOWNERS file in a repository, checking the locations in
/// [`CODEOWNERS_LOCATIONS`] in order.
pub fn find_codeowners_file(repo_root: impl AsRef<Path>) -> Option<PathBuf> {
    CODEOWNERS_LOCATIONS
        .iter()
        .map(|location| repo_root.as_ref().join(location))
        .find(|path| path.is_file())
}

/// Load a rule set from a CODEOWNERS file. A line with any error is logged
/// and left out entirely, so paths it would have matched fall back to the
/// earlier rules. This is how the hosting platform treats such lines.
pub fn from_path(path: impl AsRef<Path>) -> Result<RuleSet> {
    let path = path.as_ref();
    let result = read(path)?;
    for error in &result.errors {
        tracing::warn!(path = %path.display(), %error, "skipping invalid CODEOWNERS entry");
    }
    Ok(result.into_ruleset())
}

/// Load a rule set from a CODEOWNERS file, failing if the file contains any
/// syntax errors.
pub fn from_path_strict(path: impl AsRef<Path>) -> Result<RuleSet> {
    let path = path.as_ref();
    let result = read(path)?;
    if !result.is_ok() {
        return Err(Error::Parse {
            path: path.to_owned(),
            errors: result.errors,
        });
    }
    Ok(result.into_ruleset())
}

fn read(path: &Path) -> Result<parser::ParseResult> {
    let result = parser::parse_file(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        rules = result.rules.len(),
        errors = result.errors.len(),
        "parsed CODEOWNERS file"
    );
    Ok(result)
}
