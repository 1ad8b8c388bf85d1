use std::path::PathBuf;

use crate::parser::ParseError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned when loading a CODEOWNERS file from disk.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has {} syntax error(s)", .path.display(), .errors.len())]
    Parse {
        path: PathBuf,
        /// Never empty.
        errors: Vec<ParseError>,
    },
}
