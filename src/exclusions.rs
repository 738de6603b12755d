//! Exclusion lists: the bundled defaults and user-provided files.

use std::collections::HashSet;
use std::fmt;
use std::fs;

/// Platform noise ignored on every run unless the user supplies their own
/// list. Basenames starting with `._` are always ignored by the walker.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "$RECYCLE.BIN",
    "System Volume Information",
    "Thumbs.db",
    "desktop.ini",
    ".Trashes",
];

/// Failure to read a user-supplied exclusions file.
#[derive(Debug)]
pub struct ExclusionsError {
    path: String,
    detail: String,
}

impl fmt::Display for ExclusionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "argument to --exclusions (\"{}\") isn't readable: {}",
            self.path, self.detail
        )
    }
}

impl std::error::Error for ExclusionsError {}

/// Returns the exclusion set: the contents of `file` when given, otherwise
/// the bundled defaults.
pub fn load(file: Option<&String>) -> Result<HashSet<String>, ExclusionsError> {
    match file {
        None => Ok(DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect()),
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|err| ExclusionsError {
                path: path.clone(),
                detail: err.to_string(),
            })?;
            Ok(parse(&raw))
        }
    }
}

/// Parses a newline-separated name list; empty and whitespace-only lines
/// are dropped, Windows line endings tolerated.
fn parse(contents: &str) -> HashSet<String> {
    contents
        .replace("\r\n", "\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
