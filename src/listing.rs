//! CSV listing of a single tree (`--list`).

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;

use presync_fs::{FsError, LocalFs};
use presync_scan::inventory;

/// Listing failure: either the walk or the output stream.
#[derive(Debug)]
pub enum ListError {
    /// The tree could not be scanned.
    Scan(FsError),
    /// Writing to the output failed.
    Write(io::Error),
}

impl std::fmt::Display for ListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scan(err) => write!(f, "{err}"),
            Self::Write(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ListError {}

/// Writes `path,size,mtime` lines for every file under `dir`, sorted by
/// path.
pub fn print_csv<W: Write>(
    dir: &Path,
    exclusions: &HashSet<String>,
    out: &mut W,
) -> Result<(), ListError> {
    let (files, _) = inventory(&LocalFs, dir, exclusions).map_err(ListError::Scan)?;
    let mut paths: Vec<&String> = files.keys().collect();
    paths.sort();

    for path in paths {
        let meta = &files[path];
        writeln!(
            out,
            "{},{},{}",
            csv_field(path),
            meta.size,
            meta.modified_timestamp
        )
        .map_err(ListError::Write)?;
    }
    Ok(())
}

/// Quotes a field when it contains a comma, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
