//! Tree inventories: what exists where, and how big it is.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use presync_digest::FileMeta;
use presync_fs::{FileSystem, FsError};

/// Walks `root` and returns a map from slash-delimited relative path to
/// [`FileMeta`] for every regular file found, along with the total size of
/// those files.
///
/// Directories are not entries of the map. No ordering is promised; callers
/// that need determinism sort the keys explicitly.
pub fn inventory<F: FileSystem + ?Sized>(
    fs: &F,
    root: &Path,
    excluded: &HashSet<String>,
) -> Result<(HashMap<String, FileMeta>, i64), FsError> {
    let mut files = HashMap::new();
    let mut total_size = 0i64;
    for entry in fs.walk(root, excluded)? {
        if entry.is_dir {
            continue;
        }
        total_size += entry.size;
        files.insert(
            entry.rel_path,
            FileMeta {
                size: entry.size,
                modified_timestamp: entry.mtime,
            },
        );
    }
    Ok((files, total_size))
}

/// Walks `root` and returns a map from relative directory path to its
/// modification timestamp.
///
/// Used when directory-timestamp propagation is requested and by the agent's
/// walk response; regular runs don't surface directories at all.
pub fn inventory_dirs<F: FileSystem + ?Sized>(
    fs: &F,
    root: &Path,
    excluded: &HashSet<String>,
) -> Result<HashMap<String, i64>, FsError> {
    let mut dirs = HashMap::new();
    for entry in fs.walk(root, excluded)? {
        if entry.is_dir {
            dirs.insert(entry.rel_path, entry.mtime);
        }
    }
    Ok(dirs)
}
