//! Deterministic recursive traversal with exclusion pruning.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::{FsError, WalkEntry};

/// Basename prefix of AppleDouble sidecar files, always ignored.
const APPLE_DOUBLE_PREFIX: &str = "._";

pub(crate) fn walk_tree(
    root: &Path,
    excluded: &HashSet<String>,
) -> Result<Vec<WalkEntry>, FsError> {
    let root_meta = fs::symlink_metadata(root)
        .map_err(|_| FsError::UnreadableRoot { path: root.into() })?;
    if !root_meta.is_dir() {
        return Err(FsError::UnreadableRoot { path: root.into() });
    }

    let mut entries = Vec::new();
    descend(root, root, excluded, &mut entries);
    Ok(entries)
}

fn descend(root: &Path, dir: &Path, excluded: &HashSet<String>, out: &mut Vec<WalkEntry>) {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) => {
            warn!("skipping \"{}\": {err}", dir.display());
            return;
        }
    };

    let mut names = Vec::new();
    for entry in read_dir {
        match entry {
            Ok(entry) => names.push(entry.file_name()),
            Err(err) => warn!("skipping entry in \"{}\": {err}", dir.display()),
        }
    }
    names.sort();

    for name in names {
        let Some(basename) = name.to_str() else {
            warn!(
                "skipping non-UTF-8 name in \"{}\": {:?}",
                dir.display(),
                name
            );
            continue;
        };
        if excluded.contains(basename) {
            continue;
        }

        let full = dir.join(basename);
        let meta = match fs::symlink_metadata(&full) {
            Ok(meta) => meta,
            Err(err) => {
                warn!("couldn't get metadata of \"{}\": {err}", full.display());
                continue;
            }
        };

        let rel_path = match relative_string(root, &full) {
            Some(rel) => rel,
            None => {
                warn!("couldn't comprehend path \"{}\"", full.display());
                continue;
            }
        };

        if meta.is_dir() {
            out.push(WalkEntry {
                rel_path,
                size: 0,
                mtime: mtime_seconds(&meta),
                is_dir: true,
            });
            descend(root, &full, excluded, out);
        } else if meta.file_type().is_file() {
            if basename.starts_with(APPLE_DOUBLE_PREFIX) {
                continue;
            }
            out.push(WalkEntry {
                rel_path,
                size: meta.len() as i64,
                mtime: mtime_seconds(&meta),
                is_dir: false,
            });
        }
        // Symlinks and special files are not reconciled.
    }
}

fn relative_string(root: &Path, full: &Path) -> Option<String> {
    let rel = full.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_str()?);
    }
    Some(parts.join("/"))
}

fn mtime_seconds(meta: &fs::Metadata) -> i64 {
    filetime::FileTime::from_last_modification_time(meta).unix_seconds()
}
