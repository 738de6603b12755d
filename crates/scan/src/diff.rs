//! Metadata diff and the extension+size candidate pre-filter.

use std::collections::{HashMap, HashSet};

use presync_digest::{file_ext, FileExtAndSize, FileMeta};

/// Returns the source paths that have no exact counterpart at destination:
/// the destination entry at the same relative path is absent, or differs in
/// size or modification timestamp.
///
/// The result is unsorted; callers sort before iterating for determinism.
#[must_use]
pub fn find_orphans(
    source_files: &HashMap<String, FileMeta>,
    destination_files: &HashMap<String, FileMeta>,
) -> Vec<String> {
    let mut orphans = Vec::with_capacity(source_files.len() / 10);
    for (path, source_meta) in source_files {
        match destination_files.get(path) {
            Some(destination_meta) if destination_meta == source_meta => {}
            _ => orphans.push(path.clone()),
        }
    }
    orphans
}

/// Returns the destination paths whose `(extension, size)` key appears in
/// the orphan set.
///
/// Sharing the key is necessary but not sufficient for a content match;
/// only these candidates are worth hashing.
#[must_use]
pub fn find_candidates(
    source_files: &HashMap<String, FileMeta>,
    destination_files: &HashMap<String, FileMeta>,
    orphans: &[String],
) -> Vec<String> {
    let mut orphan_keys = HashSet::with_capacity(orphans.len());
    for path in orphans {
        if let Some(meta) = source_files.get(path) {
            orphan_keys.insert(FileExtAndSize {
                file_extension: file_ext(path),
                file_size: meta.size,
            });
        }
    }

    let mut candidates = Vec::with_capacity(orphans.len());
    for (path, meta) in destination_files {
        let key = FileExtAndSize {
            file_extension: file_ext(path),
            file_size: meta.size,
        };
        if orphan_keys.contains(&key) {
            candidates.push(path.clone());
        }
    }
    candidates
}
