//! Digest-keyed matching of source orphans to destination candidates.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use presync_actions::SyncAction;
use presync_digest::FileMeta;
use presync_scan::DigestIndex;

/// Everything the matcher reads. Inventories and indexes are immutable by
/// the time matching starts.
pub struct MatchInput<'a> {
    /// Root of the source tree (used only for action bases).
    pub source_root: &'a Path,
    /// Root of the destination tree (used for action bases and parent
    /// probes).
    pub destination_root: &'a Path,
    /// Full source inventory.
    pub source_files: &'a HashMap<String, FileMeta>,
    /// Full destination inventory.
    pub destination_files: &'a HashMap<String, FileMeta>,
    /// Source paths lacking an exact counterpart at destination.
    pub orphans: &'a [String],
    /// Digests of the orphans.
    pub source_index: &'a DigestIndex,
    /// Digests of the destination candidates.
    pub destination_index: &'a DigestIndex,
}

/// Matches orphans against candidates and emits the action list.
///
/// Orphans are visited in sorted order and candidate lists are sorted
/// before tie-breaking, so the result depends only on the inventories and
/// digests. Each destination file is consumed by at most one move; the
/// uniqueness keys deduplicate everything else. Returns the actions and the
/// total bytes a subsequent rsync run will not need to transfer.
///
/// `dir_exists` answers whether an absolute destination directory already
/// exists; a missing parent gets a directory-creation action emitted ahead
/// of the move into it.
pub fn compute_sync_actions(
    input: &MatchInput<'_>,
    dir_exists: impl Fn(&Path) -> bool,
) -> (Vec<SyncAction>, i64) {
    let mut orphans: Vec<&String> = input.orphans.iter().collect();
    orphans.sort();

    let mut actions: Vec<SyncAction> = Vec::with_capacity(orphans.len());
    let mut emitted_keys: HashSet<String> = HashSet::with_capacity(orphans.len());
    let mut used_candidates: HashSet<&String> = HashSet::new();
    let mut savings = 0i64;

    for orphan in orphans {
        let Some(orphan_digest) = input.source_index.by_file.get(orphan) else {
            // Couldn't be hashed; rsync will transfer it.
            continue;
        };
        let Some(matches) = input.destination_index.by_digest.get(orphan_digest) else {
            // Nothing at destination has this content; rsync handles it.
            continue;
        };

        let mut remaining: Vec<&String> = matches
            .iter()
            .filter(|candidate| !used_candidates.contains(candidate))
            .collect();
        if remaining.is_empty() {
            continue;
        }

        let candidate = if remaining.len() == 1 {
            remaining[0]
        } else {
            remaining.sort();
            pick_candidate(&remaining, orphan, input.source_files)
        };

        let orphan_meta = input.source_files[orphan];
        let candidate_meta = input.destination_files[candidate];
        let candidate_at_source = input.source_files.get(candidate);

        // A candidate still present at source cannot be moved away without
        // losing its copy at destination; it may still donate a timestamp.
        let movable = candidate_at_source.is_none() && candidate != orphan;

        if movable {
            let parent = destination_parent(input.destination_root, orphan);
            if !dir_exists(&parent) {
                push_unique(
                    &mut actions,
                    &mut emitted_keys,
                    SyncAction::MakeDirectory { abs_path: parent },
                );
            }
        }

        if candidate_meta.modified_timestamp != orphan_meta.modified_timestamp
            && candidate_at_source != Some(&candidate_meta)
        {
            // The second clause keeps us from clobbering the timestamp of a
            // destination file that is already in sync with its own source
            // counterpart.
            let pushed = push_unique(
                &mut actions,
                &mut emitted_keys,
                SyncAction::PropagateTimestamp {
                    source_base: input.source_root.to_path_buf(),
                    destination_base: input.destination_root.to_path_buf(),
                    source_rel: orphan.clone(),
                    destination_rel: candidate.clone(),
                    source_mtime: None,
                },
            );
            if pushed {
                savings += orphan_meta.size;
            }
        }

        if movable {
            used_candidates.insert(candidate);
            let pushed = push_unique(
                &mut actions,
                &mut emitted_keys,
                SyncAction::MoveFile {
                    base: input.destination_root.to_path_buf(),
                    from_rel: candidate.clone(),
                    to_rel: orphan.clone(),
                },
            );
            if pushed {
                savings += orphan_meta.size;
            }
        }
    }

    (actions, savings)
}

/// Tie-break among several content-equal candidates: prefer one carrying
/// the orphan's basename that the source has moved away from, then any the
/// source has moved away from, then fall back to the first (which will only
/// ever donate a timestamp).
fn pick_candidate<'a>(
    remaining: &[&'a String],
    orphan: &str,
    source_files: &HashMap<String, FileMeta>,
) -> &'a String {
    let orphan_basename = basename(orphan);
    for &candidate in remaining {
        if basename(candidate) == orphan_basename && !source_files.contains_key(candidate) {
            return candidate;
        }
    }
    for &candidate in remaining {
        if !source_files.contains_key(candidate) {
            return candidate;
        }
    }
    remaining[0]
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn destination_parent(destination_root: &Path, orphan: &str) -> std::path::PathBuf {
    destination_root
        .join(orphan)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| destination_root.to_path_buf())
}

fn push_unique(
    actions: &mut Vec<SyncAction>,
    emitted_keys: &mut HashSet<String>,
    action: SyncAction,
) -> bool {
    if emitted_keys.insert(action.uniqueness()) {
        actions.push(action);
        true
    } else {
        false
    }
}
