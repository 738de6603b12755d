//! Property tests over the matcher's emitted action list.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use presync_actions::SyncAction;
use presync_digest::{FileDigest, FileMeta};
use presync_scan::{find_orphans, DigestIndex};
use presync_sync::{compute_sync_actions, MatchInput};
use proptest::prelude::*;

/// Content tag → synthetic digest. Files agree on digest exactly when they
/// agree on the tag.
fn digest_for(content: u8) -> FileDigest {
    FileDigest {
        file_extension: String::new(),
        file_size: 100 + i64::from(content),
        file_fuzzy_hash: format!("f{content:08x}"),
    }
}

fn meta_for(content: u8, mtime: i64) -> FileMeta {
    FileMeta {
        size: 100 + i64::from(content),
        modified_timestamp: mtime,
    }
}

fn tree_strategy() -> impl Strategy<Value = HashMap<String, (u8, i64)>> {
    proptest::collection::hash_map("[ab]{1,2}(/[ab]{1,2})?", (0u8..4, 0i64..3), 0..10)
}

proptest! {
    #[test]
    fn emitted_action_list_upholds_structural_invariants(
        source_tree in tree_strategy(),
        destination_tree in tree_strategy(),
    ) {
        let source_files: HashMap<String, FileMeta> = source_tree
            .iter()
            .map(|(path, &(content, mtime))| (path.clone(), meta_for(content, mtime)))
            .collect();
        let destination_files: HashMap<String, FileMeta> = destination_tree
            .iter()
            .map(|(path, &(content, mtime))| (path.clone(), meta_for(content, mtime)))
            .collect();

        let orphans = find_orphans(&source_files, &destination_files);
        let source_index = DigestIndex::from_digests(
            orphans
                .iter()
                .map(|path| (path.clone(), digest_for(source_tree[path].0)))
                .collect(),
        );
        let destination_index = DigestIndex::from_digests(
            destination_tree
                .iter()
                .map(|(path, &(content, _))| (path.clone(), digest_for(content)))
                .collect(),
        );

        let destination_root = Path::new("/dst");
        let input = MatchInput {
            source_root: Path::new("/src"),
            destination_root,
            source_files: &source_files,
            destination_files: &destination_files,
            orphans: &orphans,
            source_index: &source_index,
            destination_index: &destination_index,
        };
        // Pretend only the root itself exists, so every move into a subdir
        // needs a directory first.
        let (actions, savings) =
            compute_sync_actions(&input, |path| path == destination_root);

        prop_assert!(savings >= 0);

        let mut move_targets = HashSet::new();
        let mut move_origins = HashSet::new();
        let mut dirs_made_so_far: Vec<HashSet<String>> = Vec::new();
        let mut made: HashSet<String> = HashSet::new();
        for action in &actions {
            if let SyncAction::MakeDirectory { abs_path } = action {
                made.insert(abs_path.display().to_string());
            }
            dirs_made_so_far.push(made.clone());
        }

        for (position, action) in actions.iter().enumerate() {
            match action {
                SyncAction::MoveFile { from_rel, to_rel, .. } => {
                    // No relative path is both taken from and moved to.
                    prop_assert_ne!(from_rel, to_rel);
                    // Each orphan receives at most one move; each candidate
                    // donates at most one.
                    prop_assert!(move_targets.insert(to_rel.clone()));
                    prop_assert!(move_origins.insert(from_rel.clone()));
                    // Moves only target orphans, and only consume files
                    // that exist at destination but not at source.
                    prop_assert!(orphans.contains(to_rel));
                    prop_assert!(destination_files.contains_key(from_rel));
                    prop_assert!(!source_files.contains_key(from_rel));

                    // A missing parent directory was created earlier in the
                    // list.
                    let parent = destination_root
                        .join(to_rel)
                        .parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    if parent != destination_root.display().to_string() {
                        prop_assert!(
                            dirs_made_so_far[position].contains(&parent),
                            "move into '{parent}' precedes its mkdir"
                        );
                    }
                }
                SyncAction::PropagateTimestamp { source_rel, destination_rel, .. } => {
                    // Timestamps flow from an orphan to a content twin that
                    // is not already in sync with its own counterpart.
                    prop_assert!(orphans.contains(source_rel));
                    prop_assert!(destination_files.contains_key(destination_rel));
                    prop_assert_ne!(
                        source_files.get(destination_rel),
                        Some(&destination_files[destination_rel])
                    );
                }
                SyncAction::MakeDirectory { .. } => {}
            }
        }

        // Determinism: the same inputs yield the same list.
        let (again, _) = compute_sync_actions(&input, |path| path == destination_root);
        prop_assert_eq!(&actions, &again);
    }
}
