//! Parallel digest indexing.
//!
//! Each side of a run hashes its own path list: the source its orphans, the
//! destination its candidates. The list is split into contiguous chunks and
//! hashed on a dedicated thread pool; workers publish into the two shared
//! maps under a mutex each, and bump a shared counter per file so callers
//! can report progress. The two sides run concurrently and share nothing
//! but their progress counters.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use presync_digest::{compute_digest, FileDigest};
use presync_fs::FileSystem;
use rayon::prelude::*;
use thiserror::Error;
use tracing::warn;

/// Non-fatal digest failures tolerated per indexer before the run aborts;
/// more than this means the tree is likely not readable at all.
pub const INDEX_ERROR_TOLERANCE: usize = 20;

/// Error raised while building a digest index.
#[derive(Debug, Error)]
pub enum ScanError {
    /// More files failed to hash than the tolerance allows.
    #[error("too many errors while building index under '{base}'")]
    TooManyFailures {
        /// The tree the indexer was hashing.
        base: String,
    },

    /// The worker pool could not be created.
    #[error("couldn't build indexer thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// The two digest views built per side: a total `file → digest` map and an
/// order-preserving `digest → files` multi-map.
#[derive(Clone, Debug, Default)]
pub struct DigestIndex {
    /// Relative path → digest, for every file that hashed successfully.
    pub by_file: HashMap<String, FileDigest>,
    /// Digest → relative paths sharing it. Per-digest ordering reflects
    /// publication order and is not promised.
    pub by_digest: HashMap<FileDigest, Vec<String>>,
}

impl DigestIndex {
    /// Builds an index from an already-computed digest map, inserting in
    /// sorted path order.
    #[must_use]
    pub fn from_digests(digests: HashMap<String, FileDigest>) -> Self {
        let mut paths: Vec<&String> = digests.keys().collect();
        paths.sort();
        let mut by_digest: HashMap<FileDigest, Vec<String>> = HashMap::new();
        for path in paths {
            by_digest
                .entry(digests[path].clone())
                .or_default()
                .push(path.clone());
        }
        Self {
            by_file: digests,
            by_digest,
        }
    }
}

/// Worker count for one side: half the CPUs (both sides run concurrently
/// and are mostly I/O bound on distinct storage), single-threaded on small
/// machines.
#[must_use]
pub fn parallelism() -> usize {
    let ncpu = thread::available_parallelism().map_or(1, |n| n.get());
    if ncpu > 3 {
        ncpu / 2
    } else {
        1
    }
}

/// Hashes every path in `files` (relative to `base`) into a [`DigestIndex`].
///
/// `counter` is incremented once per file processed, successful or not.
/// Individual digest failures are logged and the file is left out of the
/// index, so it can never match; more than [`INDEX_ERROR_TOLERANCE`]
/// failures abort the whole indexer.
pub fn index_files<F: FileSystem + ?Sized>(
    fs: &F,
    base: &Path,
    files: &[String],
    counter: &AtomicU64,
) -> Result<DigestIndex, ScanError> {
    let workers = parallelism();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;

    let by_file = Mutex::new(HashMap::with_capacity(files.len()));
    let by_digest: Mutex<HashMap<FileDigest, Vec<String>>> = Mutex::new(HashMap::new());
    let failures = AtomicUsize::new(0);

    let chunk_size = files.len().div_ceil(workers).max(1);
    pool.install(|| {
        files
            .par_chunks(chunk_size)
            .try_for_each(|chunk| -> Result<(), ScanError> {
                for rel_path in chunk {
                    counter.fetch_add(1, Ordering::Relaxed);
                    let path = base.join(rel_path);
                    match compute_digest(fs, &path) {
                        Ok(digest) => {
                            by_digest
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .entry(digest.clone())
                                .or_default()
                                .push(rel_path.clone());
                            by_file
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .insert(rel_path.clone(), digest);
                        }
                        Err(err) => {
                            warn!("couldn't index file \"{}\" (skipping): {err}", path.display());
                            let seen = failures.fetch_add(1, Ordering::Relaxed) + 1;
                            if seen > INDEX_ERROR_TOLERANCE {
                                return Err(ScanError::TooManyFailures {
                                    base: base.display().to_string(),
                                });
                            }
                        }
                    }
                }
                Ok(())
            })
    })?;

    Ok(DigestIndex {
        by_file: by_file.into_inner().unwrap_or_else(|e| e.into_inner()),
        by_digest: by_digest.into_inner().unwrap_or_else(|e| e.into_inner()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use presync_fs::LocalFs;
    use std::fs;

    #[test]
    fn index_builds_both_maps() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a.bin"), vec![1u8; 100]).expect("write");
        fs::write(temp.path().join("b.bin"), vec![1u8; 100]).expect("write");
        fs::write(temp.path().join("c.bin"), vec![2u8; 100]).expect("write");

        let files: Vec<String> = ["a.bin", "b.bin", "c.bin"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let counter = AtomicU64::new(0);
        let index = index_files(&LocalFs, temp.path(), &files, &counter).expect("index");

        assert_eq!(index.by_file.len(), 3);
        assert_eq!(counter.load(Ordering::Relaxed), 3);

        let twin_digest = &index.by_file["a.bin"];
        assert_eq!(twin_digest, &index.by_file["b.bin"]);
        let mut twins = index.by_digest[twin_digest].clone();
        twins.sort();
        assert_eq!(twins, vec!["a.bin", "b.bin"]);
        assert_eq!(index.by_digest[&index.by_file["c.bin"]], vec!["c.bin"]);
    }

    #[test]
    fn missing_files_are_tolerated_and_omitted() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("real.bin"), vec![1u8; 10]).expect("write");

        let files = vec!["real.bin".to_string(), "ghost.bin".to_string()];
        let counter = AtomicU64::new(0);
        let index = index_files(&LocalFs, temp.path(), &files, &counter).expect("index");

        assert_eq!(index.by_file.len(), 1);
        assert!(index.by_file.contains_key("real.bin"));
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn too_many_failures_abort_the_indexer() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files: Vec<String> = (0..=INDEX_ERROR_TOLERANCE + 1)
            .map(|i| format!("missing_{i}.bin"))
            .collect();
        let counter = AtomicU64::new(0);

        let err = index_files(&LocalFs, temp.path(), &files, &counter).expect_err("abort");
        assert!(matches!(err, ScanError::TooManyFailures { .. }));
    }

    #[test]
    fn from_digests_orders_multimap_entries_by_path() {
        let digest = FileDigest {
            file_extension: ".x".into(),
            file_size: 1,
            file_fuzzy_hash: "f00000000".into(),
        };
        let digests = HashMap::from([
            ("z".to_string(), digest.clone()),
            ("a".to_string(), digest.clone()),
            ("m".to_string(), digest.clone()),
        ]);

        let index = DigestIndex::from_digests(digests);
        assert_eq!(index.by_digest[&digest], vec!["a", "m", "z"]);
    }
}
