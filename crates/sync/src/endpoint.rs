//! The two faces of a tree under reconciliation.
//!
//! A [`SyncEndpoint`] is what the run orchestration talks to: it can scan
//! itself, digest a batch of its files, answer directory probes, and apply
//! actions. [`LocalEndpoint`] does all of that in-process through a
//! [`FileSystem`]; [`RemoteEndpoint`] forwards to an agent on the peer
//! host. The engine never branches on which it holds.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;

use presync_actions::SyncAction;
use presync_agent::{ActionSpec, AgentClient};
use presync_digest::FileMeta;
use presync_fs::FileSystem;
use presync_scan::{index_files, inventory, inventory_dirs, DigestIndex};
use tracing::{info, warn};

use crate::SyncError;

/// Result of scanning one tree.
#[derive(Clone, Debug, Default)]
pub struct ScanOutcome {
    /// Relative path → metadata for every regular file.
    pub files: HashMap<String, FileMeta>,
    /// Relative directory path → modification timestamp.
    pub dirs: HashMap<String, i64>,
    /// Total bytes across all files.
    pub total_size: i64,
}

/// Count of actions attempted and succeeded.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PerformSummary {
    /// Actions handed to the executor.
    pub attempted: usize,
    /// Actions that completed successfully.
    pub succeeded: usize,
}

/// One side of a reconciliation run.
pub trait SyncEndpoint: Send {
    /// The tree root, as used in action bases and log lines.
    fn root(&self) -> &Path;

    /// Whether actions against this endpoint cross an agent connection.
    fn is_remote(&self) -> bool;

    /// Builds the tree inventory.
    fn scan(&mut self, excluded: &HashSet<String>) -> Result<ScanOutcome, SyncError>;

    /// Digests the given relative paths, bumping `counter` per file.
    fn digests(&mut self, files: &[String], counter: &AtomicU64)
        -> Result<DigestIndex, SyncError>;

    /// Whether the absolute path is an existing directory on this side.
    fn dir_exists(&self, path: &Path) -> bool;

    /// Applies (or, when `dry_run`, narrates) the actions in order,
    /// continuing past individual failures.
    fn perform(
        &mut self,
        actions: &[SyncAction],
        dry_run: bool,
    ) -> Result<PerformSummary, SyncError>;

    /// Releases any transport the endpoint holds. The default does nothing.
    fn shutdown(&mut self) {}
}

/// An endpoint served by an in-process filesystem adapter.
pub struct LocalEndpoint<F> {
    fs: F,
    root: PathBuf,
}

impl<F: FileSystem> LocalEndpoint<F> {
    /// Wraps a tree at `root` behind the given adapter.
    pub fn new(fs: F, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }
}

impl<F: FileSystem> SyncEndpoint for LocalEndpoint<F> {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn scan(&mut self, excluded: &HashSet<String>) -> Result<ScanOutcome, SyncError> {
        let (files, total_size) = inventory(&self.fs, &self.root, excluded)?;
        let dirs = inventory_dirs(&self.fs, &self.root, excluded)?;
        Ok(ScanOutcome {
            files,
            dirs,
            total_size,
        })
    }

    fn digests(
        &mut self,
        files: &[String],
        counter: &AtomicU64,
    ) -> Result<DigestIndex, SyncError> {
        Ok(index_files(&self.fs, &self.root, files, counter)?)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.fs.is_readable_dir(path)
    }

    fn perform(
        &mut self,
        actions: &[SyncAction],
        dry_run: bool,
    ) -> Result<PerformSummary, SyncError> {
        let mut succeeded = 0;
        for (i, action) in actions.iter().enumerate() {
            if dry_run {
                info!("{:4}/{} would {}", i + 1, actions.len(), action);
                succeeded += 1;
                continue;
            }
            match action.perform(&self.fs) {
                Ok(()) => {
                    info!("{:4}/{} {}: done", i + 1, actions.len(), action);
                    succeeded += 1;
                }
                Err(err) => {
                    warn!("{:4}/{} {}: failed due to: {err}", i + 1, actions.len(), action);
                }
            }
        }
        Ok(PerformSummary {
            attempted: actions.len(),
            succeeded,
        })
    }
}

/// An endpoint served by an agent on a peer host.
pub struct RemoteEndpoint<R, W> {
    client: AgentClient<R, W>,
    root: PathBuf,
    dirs: HashSet<String>,
}

impl<R: BufRead + Send, W: Write + Send> RemoteEndpoint<R, W> {
    /// Wraps a remote tree at `root` behind an agent connection.
    pub fn new(client: AgentClient<R, W>, root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            root: root.into(),
            dirs: HashSet::new(),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> SyncEndpoint for RemoteEndpoint<R, W> {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn scan(&mut self, excluded: &HashSet<String>) -> Result<ScanOutcome, SyncError> {
        let excluded_names: Vec<String> = excluded.iter().cloned().collect();
        let (files, dirs, total_size) = self.client.walk(
            &self.root.to_string_lossy(),
            &excluded_names,
            None,
        )?;
        self.dirs = dirs.keys().cloned().collect();
        Ok(ScanOutcome {
            files,
            dirs,
            total_size,
        })
    }

    fn digests(
        &mut self,
        files: &[String],
        counter: &AtomicU64,
    ) -> Result<DigestIndex, SyncError> {
        let digests =
            self.client
                .digests(&self.root.to_string_lossy(), files, Some(counter))?;
        Ok(DigestIndex::from_digests(digests))
    }

    fn dir_exists(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => true,
            Ok(rel) => self.dirs.contains(&rel.to_string_lossy().replace('\\', "/")),
            Err(_) => false,
        }
    }

    fn perform(
        &mut self,
        actions: &[SyncAction],
        dry_run: bool,
    ) -> Result<PerformSummary, SyncError> {
        let mut specs = Vec::with_capacity(actions.len());
        for action in actions {
            specs.push(ActionSpec::from_action(action)?);
        }
        let results = self.client.perform(specs, dry_run)?;

        let mut succeeded = 0;
        for result in &results {
            let action = actions.get(result.index);
            match (result.success, action) {
                (true, Some(action)) => {
                    if dry_run {
                        info!("would {action}");
                    } else {
                        info!("{action}: done");
                    }
                    succeeded += 1;
                }
                (false, Some(action)) => {
                    warn!(
                        "{action}: failed due to: {}",
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                (success, None) => {
                    warn!("agent reported result for unknown action index {} (success: {success})", result.index);
                }
            }
        }
        Ok(PerformSummary {
            attempted: actions.len(),
            succeeded,
        })
    }

    fn shutdown(&mut self) {
        self.client.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presync_fs::LocalFs;
    use std::fs;
    use std::sync::atomic::Ordering;

    #[test]
    fn local_endpoint_scans_and_digests() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("d")).expect("dir");
        fs::write(temp.path().join("d/f.bin"), vec![5u8; 32]).expect("write");

        let mut endpoint = LocalEndpoint::new(LocalFs, temp.path());
        let scan = endpoint.scan(&HashSet::new()).expect("scan");
        assert_eq!(scan.files.len(), 1);
        assert_eq!(scan.total_size, 32);
        assert!(scan.dirs.contains_key("d"));

        let counter = AtomicU64::new(0);
        let index = endpoint
            .digests(&["d/f.bin".to_string()], &counter)
            .expect("digests");
        assert_eq!(index.by_file.len(), 1);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        assert!(endpoint.dir_exists(&temp.path().join("d")));
        assert!(!endpoint.dir_exists(&temp.path().join("missing")));
    }

    #[test]
    fn local_perform_continues_past_failures() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a"), b"x").expect("write");
        fs::write(temp.path().join("blocked"), b"y").expect("write");

        let actions = vec![
            SyncAction::MoveFile {
                base: temp.path().to_path_buf(),
                from_rel: "a".into(),
                to_rel: "blocked".into(),
            },
            SyncAction::MakeDirectory {
                abs_path: temp.path().join("made"),
            },
        ];
        let mut endpoint = LocalEndpoint::new(LocalFs, temp.path());
        let summary = endpoint.perform(&actions, false).expect("perform");

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert!(temp.path().join("made").is_dir());
        assert!(temp.path().join("a").exists());
    }

    #[test]
    fn local_dry_run_changes_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a"), b"x").expect("write");

        let actions = vec![SyncAction::MoveFile {
            base: temp.path().to_path_buf(),
            from_rel: "a".into(),
            to_rel: "b".into(),
        }];
        let mut endpoint = LocalEndpoint::new(LocalFs, temp.path());
        let summary = endpoint.perform(&actions, true).expect("perform");

        assert_eq!(summary.succeeded, 1);
        assert!(temp.path().join("a").exists());
        assert!(!temp.path().join("b").exists());
    }
}
