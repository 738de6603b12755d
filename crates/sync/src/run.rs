//! Whole-run orchestration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use presync_actions::SyncAction;
use presync_scan::{find_candidates, find_orphans};
use tracing::info;

use crate::endpoint::{PerformSummary, SyncEndpoint};
use crate::executor::{write_script, ExecutionMode};
use crate::matcher::{compute_sync_actions, MatchInput};
use crate::SyncError;

/// Interval between progress log lines while hashing.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Knobs for one reconciliation run.
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// What to do with the computed action list.
    pub mode: ExecutionMode,
    /// Basenames excluded from both walks.
    pub exclusions: HashSet<String>,
    /// Also propagate modification timestamps of directories present on
    /// both sides.
    pub dir_timestamps: bool,
    /// Emit percentage progress lines while hashing.
    pub progress: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Apply,
            exclusions: HashSet::new(),
            dir_timestamps: false,
            progress: false,
        }
    }
}

/// What a run found and did.
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    /// Source files with no exact counterpart at destination.
    pub orphans: usize,
    /// Destination files that shared an extension+size key with an orphan.
    pub candidates: usize,
    /// The emitted action list, in execution order.
    pub actions: Vec<SyncAction>,
    /// Bytes rsync will not have to transfer thanks to the actions.
    pub savings: i64,
    /// Apply/dry-run outcome; `None` in script mode or when there was
    /// nothing to do.
    pub performed: Option<PerformSummary>,
}

impl SyncReport {
    /// True when the trees were already reconciled and nothing was emitted.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        self.orphans == 0
    }
}

/// Runs the full reconciliation between `source` and `destination`.
///
/// Scans run concurrently, then the two digest passes run concurrently;
/// matching and execution are sequential. Early-outs: no orphans means the
/// trees are in sync, no candidates means everything left is new content
/// for rsync.
pub fn run<S, D>(
    source: &mut S,
    destination: &mut D,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError>
where
    S: SyncEndpoint + ?Sized,
    D: SyncEndpoint + ?Sized,
{
    info!(
        "Scanning source ({}) and destination ({}) directories...",
        source.root().display(),
        destination.root().display()
    );
    let (source_scan, destination_scan) = {
        let exclusions = &options.exclusions;
        let (source_result, destination_result) = thread::scope(|scope| {
            let source_handle = scope.spawn(|| source.scan(exclusions));
            let destination_handle = scope.spawn(|| destination.scan(exclusions));
            (
                source_handle.join().expect("source scan thread"),
                destination_handle.join().expect("destination scan thread"),
            )
        });
        (source_result?, destination_result?)
    };
    info!(
        "Found {} files ({} bytes) at source and {} files ({} bytes) at destination",
        source_scan.files.len(),
        source_scan.total_size,
        destination_scan.files.len(),
        destination_scan.total_size
    );

    let mut orphans = find_orphans(&source_scan.files, &destination_scan.files);
    if orphans.is_empty() {
        info!("All files at source directory have counterparts. No action needed.");
        return Ok(SyncReport::default());
    }
    orphans.sort();
    info!("Found {} files without counterparts", orphans.len());

    let mut candidates = find_candidates(&source_scan.files, &destination_scan.files, &orphans);
    let mut report = SyncReport {
        orphans: orphans.len(),
        candidates: candidates.len(),
        ..SyncReport::default()
    };
    if candidates.is_empty() {
        info!(
            "No candidates found. Looks like all {} files are new. rsync will do the rest.",
            orphans.len()
        );
        return Ok(report);
    }
    candidates.sort();
    info!("Found {} candidates", candidates.len());

    info!("Identifying file renames/movements and timestamp changes...");
    let source_counter = AtomicU64::new(0);
    let destination_counter = AtomicU64::new(0);
    let done = AtomicBool::new(false);
    let (source_index, destination_index) = {
        let (source_result, destination_result) = thread::scope(|scope| {
            let source_handle = scope.spawn(|| source.digests(&orphans, &source_counter));
            let destination_handle =
                scope.spawn(|| destination.digests(&candidates, &destination_counter));
            if options.progress {
                scope.spawn(|| {
                    report_progress(
                        &done,
                        &source_counter,
                        orphans.len() as u64,
                        &destination_counter,
                        candidates.len() as u64,
                    )
                });
            }
            let source_result = source_handle.join().expect("source index thread");
            let destination_result =
                destination_handle.join().expect("destination index thread");
            done.store(true, Ordering::Relaxed);
            (source_result, destination_result)
        });
        (source_result?, destination_result?)
    };

    let input = MatchInput {
        source_root: source.root(),
        destination_root: destination.root(),
        source_files: &source_scan.files,
        destination_files: &destination_scan.files,
        orphans: &orphans,
        source_index: &source_index,
        destination_index: &destination_index,
    };
    let (mut actions, savings) = compute_sync_actions(&input, |path| destination.dir_exists(path));

    if options.dir_timestamps {
        append_dir_timestamp_actions(
            &mut actions,
            source.root().to_path_buf(),
            destination.root().to_path_buf(),
            &source_scan.dirs,
            &destination_scan.dirs,
        );
    }

    if source.is_remote() || destination.is_remote() {
        resolve_source_mtimes(&mut actions, &source_scan.files, &source_scan.dirs);
    }

    report.savings = savings;
    if actions.is_empty() {
        info!("No sync actions found. You may run rsync.");
        return Ok(report);
    }
    info!(
        "Found {} actions that can save {} bytes of file transfer",
        actions.len(),
        savings
    );

    report.performed = match &options.mode {
        ExecutionMode::Script(path) => {
            info!("Writing sync actions to shell script \"{}\"...", path.display());
            write_script(&actions, path)?;
            None
        }
        ExecutionMode::DryRun => Some(destination.perform(&actions, true)?),
        ExecutionMode::Apply => {
            info!("Applying sync actions at destination...");
            let summary = destination.perform(&actions, false)?;
            info!(
                "Sync completed: {} out of {} actions succeeded",
                summary.succeeded, summary.attempted
            );
            Some(summary)
        }
    };
    report.actions = actions;
    Ok(report)
}

/// Emits a timestamp action for every directory present on both sides with
/// differing mtimes. Runs after all file actions so moves into a directory
/// cannot undo an applied directory timestamp.
fn append_dir_timestamp_actions(
    actions: &mut Vec<SyncAction>,
    source_root: PathBuf,
    destination_root: PathBuf,
    source_dirs: &std::collections::HashMap<String, i64>,
    destination_dirs: &std::collections::HashMap<String, i64>,
) {
    let mut emitted: HashSet<String> = actions.iter().map(SyncAction::uniqueness).collect();
    let mut shared: Vec<&String> = source_dirs
        .keys()
        .filter(|rel| destination_dirs.contains_key(*rel))
        .collect();
    shared.sort();

    for rel in shared {
        if source_dirs[rel] == destination_dirs[rel] {
            continue;
        }
        let action = SyncAction::PropagateTimestamp {
            source_base: source_root.clone(),
            destination_base: destination_root.clone(),
            source_rel: rel.clone(),
            destination_rel: rel.clone(),
            source_mtime: None,
        };
        if emitted.insert(action.uniqueness()) {
            actions.push(action);
        }
    }
}

/// Resolves every timestamp action's source mtime from the scanned
/// inventories. Required whenever a side is remote: the performing side
/// cannot stat the other host's tree.
fn resolve_source_mtimes(
    actions: &mut [SyncAction],
    source_files: &std::collections::HashMap<String, presync_digest::FileMeta>,
    source_dirs: &std::collections::HashMap<String, i64>,
) {
    for action in actions {
        if let SyncAction::PropagateTimestamp {
            source_rel,
            source_mtime: source_mtime @ None,
            ..
        } = action
        {
            *source_mtime = source_files
                .get(source_rel)
                .map(|meta| meta.modified_timestamp)
                .or_else(|| source_dirs.get(source_rel).copied());
        }
    }
}

fn report_progress(
    done: &AtomicBool,
    source_counter: &AtomicU64,
    source_expected: u64,
    destination_counter: &AtomicU64,
    destination_expected: u64,
) {
    loop {
        thread::sleep(PROGRESS_INTERVAL);
        let source_done = source_counter.load(Ordering::Relaxed);
        let destination_done = destination_counter.load(Ordering::Relaxed);
        if done.load(Ordering::Relaxed)
            || (source_done >= source_expected && destination_done >= destination_expected)
        {
            return;
        }
        info!(
            "{:.0}% done at source and {:.0}% done at destination",
            percentage(source_done, source_expected),
            percentage(destination_done, destination_expected)
        );
    }
}

fn percentage(actual: u64, expected: u64) -> f64 {
    if expected == 0 {
        100.0
    } else {
        100.0 * actual as f64 / expected as f64
    }
}
