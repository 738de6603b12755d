//! Wire envelopes and payloads.

use std::collections::HashMap;
use std::path::PathBuf;

use presync_actions::SyncAction;
use presync_digest::{FileDigest, FileMeta};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One protocol envelope. Serializes as `{"type": "...", "payload": {...}}`
/// with snake_case type tags.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    /// Ask the agent to scan a directory.
    WalkRequest(WalkRequest),
    /// Periodic scan progress from the agent.
    WalkProgress(WalkProgress),
    /// Terminal reply to a walk request.
    WalkResponse(WalkResponse),
    /// Ask the agent to hash a batch of files.
    DigestRequest(DigestRequest),
    /// Per-file hashing progress from the agent.
    DigestProgress(DigestProgress),
    /// Terminal reply to a digest request.
    DigestResponse(DigestResponse),
    /// Ask the agent to execute actions.
    PerformRequest(PerformRequest),
    /// Terminal reply to a perform request.
    PerformResponse(PerformResponse),
    /// Ask the agent to exit its loop.
    Quit,
    /// The agent could not serve a request.
    Error(ErrorReply),
}

impl Message {
    /// Short name of the envelope type, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WalkRequest(_) => "walk_request",
            Self::WalkProgress(_) => "walk_progress",
            Self::WalkResponse(_) => "walk_response",
            Self::DigestRequest(_) => "digest_request",
            Self::DigestProgress(_) => "digest_progress",
            Self::DigestResponse(_) => "digest_response",
            Self::PerformRequest(_) => "perform_request",
            Self::PerformResponse(_) => "perform_response",
            Self::Quit => "quit",
            Self::Error(_) => "error",
        }
    }
}

/// Scan a directory tree.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalkRequest {
    /// Directory to scan on the agent's host.
    pub dir_path: String,
    /// Basenames to exclude from the scan.
    pub excluded_names: Vec<String>,
    /// How often to emit progress envelopes; zero disables them.
    #[serde(default)]
    pub progress_interval_ms: i64,
}

/// Scan progress.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalkProgress {
    /// Regular files found so far.
    pub files_found: u64,
}

/// Scan result: the file inventory, directory timestamps, and total bytes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalkResponse {
    /// Relative path → file metadata.
    pub files: HashMap<String, FileMeta>,
    /// Relative directory path → modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirs: Option<HashMap<String, i64>>,
    /// Sum of the sizes of all files in the inventory.
    pub total_size: i64,
}

/// Hash a batch of files.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DigestRequest {
    /// Tree root the relative paths resolve against.
    pub base_path: String,
    /// Relative paths to hash.
    pub files: Vec<String>,
}

/// Hashing progress.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct DigestProgress {
    /// Files hashed so far.
    pub files_hashed: u64,
    /// Total files in the request.
    pub total: u64,
}

/// Hashing result. Files that failed to hash are simply absent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DigestResponse {
    /// Relative path → digest.
    pub digests: HashMap<String, FileDigest>,
}

/// One action, flattened for the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Rename within the destination tree.
    Move {
        /// Destination tree root on the agent's host.
        base_path: String,
        /// Current relative path.
        from_rel_path: String,
        /// Desired relative path.
        to_rel_path: String,
    },
    /// Set a file's timestamps.
    Timestamp {
        /// Destination tree root on the agent's host.
        dest_base_path: String,
        /// File to touch, relative to the root.
        dest_rel_path: String,
        /// Modification time to apply, epoch seconds.
        mod_timestamp: i64,
    },
    /// Create a directory chain.
    Mkdir {
        /// Absolute directory path on the agent's host.
        dir_path: String,
    },
}

/// Conversion failure from [`SyncAction`] to [`ActionSpec`].
#[derive(Debug, Error)]
pub enum SpecError {
    /// A timestamp action crossed the wire without a resolved source mtime.
    #[error("timestamp action for '{destination_rel}' has no resolved source mtime")]
    MissingTimestamp {
        /// The destination file of the offending action.
        destination_rel: String,
    },
}

impl ActionSpec {
    /// Flattens an engine action for the wire. The agent cannot stat the
    /// client's source tree, so timestamp actions must already carry their
    /// resolved mtime.
    pub fn from_action(action: &SyncAction) -> Result<Self, SpecError> {
        match action {
            SyncAction::MoveFile { base, from_rel, to_rel } => Ok(Self::Move {
                base_path: base.to_string_lossy().into_owned(),
                from_rel_path: from_rel.clone(),
                to_rel_path: to_rel.clone(),
            }),
            SyncAction::PropagateTimestamp {
                destination_base,
                destination_rel,
                source_mtime,
                ..
            } => match source_mtime {
                Some(mtime) => Ok(Self::Timestamp {
                    dest_base_path: destination_base.to_string_lossy().into_owned(),
                    dest_rel_path: destination_rel.clone(),
                    mod_timestamp: *mtime,
                }),
                None => Err(SpecError::MissingTimestamp {
                    destination_rel: destination_rel.clone(),
                }),
            },
            SyncAction::MakeDirectory { abs_path } => Ok(Self::Mkdir {
                dir_path: abs_path.to_string_lossy().into_owned(),
            }),
        }
    }

    /// Rebuilds the engine action on the agent side.
    #[must_use]
    pub fn to_action(&self) -> SyncAction {
        match self {
            Self::Move {
                base_path,
                from_rel_path,
                to_rel_path,
            } => SyncAction::MoveFile {
                base: PathBuf::from(base_path),
                from_rel: from_rel_path.clone(),
                to_rel: to_rel_path.clone(),
            },
            Self::Timestamp {
                dest_base_path,
                dest_rel_path,
                mod_timestamp,
            } => SyncAction::PropagateTimestamp {
                source_base: PathBuf::new(),
                destination_base: PathBuf::from(dest_base_path),
                source_rel: String::new(),
                destination_rel: dest_rel_path.clone(),
                source_mtime: Some(*mod_timestamp),
            },
            Self::Mkdir { dir_path } => SyncAction::MakeDirectory {
                abs_path: PathBuf::from(dir_path),
            },
        }
    }
}

/// Execute a batch of actions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PerformRequest {
    /// Actions, in the order they must run.
    pub actions: Vec<ActionSpec>,
    /// Report without executing.
    pub dry_run: bool,
}

/// Outcome of one action.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    /// Index into the request's action list.
    pub index: usize,
    /// Whether the action succeeded.
    pub success: bool,
    /// Failure detail, when unsuccessful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcomes for a perform request, in request order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PerformResponse {
    /// One result per requested action.
    pub results: Vec<ActionResult>,
}

/// Agent-side failure report.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorReply {
    /// Human-readable description.
    pub message: String,
}
