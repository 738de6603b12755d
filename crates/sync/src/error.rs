//! Run-level error type.

use std::io;
use std::path::PathBuf;

use presync_agent::{ClientError, SpecError};
use presync_fs::FsError;
use presync_scan::ScanError;
use thiserror::Error;

/// Fatal failure of a reconciliation run.
///
/// Per-file and per-action problems never surface here; they are logged and
/// the run continues. These variants are the documented abort paths.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A tree root could not be scanned.
    #[error("error scanning directory: {0}")]
    Scan(#[from] FsError),

    /// An indexer gave up after too many hash failures.
    #[error("error while building index: {0}")]
    Index(#[from] ScanError),

    /// The agent connection broke or the agent reported a failure.
    #[error("remote operation failed: {0}")]
    Remote(#[from] ClientError),

    /// An action could not be flattened for the wire.
    #[error("couldn't encode action for the agent: {0}")]
    Encode(#[from] SpecError),

    /// The shell script file could not be written.
    #[error("couldn't write shell script '{path}': {source}", path = path.display())]
    Script {
        /// The script path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}
