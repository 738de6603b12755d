//! Error type for filesystem operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error raised by a [`FileSystem`](crate::FileSystem) operation.
#[derive(Debug, Error)]
pub enum FsError {
    /// An I/O error occurred while accessing a path.
    #[error("failed to {action} '{path}': {source}", path = path.display())]
    Io {
        /// The operation being performed (e.g. "read", "rename").
        action: &'static str,
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A rename refused to replace an existing destination.
    #[error("refusing to rename onto existing path '{path}'", path = path.display())]
    AlreadyExists {
        /// The destination that already exists.
        path: PathBuf,
    },

    /// The root of a walk does not exist or is not a directory.
    #[error("'{path}' is not a readable directory", path = path.display())]
    UnreadableRoot {
        /// The offending root path.
        path: PathBuf,
    },
}

impl FsError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
