#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `presync_fs` defines the filesystem capability surface that every other
//! part of the workspace is written against. The [`FileSystem`] trait covers
//! exactly the operations the reconciliation engine needs: a recursive walk
//! with exclusion pruning, `lstat`, whole-file and positioned reads for
//! digesting, a rename that refuses to overwrite, timestamp updates, and
//! idempotent directory creation. [`LocalFs`] implements the trait with
//! `std::fs` and the `filetime` crate.
//!
//! # Invariants
//!
//! - [`FileSystem::walk`] yields relative paths with `/` separators and
//!   visits directory entries in lexicographic order, so two walks over an
//!   unchanged tree return the same sequence.
//! - [`FileSystem::rename`] never replaces an existing destination; callers
//!   rely on this to guarantee the engine cannot destroy data.
//! - Per-entry failures during a walk are logged and skipped; only an
//!   unreadable root is fatal.

mod error;
mod local;
mod walk;

pub use error::FsError;
pub use local::LocalFs;

use std::collections::HashSet;
use std::path::Path;

/// Metadata subset returned by [`FileSystem::lstat`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileInfo {
    /// Length in bytes.
    pub size: i64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: i64,
    /// Whether the path is a directory.
    pub is_dir: bool,
    /// Whether the path is a regular file.
    pub is_regular: bool,
}

/// A single file or directory discovered by [`FileSystem::walk`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalkEntry {
    /// Slash-delimited path relative to the walk root.
    pub rel_path: String,
    /// Length in bytes (zero for directories).
    pub size: i64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: i64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Operations the reconciliation engine performs against a directory tree.
///
/// The engine never branches on which implementation it holds; local trees
/// use [`LocalFs`] and remote trees are served by an agent speaking the
/// same contracts over a line-oriented protocol.
pub trait FileSystem: Send + Sync {
    /// Recursively walks `root`, returning every regular file and directory
    /// beneath it.
    ///
    /// Directories whose basename is in `excluded` are pruned without being
    /// entered; files whose basename is in `excluded`, or begins with `._`,
    /// are omitted. Entries whose metadata cannot be read are logged and
    /// skipped. Fails only when `root` itself cannot be read.
    fn walk(&self, root: &Path, excluded: &HashSet<String>) -> Result<Vec<WalkEntry>, FsError>;

    /// Returns metadata for `path` without following a terminal symlink.
    fn lstat(&self, path: &Path) -> Result<FileInfo, FsError>;

    /// Reads the entire contents of `path`.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Reads up to `buf.len()` bytes from `path` starting at `offset`.
    ///
    /// Returns the number of bytes read, which may be short at end of file.
    fn read_at(&self, path: &Path, offset: u64, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Renames `from` to `to`, failing if `to` already exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    /// Sets the access and modification times of `path` to the given epoch
    /// seconds, leaving all other metadata untouched.
    fn chtimes(&self, path: &Path, atime: i64, mtime: i64) -> Result<(), FsError>;

    /// Creates `path` and any missing parents. Succeeds if it already exists.
    fn mkdir_all(&self, path: &Path) -> Result<(), FsError>;

    /// Reports whether `path` is an existing, readable directory.
    fn is_readable_dir(&self, path: &Path) -> bool;
}
