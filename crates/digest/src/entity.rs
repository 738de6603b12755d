//! Identity tuples for files under reconciliation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata-level identity of a file: size plus modification timestamp.
///
/// Equality is bitwise on the tuple. A source file whose relative path has a
/// counterpart at destination with an equal `FileMeta` needs no action.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Length in bytes.
    pub size: i64,
    /// Modification time, seconds since the Unix epoch.
    pub modified_timestamp: i64,
}

impl fmt::Display for FileMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{size: {}, modified: {}}}",
            self.size, self.modified_timestamp
        )
    }
}

/// Content-level identity of a file.
///
/// Combines the lowercased extension, the exact size, and the fuzzy hash
/// produced by [`compute_digest`](crate::compute_digest). Two files with
/// equal digests are treated as having the same content.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct FileDigest {
    /// Lowercased filename extension including the leading dot, or empty.
    pub file_extension: String,
    /// Length in bytes.
    pub file_size: i64,
    /// Prefixed hex CRC32 over the sampled byte window.
    pub file_fuzzy_hash: String,
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.file_extension, self.file_size, self.file_fuzzy_hash
        )
    }
}

/// Cheap pre-filter key: a digest match requires an extension and size
/// match, so destination files are narrowed on this tuple before any byte
/// of content is read.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FileExtAndSize {
    /// Lowercased filename extension including the leading dot, or empty.
    pub file_extension: String,
    /// Length in bytes.
    pub file_size: i64,
}

impl fmt::Display for FileExtAndSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.file_extension, self.file_size)
    }
}
