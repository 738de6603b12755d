//! Windowed CRC32 content digest.
//!
//! Files up to [`THRESHOLD_FILE_SIZE`] are hashed in full (prefix `f`).
//! Larger files are sampled: the first half-threshold bytes, a
//! quarter-threshold window starting at the middle, and the final
//! quarter-threshold bytes, concatenated in that order (prefix `s`). The
//! prefix keeps a small file's full-content hash from ever colliding with a
//! large file's sampled hash.

use std::path::Path;

use presync_fs::{FileSystem, FsError};
use thiserror::Error;

use crate::FileDigest;

/// Files at or below this size are hashed whole. Must stay a multiple of 4
/// so the three sample windows are integer byte counts.
pub const THRESHOLD_FILE_SIZE: i64 = 16 * 1024;

/// Error computing a file digest.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Digests are only defined for regular files.
    #[error("can't compute hash of non-regular file '{path}'")]
    NotRegular {
        /// The offending path.
        path: String,
    },

    /// A sample window could not be read in full.
    #[error("couldn't read {window} bytes of '{path}' (maybe file is corrupted?)")]
    ShortRead {
        /// Which window failed ("first", "middle", "last").
        window: &'static str,
        /// The offending path.
        path: String,
    },

    /// The underlying filesystem operation failed.
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Returns the lowercased extension of `path`'s basename, including the
/// leading dot, or an empty string when the basename has no dot.
#[must_use]
pub fn file_ext(path: &str) -> String {
    let basename = path.rsplit('/').next().unwrap_or(path);
    match basename.rfind('.') {
        Some(idx) => basename[idx..].to_lowercase(),
        None => String::new(),
    }
}

/// Computes the [`FileDigest`] of the regular file at `path`.
///
/// Reads go through the supplied adapter, so the same code digests local
/// and agent-served trees.
pub fn compute_digest<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
) -> Result<FileDigest, DigestError> {
    let info = fs.lstat(path)?;
    if !info.is_regular {
        return Err(DigestError::NotRegular {
            path: path.display().to_string(),
        });
    }

    let (prefix, bytes) = if info.size <= THRESHOLD_FILE_SIZE {
        ("f", fs.read_file(path)?)
    } else {
        ("s", read_crucial_bytes(fs, path, info.size)?)
    };

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes);
    let fuzzy = format!("{prefix}{:08x}", hasher.finalize());

    Ok(FileDigest {
        file_extension: file_ext(&path.to_string_lossy()),
        file_size: info.size,
        file_fuzzy_hash: fuzzy,
    })
}

/// Reads the head, middle, and tail windows of a file larger than the
/// threshold and concatenates them in order.
fn read_crucial_bytes<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    size: i64,
) -> Result<Vec<u8>, DigestError> {
    let head_len = (THRESHOLD_FILE_SIZE / 2) as usize;
    let window_len = (THRESHOLD_FILE_SIZE / 4) as usize;

    let mut bytes = vec![0u8; head_len + 2 * window_len];
    let (head, rest) = bytes.split_at_mut(head_len);
    let (middle, last) = rest.split_at_mut(window_len);

    read_window(fs, path, 0, head, "first")?;
    read_window(fs, path, (size / 2) as u64, middle, "middle")?;
    read_window(fs, path, (size - window_len as i64) as u64, last, "last")?;

    Ok(bytes)
}

fn read_window<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    offset: u64,
    buf: &mut [u8],
    window: &'static str,
) -> Result<(), DigestError> {
    let n = fs.read_at(path, offset, buf)?;
    if n < buf.len() {
        return Err(DigestError::ShortRead {
            window,
            path: path.display().to_string(),
        });
    }
    Ok(())
}
