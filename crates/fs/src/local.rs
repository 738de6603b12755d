//! [`FileSystem`] implementation backed by the local filesystem.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use filetime::FileTime;

use crate::walk::walk_tree;
use crate::{FileInfo, FileSystem, FsError, WalkEntry};

/// Local-tree adapter over `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Creates a new local adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn walk(&self, root: &Path, excluded: &HashSet<String>) -> Result<Vec<WalkEntry>, FsError> {
        walk_tree(root, excluded)
    }

    fn lstat(&self, path: &Path) -> Result<FileInfo, FsError> {
        let meta = fs::symlink_metadata(path).map_err(|err| FsError::io("stat", path, err))?;
        Ok(FileInfo {
            size: meta.len() as i64,
            mtime: FileTime::from_last_modification_time(&meta).unix_seconds(),
            is_dir: meta.is_dir(),
            is_regular: meta.file_type().is_file(),
        })
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        fs::read(path).map_err(|err| FsError::io("read", path, err))
    }

    fn read_at(&self, path: &Path, offset: u64, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut file = fs::File::open(path).map_err(|err| FsError::io("open", path, err))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|err| FsError::io("seek", path, err))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(FsError::io("read", path, err)),
            }
        }
        Ok(filled)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        if fs::symlink_metadata(to).is_ok() {
            return Err(FsError::AlreadyExists { path: to.into() });
        }
        fs::rename(from, to).map_err(|err| FsError::io("rename", from, err))
    }

    fn chtimes(&self, path: &Path, atime: i64, mtime: i64) -> Result<(), FsError> {
        filetime::set_file_times(
            path,
            FileTime::from_unix_time(atime, 0),
            FileTime::from_unix_time(mtime, 0),
        )
        .map_err(|err| FsError::io("set times of", path, err))
    }

    fn mkdir_all(&self, path: &Path) -> Result<(), FsError> {
        fs::create_dir_all(path).map_err(|err| FsError::io("create directory", path, err))
    }

    fn is_readable_dir(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lstat_reports_size_and_kind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("f.bin");
        fs::write(&file, vec![7u8; 100]).expect("write");

        let info = LocalFs.lstat(&file).expect("lstat");
        assert_eq!(info.size, 100);
        assert!(info.is_regular);
        assert!(!info.is_dir);

        let dir_info = LocalFs.lstat(temp.path()).expect("lstat dir");
        assert!(dir_info.is_dir);
    }

    #[test]
    fn read_at_returns_window_and_short_read_at_eof() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("f.bin");
        fs::write(&file, b"0123456789").expect("write");

        let mut buf = [0u8; 4];
        let n = LocalFs.read_at(&file, 2, &mut buf).expect("read_at");
        assert_eq!(n, 4);
        assert_eq!(&buf, b"2345");

        let n = LocalFs.read_at(&file, 8, &mut buf).expect("read_at eof");
        assert_eq!(n, 2);
        assert_eq!(&buf[..n], b"89");
    }

    #[test]
    fn rename_refuses_existing_destination() {
        let temp = tempfile::tempdir().expect("tempdir");
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::write(&a, b"a").expect("write");
        fs::write(&b, b"b").expect("write");

        let err = LocalFs.rename(&a, &b).expect_err("must not overwrite");
        assert!(matches!(err, FsError::AlreadyExists { .. }));
        assert_eq!(fs::read(&b).expect("read"), b"b");
    }

    #[test]
    fn rename_moves_when_destination_free() {
        let temp = tempfile::tempdir().expect("tempdir");
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::write(&a, b"payload").expect("write");

        LocalFs.rename(&a, &b).expect("rename");
        assert!(!a.exists());
        assert_eq!(fs::read(&b).expect("read"), b"payload");
    }

    #[test]
    fn chtimes_sets_modification_time() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("f");
        fs::write(&file, b"x").expect("write");

        LocalFs.chtimes(&file, 1_600_000_000, 1_600_000_000).expect("chtimes");
        let info = LocalFs.lstat(&file).expect("lstat");
        assert_eq!(info.mtime, 1_600_000_000);
    }

    #[test]
    fn mkdir_all_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let deep = temp.path().join("x/y/z");
        LocalFs.mkdir_all(&deep).expect("mkdir");
        LocalFs.mkdir_all(&deep).expect("mkdir again");
        assert!(LocalFs.is_readable_dir(&deep));
    }
}
