#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `presync_actions` models the three operations the engine may apply to a
//! destination tree: renaming/moving a file, propagating a modification
//! timestamp, and creating a directory chain. [`SyncAction`] is a plain
//! tagged enum so an action list is a value that can be iterated for
//! execution, rendered to a shell script, or serialized for a remote agent
//! without any extra machinery.
//!
//! Every variant supports three things: [`perform`](SyncAction::perform)
//! against a [`FileSystem`], [`unix_command`](SyncAction::unix_command)
//! which renders an equivalent POSIX shell command, and
//! [`uniqueness`](SyncAction::uniqueness) which keys deduplication within a
//! single run.
//!
//! # Invariants
//!
//! - No action deletes, truncates, or overwrites anything. A move whose
//!   destination exists fails; that failure is the designed outcome.
//! - `mkdir` is idempotent and never fails because the directory is already
//!   there.

mod escape;

pub use escape::shell_escape;

use std::fmt;
use std::path::PathBuf;

use presync_fs::{FileSystem, FsError};
use thiserror::Error;

/// Byte that cannot appear in a filesystem path, separating the tag from
/// the path in uniqueness keys.
const KEY_SEPARATOR: char = '\u{0001}';

/// Error raised while performing an action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The underlying filesystem operation failed.
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// A single reconciliation step against the destination tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncAction {
    /// Rename `base/from_rel` to `base/to_rel`. Fails if the destination
    /// path already exists.
    MoveFile {
        /// Tree root the two relative paths are resolved against.
        base: PathBuf,
        /// Current relative path.
        from_rel: String,
        /// Desired relative path.
        to_rel: String,
    },

    /// Set the timestamps of `destination_base/destination_rel` to the
    /// modification time of `source_base/source_rel`.
    PropagateTimestamp {
        /// Root of the source tree.
        source_base: PathBuf,
        /// Root of the destination tree.
        destination_base: PathBuf,
        /// Source file, relative to `source_base`.
        source_rel: String,
        /// Destination file, relative to `destination_base`.
        destination_rel: String,
        /// Pre-resolved source modification time (epoch seconds). Populated
        /// when the source cannot be stat'ed from the side performing the
        /// action; when absent, the source is stat'ed at perform time.
        source_mtime: Option<i64>,
    },

    /// Idempotently create a directory chain.
    MakeDirectory {
        /// Absolute directory path to create.
        abs_path: PathBuf,
    },
}

impl SyncAction {
    /// Executes the action through the supplied filesystem adapter.
    pub fn perform<F: FileSystem + ?Sized>(&self, fs: &F) -> Result<(), ActionError> {
        match self {
            Self::MoveFile { base, from_rel, to_rel } => {
                fs.rename(&base.join(from_rel), &base.join(to_rel))?;
                Ok(())
            }
            Self::PropagateTimestamp {
                source_base,
                destination_base,
                source_rel,
                destination_rel,
                source_mtime,
            } => {
                let mtime = match source_mtime {
                    Some(mtime) => *mtime,
                    None => fs.lstat(&source_base.join(source_rel))?.mtime,
                };
                fs.chtimes(&destination_base.join(destination_rel), mtime, mtime)?;
                Ok(())
            }
            Self::MakeDirectory { abs_path } => {
                fs.mkdir_all(abs_path)?;
                Ok(())
            }
        }
    }

    /// Renders an equivalent POSIX shell command.
    #[must_use]
    pub fn unix_command(&self) -> String {
        match self {
            Self::MoveFile { base, from_rel, to_rel } => format!(
                r#"mv -v -n "{}" "{}""#,
                shell_escape(&base.join(from_rel).to_string_lossy()),
                shell_escape(&base.join(to_rel).to_string_lossy()),
            ),
            Self::PropagateTimestamp {
                source_base,
                destination_base,
                source_rel,
                destination_rel,
                source_mtime,
            } => {
                let destination = destination_base.join(destination_rel);
                match source_mtime {
                    Some(mtime) => format!(
                        r#"touch -d @{mtime} "{}""#,
                        shell_escape(&destination.to_string_lossy()),
                    ),
                    None => format!(
                        r#"touch -r "{}" "{}""#,
                        shell_escape(&source_base.join(source_rel).to_string_lossy()),
                        shell_escape(&destination.to_string_lossy()),
                    ),
                }
            }
            Self::MakeDirectory { abs_path } => format!(
                r#"mkdir -p -v "{}""#,
                shell_escape(&abs_path.to_string_lossy()),
            ),
        }
    }

    /// Returns the key that identifies this action for deduplication: a
    /// move is keyed by what it moves away from, a timestamp by the file it
    /// touches, a mkdir by the directory it creates.
    #[must_use]
    pub fn uniqueness(&self) -> String {
        match self {
            Self::MoveFile { from_rel, .. } => format!("mv{KEY_SEPARATOR}{from_rel}"),
            Self::PropagateTimestamp { destination_rel, .. } => {
                format!("touch{KEY_SEPARATOR}{destination_rel}")
            }
            Self::MakeDirectory { abs_path } => {
                format!("Mkdir{KEY_SEPARATOR}{}", abs_path.display())
            }
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveFile { base, from_rel, to_rel } => write!(
                f,
                "rename/move file from \"{}\" to \"{}\"",
                base.join(from_rel).display(),
                base.join(to_rel).display(),
            ),
            Self::PropagateTimestamp {
                source_base,
                destination_base,
                source_rel,
                destination_rel,
                ..
            } => write!(
                f,
                "propagate timestamp of \"{}\" to \"{}\"",
                source_base.join(source_rel).display(),
                destination_base.join(destination_rel).display(),
            ),
            Self::MakeDirectory { abs_path } => {
                write!(f, "create directory \"{}\"", abs_path.display())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presync_fs::LocalFs;
    use std::fs;

    #[test]
    fn move_file_performs_rename() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("old.bin"), b"data").expect("write");

        let action = SyncAction::MoveFile {
            base: temp.path().to_path_buf(),
            from_rel: "old.bin".into(),
            to_rel: "new.bin".into(),
        };
        action.perform(&LocalFs).expect("perform");
        assert!(!temp.path().join("old.bin").exists());
        assert_eq!(fs::read(temp.path().join("new.bin")).expect("read"), b"data");
    }

    #[test]
    fn move_file_fails_rather_than_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a"), b"a").expect("write");
        fs::write(temp.path().join("b"), b"b").expect("write");

        let action = SyncAction::MoveFile {
            base: temp.path().to_path_buf(),
            from_rel: "a".into(),
            to_rel: "b".into(),
        };
        assert!(action.perform(&LocalFs).is_err());
        assert_eq!(fs::read(temp.path().join("b")).expect("read"), b"b");
    }

    #[test]
    fn timestamp_propagates_from_source_stat() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let destination = temp.path().join("dst");
        fs::create_dir_all(&source).expect("mkdir");
        fs::create_dir_all(&destination).expect("mkdir");
        fs::write(source.join("f"), b"x").expect("write");
        fs::write(destination.join("g"), b"x").expect("write");
        filetime::set_file_mtime(
            source.join("f"),
            filetime::FileTime::from_unix_time(1_500_000_000, 0),
        )
        .expect("set mtime");

        let action = SyncAction::PropagateTimestamp {
            source_base: source,
            destination_base: destination.clone(),
            source_rel: "f".into(),
            destination_rel: "g".into(),
            source_mtime: None,
        };
        action.perform(&LocalFs).expect("perform");

        let info = LocalFs.lstat(&destination.join("g")).expect("lstat");
        assert_eq!(info.mtime, 1_500_000_000);
    }

    #[test]
    fn timestamp_uses_prepopulated_mtime() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("g"), b"x").expect("write");

        let action = SyncAction::PropagateTimestamp {
            source_base: PathBuf::from("/nonexistent/elsewhere"),
            destination_base: temp.path().to_path_buf(),
            source_rel: "f".into(),
            destination_rel: "g".into(),
            source_mtime: Some(1_400_000_000),
        };
        action.perform(&LocalFs).expect("perform");

        let info = LocalFs.lstat(&temp.path().join("g")).expect("lstat");
        assert_eq!(info.mtime, 1_400_000_000);
    }

    #[test]
    fn make_directory_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let action = SyncAction::MakeDirectory {
            abs_path: temp.path().join("a/b/c"),
        };
        action.perform(&LocalFs).expect("perform");
        action.perform(&LocalFs).expect("perform again");
        assert!(temp.path().join("a/b/c").is_dir());
    }

    #[test]
    fn unix_commands_match_expected_tools() {
        let action = SyncAction::MoveFile {
            base: PathBuf::from("/dst"),
            from_rel: "b.bin".into(),
            to_rel: "a.bin".into(),
        };
        assert_eq!(action.unix_command(), r#"mv -v -n "/dst/b.bin" "/dst/a.bin""#);

        let action = SyncAction::PropagateTimestamp {
            source_base: PathBuf::from("/src"),
            destination_base: PathBuf::from("/dst"),
            source_rel: "x".into(),
            destination_rel: "y".into(),
            source_mtime: None,
        };
        assert_eq!(action.unix_command(), r#"touch -r "/src/x" "/dst/y""#);

        let action = SyncAction::PropagateTimestamp {
            source_base: PathBuf::from("/src"),
            destination_base: PathBuf::from("/dst"),
            source_rel: "x".into(),
            destination_rel: "y".into(),
            source_mtime: Some(1234),
        };
        assert_eq!(action.unix_command(), r#"touch -d @1234 "/dst/y""#);

        let action = SyncAction::MakeDirectory {
            abs_path: PathBuf::from("/dst/deep"),
        };
        assert_eq!(action.unix_command(), r#"mkdir -p -v "/dst/deep""#);
    }

    #[test]
    fn uniqueness_keys_are_tag_and_path() {
        let mv = SyncAction::MoveFile {
            base: PathBuf::from("/dst"),
            from_rel: "from".into(),
            to_rel: "to".into(),
        };
        assert_eq!(mv.uniqueness(), format!("mv{KEY_SEPARATOR}from"));

        let touch = SyncAction::PropagateTimestamp {
            source_base: PathBuf::from("/s"),
            destination_base: PathBuf::from("/d"),
            source_rel: "a".into(),
            destination_rel: "b".into(),
            source_mtime: None,
        };
        assert_eq!(touch.uniqueness(), format!("touch{KEY_SEPARATOR}b"));

        let mkdir = SyncAction::MakeDirectory {
            abs_path: PathBuf::from("/d/sub"),
        };
        assert_eq!(mkdir.uniqueness(), format!("Mkdir{KEY_SEPARATOR}/d/sub"));
    }

    #[test]
    fn moves_with_same_origin_share_a_key() {
        let a = SyncAction::MoveFile {
            base: PathBuf::from("/dst"),
            from_rel: "same".into(),
            to_rel: "one".into(),
        };
        let b = SyncAction::MoveFile {
            base: PathBuf::from("/dst"),
            from_rel: "same".into(),
            to_rel: "two".into(),
        };
        assert_eq!(a.uniqueness(), b.uniqueness());
    }
}
