//! Execution modes and the shell-script serializer.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use presync_actions::SyncAction;

use crate::SyncError;

/// How a computed action list leaves the engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExecutionMode {
    /// Perform each action against the destination.
    Apply,
    /// Narrate each action without performing it.
    DryRun,
    /// Write one shell command per action to the given file.
    Script(PathBuf),
}

/// Writes the actions as a shell script, one POSIX command per line, owner
/// executable only.
pub fn write_script(actions: &[SyncAction], path: &Path) -> Result<(), SyncError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o700);
    }
    let mut file = options.open(path).map_err(|source| SyncError::Script {
        path: path.to_path_buf(),
        source,
    })?;

    let mut script = String::with_capacity(actions.len() * 80);
    for action in actions {
        script.push_str(&action.unix_command());
        script.push('\n');
    }
    file.write_all(script.as_bytes())
        .map_err(|source| SyncError::Script {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn script_has_one_command_per_line_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("sync_actions.sh");
        let actions = vec![
            SyncAction::MakeDirectory {
                abs_path: PathBuf::from("/dst/deep"),
            },
            SyncAction::MoveFile {
                base: PathBuf::from("/dst"),
                from_rel: "old".into(),
                to_rel: "deep/new".into(),
            },
        ];

        write_script(&actions, &script).expect("write script");
        let contents = fs::read_to_string(&script).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"mkdir -p -v "/dst/deep""#);
        assert_eq!(lines[1], r#"mv -v -n "/dst/old" "/dst/deep/new""#);
    }

    #[cfg(unix)]
    #[test]
    fn script_is_owner_executable_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("s.sh");
        write_script(&[], &script).expect("write script");

        let mode = fs::metadata(&script).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
