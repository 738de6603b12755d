//! Spawning and probing the agent on a peer host via the system `ssh`.

use std::io::{self, BufReader};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use presync_agent::AgentClient;
use presync_sync::{RemoteEndpoint, SyncEndpoint};
use tracing::{debug, info};

use crate::location::Location;

/// How long the reachability probe may take before the host is declared
/// unreachable.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

fn ssh_command(location: &Location, target: &str, remote_command: &str) -> Command {
    let mut command = Command::new("ssh");
    command.arg("-o").arg("BatchMode=yes");
    if location.port != 0 {
        command.arg("-p").arg(location.port.to_string());
    }
    command.arg(target);
    command.arg(remote_command);
    command
}

/// Checks that `remote_bin` answers on the peer host, within
/// [`PROBE_TIMEOUT`].
pub fn probe_agent(location: &Location, target: &str, remote_bin: &str) -> bool {
    let mut command = ssh_command(location, target, &format!("{remote_bin} --version"));
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            debug!("remote agent probe failed to spawn ssh: {err}");
            return false;
        }
    };

    let deadline = Instant::now() + PROBE_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if status.success() {
                    info!("Remote presync detected on {target}");
                    return true;
                }
                debug!("remote agent probe exited with {status}");
                return false;
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    debug!("remote agent probe timed out");
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
                thread::sleep(Duration::from_millis(100));
            }
            Err(err) => {
                debug!("remote agent probe failed: {err}");
                return false;
            }
        }
    }
}

/// Endpoint wrapper that also owns the ssh child process, reaping it on
/// shutdown.
struct SshEndpoint {
    inner: RemoteEndpoint<BufReader<std::process::ChildStdout>, std::process::ChildStdin>,
    child: Child,
}

impl SyncEndpoint for SshEndpoint {
    fn root(&self) -> &std::path::Path {
        self.inner.root()
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn scan(
        &mut self,
        excluded: &std::collections::HashSet<String>,
    ) -> Result<presync_sync::ScanOutcome, presync_sync::SyncError> {
        self.inner.scan(excluded)
    }

    fn digests(
        &mut self,
        files: &[String],
        counter: &std::sync::atomic::AtomicU64,
    ) -> Result<presync_scan::DigestIndex, presync_sync::SyncError> {
        self.inner.digests(files, counter)
    }

    fn dir_exists(&self, path: &std::path::Path) -> bool {
        self.inner.dir_exists(path)
    }

    fn perform(
        &mut self,
        actions: &[presync_actions::SyncAction],
        dry_run: bool,
    ) -> Result<presync_sync::PerformSummary, presync_sync::SyncError> {
        self.inner.perform(actions, dry_run)
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
        let _ = self.child.wait();
    }
}

/// Starts `remote_bin --agent` on the peer host and wraps its stdio in a
/// [`SyncEndpoint`].
pub fn spawn_endpoint(
    location: &Location,
    target: &str,
    remote_bin: &str,
) -> io::Result<Box<dyn SyncEndpoint>> {
    let mut command = ssh_command(location, target, &format!("{remote_bin} --agent"));
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let mut child = command.spawn()?;
    let stdin = child.stdin.take().ok_or_else(|| {
        io::Error::new(io::ErrorKind::BrokenPipe, "ssh stdin unavailable")
    })?;
    let stdout = child.stdout.take().ok_or_else(|| {
        io::Error::new(io::ErrorKind::BrokenPipe, "ssh stdout unavailable")
    })?;

    let client = AgentClient::new(BufReader::new(stdout), stdin);
    let inner = RemoteEndpoint::new(client, &location.path);
    Ok(Box::new(SshEndpoint { inner, child }))
}
