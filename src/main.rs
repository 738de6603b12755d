//! Command-line front end.
//!
//! `presync SOURCE DESTINATION` reconciles renames, movements and timestamp
//! drift between the two trees so a following `rsync` run has nothing left
//! to re-transfer. Either operand may name a remote tree
//! (`[user@]host:[port:]path`), served by a `presync --agent` process
//! spawned over ssh.

mod exclusions;
mod human;
mod listing;
mod location;
mod remote;

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Arg, ArgAction, ArgMatches, Command};
use presync_fs::{FileSystem, LocalFs};
use presync_sync::{run, ExecutionMode, LocalEndpoint, SyncEndpoint, SyncOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::location::Location;

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 1;
const EXIT_SOURCE_DIR: i32 = 2;
const EXIT_DESTINATION_DIR: i32 = 3;
const EXIT_LIST_DIR: i32 = 4;
const EXIT_SYNC: i32 = 5;
const EXIT_EXCLUSIONS: i32 = 6;

fn main() {
    process::exit(run_cli());
}

fn command() -> Command {
    Command::new("presync")
        .version(env!("CARGO_PKG_VERSION"))
        .about(
            "Propagates file renames, movements and timestamp changes from a source \
             directory to a destination directory, without transferring any file contents. \
             Run it before rsync.",
        )
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .help("Source directory, or [user@]host:[port:]path"),
        )
        .arg(
            Arg::new("destination")
                .value_name("DESTINATION")
                .help("Destination directory, or [user@]host:[port:]path"),
        )
        .arg(
            Arg::new("exclusions")
                .long("exclusions")
                .value_name("FILE")
                .help(
                    "Path to a file containing a newline separated list of file/directory \
                     names to exclude (defaults to a small list of platform noise such as \
                     Thumbs.db and .Trashes)",
                ),
        )
        .arg(
            Arg::new("shellscript")
                .long("shellscript")
                .action(ArgAction::SetTrue)
                .conflicts_with("dry-run")
                .help(
                    "Instead of applying changes directly, generate a shell script \
                     (useful to inspect what would happen, or to run the actions as a \
                     different user)",
                ),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Report every action without performing any of them"),
        )
        .arg(
            Arg::new("dir-timestamps")
                .long("dir-timestamps")
                .action(ArgAction::SetTrue)
                .help("Also propagate modification timestamps of directories"),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .value_name("DIR")
                .help("List files of the given directory with their metadata as CSV and exit"),
        )
        .arg(
            Arg::new("agent")
                .long("agent")
                .action(ArgAction::SetTrue)
                .help("Serve the JSON-line agent protocol on stdin/stdout (used over ssh)"),
        )
        .arg(
            Arg::new("remote-bin")
                .long("remote-bin")
                .value_name("PATH")
                .default_value("presync")
                .help("Name or path of this program on the remote host"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();
}

fn run_cli() -> i32 {
    let matches = command().get_matches();
    init_logging(matches.get_flag("verbose"));

    if matches.get_flag("agent") {
        return run_agent_mode();
    }

    let exclusions = match exclusions::load(matches.get_one::<String>("exclusions")) {
        Ok(exclusions) => exclusions,
        Err(err) => {
            error!("error: {err}");
            return EXIT_EXCLUSIONS;
        }
    };

    if let Some(dir) = matches.get_one::<String>("list") {
        return run_list_mode(dir, &exclusions);
    }

    let (Some(source_arg), Some(destination_arg)) = (
        matches.get_one::<String>("source"),
        matches.get_one::<String>("destination"),
    ) else {
        error!("error: two arguments expected: source directory path and destination directory path");
        error!("Run \"presync --help\" for usage");
        return EXIT_USAGE;
    };

    let source_location = match Location::parse(source_arg) {
        Ok(location) => location,
        Err(err) => {
            error!("error: source path: {err}");
            return EXIT_SOURCE_DIR;
        }
    };
    let destination_location = match Location::parse(destination_arg) {
        Ok(location) => location,
        Err(err) => {
            error!("error: destination path: {err}");
            return EXIT_DESTINATION_DIR;
        }
    };

    let options = SyncOptions {
        mode: execution_mode(&matches),
        exclusions,
        dir_timestamps: matches.get_flag("dir-timestamps"),
        progress: true,
    };

    let remote_bin = matches
        .get_one::<String>("remote-bin")
        .map_or("presync", String::as_str)
        .to_string();

    let mut source_endpoint =
        match make_endpoint(&source_location, &remote_bin, EXIT_SOURCE_DIR) {
            Ok(endpoint) => endpoint,
            Err(code) => return code,
        };
    let mut destination_endpoint =
        match make_endpoint(&destination_location, &remote_bin, EXIT_DESTINATION_DIR) {
            Ok(endpoint) => endpoint,
            Err(code) => return code,
        };

    let result = run(
        source_endpoint.as_mut(),
        destination_endpoint.as_mut(),
        &options,
    );
    source_endpoint.shutdown();
    destination_endpoint.shutdown();

    match result {
        Ok(report) => {
            if !report.actions.is_empty() {
                info!(
                    "Reconciled {} actions, saving {} of file transfer",
                    report.actions.len(),
                    human::binary_size(report.savings)
                );
            }
            EXIT_SUCCESS
        }
        Err(err) => {
            error!("error while syncing: {err}");
            EXIT_SYNC
        }
    }
}

fn execution_mode(matches: &ArgMatches) -> ExecutionMode {
    if matches.get_flag("dry-run") {
        ExecutionMode::DryRun
    } else if matches.get_flag("shellscript") {
        ExecutionMode::Script(PathBuf::from(format!(
            "sync_actions_{}.sh",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        )))
    } else {
        ExecutionMode::Apply
    }
}

fn run_agent_mode() -> i32 {
    let stdin = io::stdin();
    let stdout = io::stdout();
    match presync_agent::run_agent(&LocalFs, stdin.lock(), stdout.lock()) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            error!("agent failed: {err}");
            EXIT_SYNC
        }
    }
}

fn run_list_mode(dir: &str, exclusions: &HashSet<String>) -> i32 {
    let path = Path::new(dir);
    if !LocalFs.is_readable_dir(path) {
        error!("error: list files directory path \"{dir}\" is not a readable directory");
        return EXIT_LIST_DIR;
    }
    match listing::print_csv(path, exclusions, &mut io::stdout()) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            error!("error while listing \"{dir}\": {err}");
            EXIT_LIST_DIR
        }
    }
}

/// Builds the endpoint for one side: a direct local adapter, or an agent
/// reached through a spawned ssh process.
fn make_endpoint(
    location: &Location,
    remote_bin: &str,
    failure_code: i32,
) -> Result<Box<dyn SyncEndpoint>, i32> {
    if let Some(target) = location.ssh_target() {
        if !remote::probe_agent(location, &target, remote_bin) {
            error!("error: {remote_bin} not reachable on {target}");
            return Err(failure_code);
        }
        let endpoint = remote::spawn_endpoint(location, &target, remote_bin).map_err(|err| {
            error!("error: failed to start remote agent on {target}: {err}");
            failure_code
        })?;
        return Ok(endpoint);
    }

    let path = match std::fs::canonicalize(&location.path) {
        Ok(path) => path,
        Err(_) => PathBuf::from(&location.path),
    };
    if !LocalFs.is_readable_dir(&path) {
        error!(
            "error: path \"{}\" is not a readable directory",
            location.path
        );
        return Err(failure_code);
    }
    Ok(Box::new(LocalEndpoint::new(LocalFs, path)))
}
