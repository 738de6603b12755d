#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `presync_sync` is the reconciliation engine. Given a source and a
//! destination tree (each behind a [`SyncEndpoint`], local or remote), a
//! run proceeds in fixed phases:
//!
//! 1. Inventory both trees concurrently.
//! 2. Diff on metadata to find the source orphans; bail out early when the
//!    trees are already in sync.
//! 3. Narrow the destination to extension+size candidates; bail out when
//!    nothing at destination could possibly match.
//! 4. Digest orphans and candidates concurrently, one parallel indexer per
//!    side.
//! 5. Match digests into a deduplicated, deterministically ordered action
//!    list.
//! 6. Apply the actions, report them (dry run), or serialize them to a
//!    shell script.
//!
//! The matcher is a pure function of the inventories and digests; given the
//! same trees it emits the same action list, which is what the test suite
//! leans on.
//!
//! # Invariants
//!
//! - No action destroys data: no deletes, no truncation, no overwriting
//!   moves. A destination file is consumed by at most one move.
//! - A directory-creating action precedes any move into that directory.
//! - Failures of individual actions are logged and skipped; only unreadable
//!   roots, an overwhelmed indexer, or a collapsed agent connection abort a
//!   run.

mod endpoint;
mod error;
mod executor;
mod matcher;
mod run;

pub use endpoint::{LocalEndpoint, PerformSummary, RemoteEndpoint, ScanOutcome, SyncEndpoint};
pub use error::SyncError;
pub use executor::{write_script, ExecutionMode};
pub use matcher::{compute_sync_actions, MatchInput};
pub use run::{run, SyncOptions, SyncReport};
