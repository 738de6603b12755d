#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `presync_scan` turns directory trees into the data the matcher consumes:
//!
//! - [`inventory`] walks a root into a relative-path →
//!   [`FileMeta`](presync_digest::FileMeta) map (plus total size), applying
//!   the exclusion filter.
//! - [`find_orphans`] diffs two inventories on metadata, yielding the source
//!   paths that have no exact counterpart at destination.
//! - [`find_candidates`] narrows the destination to files whose
//!   `(extension, size)` key appears among the orphans, so only plausible
//!   matches are ever hashed.
//! - [`index_files`] digests a path list in parallel into a [`DigestIndex`].
//!
//! Inventories are built once per run and never mutated; indexes are built
//! after orphans and candidates are known and are read-only from then on.

mod diff;
mod index;
mod inventory;

pub use diff::{find_candidates, find_orphans};
pub use index::{index_files, parallelism, DigestIndex, ScanError, INDEX_ERROR_TOLERANCE};
pub use inventory::{inventory, inventory_dirs};
