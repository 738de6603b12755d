#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `presync_digest` defines the identity model for files being reconciled
//! and the fast fuzzy content digest used to match them.
//!
//! [`FileMeta`] is the metadata-level identity: two files at the same
//! relative path with equal size and modification timestamp are considered
//! already in sync. [`FileDigest`] is the content-level identity: extension,
//! size, and a CRC32 over a small fixed byte window. It is collision
//! resistant in practice for large, uncorrelated files (the intended domain
//! is media libraries) but is not a cryptographic hash.
//!
//! Hashing cost is constant regardless of file size: files up to
//! [`THRESHOLD_FILE_SIZE`] are hashed whole, anything larger contributes
//! only its head, middle, and tail windows.

mod entity;
mod fuzzy;

pub use entity::{FileDigest, FileExtAndSize, FileMeta};
pub use fuzzy::{compute_digest, file_ext, DigestError, THRESHOLD_FILE_SIZE};
