#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `presync_agent` implements the duplex protocol spoken when one side of a
//! reconciliation run lives on a peer host running this same tool. Each
//! message is a newline-terminated JSON envelope `{"type": ..., "payload":
//! ...}`; the transport is any byte stream, in practice the stdin/stdout of
//! an agent process spawned over ssh.
//!
//! The [`run_agent`] loop serves `walk_request`, `digest_request`,
//! `perform_request` and `quit`, answering anything it cannot understand
//! with an `error` envelope and carrying on. [`AgentClient`] drives the
//! other end, consuming interleaved progress envelopes until each request's
//! terminal response arrives.
//!
//! Payload structs tolerate unknown fields, so peers a version apart can
//! still interoperate.

mod client;
mod messages;
mod serve;

pub use client::{AgentClient, ClientError};
pub use messages::{
    ActionResult, ActionSpec, DigestProgress, DigestRequest, DigestResponse, ErrorReply, Message,
    PerformRequest, PerformResponse, SpecError, WalkProgress, WalkRequest, WalkResponse,
};
pub use serve::{run_agent, AgentError};
