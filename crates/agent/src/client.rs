//! Request-driving side of the agent protocol.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use presync_digest::{FileDigest, FileMeta};
use thiserror::Error;

use crate::messages::{
    ActionResult, ActionSpec, DigestRequest, Message, PerformRequest, WalkRequest,
};

/// Client-side protocol failure. Unlike the agent, the client treats every
/// protocol problem as fatal to the remote operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport to the agent broke.
    #[error("agent connection error: {0}")]
    Io(#[from] io::Error),

    /// An envelope could not be encoded or decoded.
    #[error("agent protocol error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The agent reported a failure.
    #[error("remote agent error: {0}")]
    Remote(String),

    /// The agent sent an envelope that does not belong to the request in
    /// flight.
    #[error("unexpected message type during {context}: {kind}")]
    Unexpected {
        /// The request being driven.
        context: &'static str,
        /// The envelope type received.
        kind: &'static str,
    },

    /// The agent closed the stream mid-request.
    #[error("agent closed the connection during {context}")]
    Disconnected {
        /// The request being driven.
        context: &'static str,
    },
}

/// Drives an agent over a pair of byte streams.
///
/// Progress envelopes interleaved with a terminal response update the
/// caller's shared counter, so the same reporting loop serves local and
/// remote sides.
pub struct AgentClient<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> AgentClient<R, W> {
    /// Wraps the given streams.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Asks the agent to scan `dir_path`. Returns the file inventory,
    /// directory timestamps, and total size.
    pub fn walk(
        &mut self,
        dir_path: &str,
        excluded_names: &[String],
        counter: Option<&AtomicU64>,
    ) -> Result<(HashMap<String, FileMeta>, HashMap<String, i64>, i64), ClientError> {
        self.send(&Message::WalkRequest(WalkRequest {
            dir_path: dir_path.to_string(),
            excluded_names: excluded_names.to_vec(),
            progress_interval_ms: 0,
        }))?;

        loop {
            match self.recv("walk")? {
                Message::WalkProgress(progress) => {
                    if let Some(counter) = counter {
                        counter.store(progress.files_found, Ordering::Relaxed);
                    }
                }
                Message::WalkResponse(resp) => {
                    if let Some(counter) = counter {
                        counter.store(resp.files.len() as u64, Ordering::Relaxed);
                    }
                    return Ok((resp.files, resp.dirs.unwrap_or_default(), resp.total_size));
                }
                other => {
                    return Err(ClientError::Unexpected {
                        context: "walk",
                        kind: other.kind(),
                    })
                }
            }
        }
    }

    /// Asks the agent to hash `files` under `base_path`.
    pub fn digests(
        &mut self,
        base_path: &str,
        files: &[String],
        counter: Option<&AtomicU64>,
    ) -> Result<HashMap<String, FileDigest>, ClientError> {
        self.send(&Message::DigestRequest(DigestRequest {
            base_path: base_path.to_string(),
            files: files.to_vec(),
        }))?;

        loop {
            match self.recv("digest")? {
                Message::DigestProgress(progress) => {
                    if let Some(counter) = counter {
                        counter.store(progress.files_hashed, Ordering::Relaxed);
                    }
                }
                Message::DigestResponse(resp) => {
                    if let Some(counter) = counter {
                        counter.store(files.len() as u64, Ordering::Relaxed);
                    }
                    return Ok(resp.digests);
                }
                other => {
                    return Err(ClientError::Unexpected {
                        context: "digest",
                        kind: other.kind(),
                    })
                }
            }
        }
    }

    /// Asks the agent to execute `actions`, or to pretend to when `dry_run`.
    pub fn perform(
        &mut self,
        actions: Vec<ActionSpec>,
        dry_run: bool,
    ) -> Result<Vec<ActionResult>, ClientError> {
        self.send(&Message::PerformRequest(PerformRequest { actions, dry_run }))?;
        match self.recv("perform")? {
            Message::PerformResponse(resp) => Ok(resp.results),
            other => Err(ClientError::Unexpected {
                context: "perform",
                kind: other.kind(),
            }),
        }
    }

    /// Tells the agent to exit. Best effort; transport errors are ignored.
    pub fn quit(&mut self) {
        let _ = self.send(&Message::Quit);
    }

    fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn recv(&mut self, context: &'static str) -> Result<Message, ClientError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(ClientError::Disconnected { context });
        }
        let message: Message = serde_json::from_str(line.trim())?;
        if let Message::Error(reply) = message {
            return Err(ClientError::Remote(reply.message));
        }
        Ok(message)
    }
}
