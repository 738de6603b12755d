//! The agent's read-dispatch-write loop.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Write};
use std::path::Path;

use presync_digest::{compute_digest, FileDigest, FileMeta};
use presync_fs::FileSystem;
use thiserror::Error;
use tracing::warn;

use crate::messages::{
    ActionResult, DigestProgress, DigestRequest, DigestResponse, ErrorReply, Message,
    PerformRequest, PerformResponse, WalkRequest, WalkResponse,
};

/// Fatal agent failure. Request-level problems are answered over the wire
/// instead; only a broken transport ends the loop with an error.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Reading or writing the envelope stream failed.
    #[error("agent stream error: {0}")]
    Io(#[from] io::Error),

    /// An outgoing envelope could not be encoded.
    #[error("agent couldn't encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Serves requests from `reader`, writing replies to `writer`, until a
/// `quit` envelope or end of stream.
///
/// The loop is single threaded: one envelope is read, dispatched, and
/// answered (with progress envelopes interleaved before the terminal
/// response) before the next is read. Malformed or unexpected envelopes are
/// answered with an `error` reply and the loop continues.
pub fn run_agent<F, R, W>(fs: &F, reader: R, mut writer: W) -> Result<(), AgentError>
where
    F: FileSystem + ?Sized,
    R: BufRead,
    W: Write,
{
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<Message>(line) {
            Ok(message) => message,
            Err(err) => {
                send_error(&mut writer, &format!("invalid message: {err}"))?;
                continue;
            }
        };

        match message {
            Message::Quit => return Ok(()),
            Message::WalkRequest(req) => handle_walk(fs, &mut writer, &req)?,
            Message::DigestRequest(req) => handle_digest(fs, &mut writer, &req)?,
            Message::PerformRequest(req) => handle_perform(fs, &mut writer, &req)?,
            other => {
                send_error(
                    &mut writer,
                    &format!("unexpected message type: {}", other.kind()),
                )?;
            }
        }
    }
    Ok(())
}

fn handle_walk<F, W>(fs: &F, writer: &mut W, req: &WalkRequest) -> Result<(), AgentError>
where
    F: FileSystem + ?Sized,
    W: Write,
{
    let excluded: HashSet<String> = req.excluded_names.iter().cloned().collect();
    let entries = match fs.walk(Path::new(&req.dir_path), &excluded) {
        Ok(entries) => entries,
        Err(err) => return send_error(writer, &format!("walk failed: {err}")),
    };

    let mut files: HashMap<String, FileMeta> = HashMap::new();
    let mut dirs: HashMap<String, i64> = HashMap::new();
    let mut total_size = 0i64;
    for entry in entries {
        if entry.is_dir {
            dirs.insert(entry.rel_path, entry.mtime);
        } else {
            total_size += entry.size;
            files.insert(
                entry.rel_path,
                FileMeta {
                    size: entry.size,
                    modified_timestamp: entry.mtime,
                },
            );
        }
    }

    send(
        writer,
        &Message::WalkResponse(WalkResponse {
            files,
            dirs: Some(dirs),
            total_size,
        }),
    )
}

fn handle_digest<F, W>(fs: &F, writer: &mut W, req: &DigestRequest) -> Result<(), AgentError>
where
    F: FileSystem + ?Sized,
    W: Write,
{
    let total = req.files.len() as u64;
    let base = Path::new(&req.base_path);
    let mut digests: HashMap<String, FileDigest> = HashMap::with_capacity(req.files.len());

    for (i, rel_path) in req.files.iter().enumerate() {
        let path = base.join(rel_path);
        match compute_digest(fs, &path) {
            Ok(digest) => {
                digests.insert(rel_path.clone(), digest);
            }
            Err(err) => warn!("couldn't hash \"{}\" (skipping): {err}", path.display()),
        }
        send(
            writer,
            &Message::DigestProgress(DigestProgress {
                files_hashed: i as u64 + 1,
                total,
            }),
        )?;
    }

    send(writer, &Message::DigestResponse(DigestResponse { digests }))
}

fn handle_perform<F, W>(fs: &F, writer: &mut W, req: &PerformRequest) -> Result<(), AgentError>
where
    F: FileSystem + ?Sized,
    W: Write,
{
    let mut results = Vec::with_capacity(req.actions.len());
    for (index, spec) in req.actions.iter().enumerate() {
        if req.dry_run {
            results.push(ActionResult {
                index,
                success: true,
                error: None,
            });
            continue;
        }
        match spec.to_action().perform(fs) {
            Ok(()) => results.push(ActionResult {
                index,
                success: true,
                error: None,
            }),
            Err(err) => results.push(ActionResult {
                index,
                success: false,
                error: Some(err.to_string()),
            }),
        }
    }

    send(writer, &Message::PerformResponse(PerformResponse { results }))
}

fn send<W: Write>(writer: &mut W, message: &Message) -> Result<(), AgentError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn send_error<W: Write>(writer: &mut W, message: &str) -> Result<(), AgentError> {
    send(
        writer,
        &Message::Error(ErrorReply {
            message: message.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ActionSpec;
    use presync_fs::LocalFs;
    use std::fs;

    fn serve(input: &str) -> Vec<Message> {
        let mut output = Vec::new();
        run_agent(&LocalFs, input.as_bytes(), &mut output).expect("agent");
        String::from_utf8(output)
            .expect("utf-8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("reply parses"))
            .collect()
    }

    #[test]
    fn quit_ends_the_loop_silently() {
        let replies = serve("{\"type\":\"quit\"}\n");
        assert!(replies.is_empty());
    }

    #[test]
    fn malformed_line_gets_error_reply_and_loop_continues() {
        let replies = serve("this is not json\n{\"type\":\"quit\"}\n");
        assert_eq!(replies.len(), 1);
        assert!(matches!(replies[0], Message::Error(_)));
    }

    #[test]
    fn unknown_type_gets_error_reply() {
        let replies = serve("{\"type\":\"teleport_request\",\"payload\":{}}\n{\"type\":\"quit\"}\n");
        assert_eq!(replies.len(), 1);
        let Message::Error(ref reply) = replies[0] else {
            panic!("expected error reply");
        };
        assert!(reply.message.contains("invalid message"));
    }

    #[test]
    fn walk_request_returns_inventory_with_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("sub")).expect("dir");
        fs::write(temp.path().join("sub/f.txt"), b"hello").expect("write");

        let request = serde_json::to_string(&Message::WalkRequest(WalkRequest {
            dir_path: temp.path().to_string_lossy().into_owned(),
            excluded_names: vec![],
            progress_interval_ms: 0,
        }))
        .expect("serialize");
        let replies = serve(&format!("{request}\n{{\"type\":\"quit\"}}\n"));

        assert_eq!(replies.len(), 1);
        let Message::WalkResponse(ref resp) = replies[0] else {
            panic!("expected walk response");
        };
        assert_eq!(resp.total_size, 5);
        assert_eq!(resp.files["sub/f.txt"].size, 5);
        assert!(resp.dirs.as_ref().expect("dirs").contains_key("sub"));
    }

    #[test]
    fn digest_request_streams_progress_then_response() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a.bin"), vec![3u8; 64]).expect("write");
        fs::write(temp.path().join("b.bin"), vec![4u8; 64]).expect("write");

        let request = serde_json::to_string(&Message::DigestRequest(DigestRequest {
            base_path: temp.path().to_string_lossy().into_owned(),
            files: vec!["a.bin".into(), "b.bin".into()],
        }))
        .expect("serialize");
        let replies = serve(&format!("{request}\n{{\"type\":\"quit\"}}\n"));

        assert_eq!(replies.len(), 3);
        assert!(matches!(
            replies[0],
            Message::DigestProgress(DigestProgress { files_hashed: 1, total: 2 })
        ));
        assert!(matches!(
            replies[1],
            Message::DigestProgress(DigestProgress { files_hashed: 2, total: 2 })
        ));
        let Message::DigestResponse(ref resp) = replies[2] else {
            panic!("expected digest response");
        };
        assert_eq!(resp.digests.len(), 2);
    }

    #[test]
    fn perform_request_executes_and_reports_per_action() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("old"), b"x").expect("write");
        fs::write(temp.path().join("occupied"), b"y").expect("write");

        let request = serde_json::to_string(&Message::PerformRequest(PerformRequest {
            actions: vec![
                ActionSpec::Move {
                    base_path: temp.path().to_string_lossy().into_owned(),
                    from_rel_path: "old".into(),
                    to_rel_path: "new".into(),
                },
                ActionSpec::Move {
                    base_path: temp.path().to_string_lossy().into_owned(),
                    from_rel_path: "new".into(),
                    to_rel_path: "occupied".into(),
                },
            ],
            dry_run: false,
        }))
        .expect("serialize");
        let replies = serve(&format!("{request}\n{{\"type\":\"quit\"}}\n"));

        assert_eq!(replies.len(), 1);
        let Message::PerformResponse(ref resp) = replies[0] else {
            panic!("expected perform response");
        };
        assert!(resp.results[0].success);
        assert!(!resp.results[1].success);
        assert!(temp.path().join("new").exists());
        assert_eq!(fs::read(temp.path().join("occupied")).expect("read"), b"y");
    }

    #[test]
    fn dry_run_perform_touches_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("old"), b"x").expect("write");

        let request = serde_json::to_string(&Message::PerformRequest(PerformRequest {
            actions: vec![ActionSpec::Move {
                base_path: temp.path().to_string_lossy().into_owned(),
                from_rel_path: "old".into(),
                to_rel_path: "new".into(),
            }],
            dry_run: true,
        }))
        .expect("serialize");
        let replies = serve(&format!("{request}\n{{\"type\":\"quit\"}}\n"));

        let Message::PerformResponse(ref resp) = replies[0] else {
            panic!("expected perform response");
        };
        assert!(resp.results[0].success);
        assert!(temp.path().join("old").exists());
        assert!(!temp.path().join("new").exists());
    }
}
