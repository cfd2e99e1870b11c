//! Primary channel abstraction and a process-backed implementation.
//!
//! The primary channel is the client library that actually talks to the
//! messaging service. histfetch only needs two operations from it:
//! * [`PrimaryChannel::send`]: hand over a command tagged with a request id.
//! * [`PrimaryChannel::receive`]: wait up to a bound for the next response
//!   or unsolicited event.

use std::future::Future;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use histfetch_types::{Function, Object, decode_response, encode_request};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;

// ─── Response ─────────────────────────────────────────────────────────────────

/// One item delivered by the primary channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// Id of the originating request, or `0` for an unsolicited event.
    pub request_id: u64,
    pub object:     Object,
}

// ─── PrimaryChannel ───────────────────────────────────────────────────────────

/// The contract histfetch relies on from the primary channel.
pub trait PrimaryChannel {
    /// Queue `function` under `request_id`. Never blocks.
    fn send(&mut self, request_id: u64, function: Function);

    /// Wait at most `max_wait` for the next item. `Duration::ZERO` polls
    /// without waiting.
    fn receive(&mut self, max_wait: Duration) -> impl Future<Output = Option<Response>>;
}

// ─── ProcessChannel ───────────────────────────────────────────────────────────

/// Speaks JSON lines with a bridge process on its stdin/stdout.
///
/// Requests are written as `{"@type": ..., "@extra": id}`; every line the
/// bridge prints is decoded as an [`Object`] whose `@extra` is the request id.
/// A writer task and a reader task move lines between the pipes and two
/// queues, so `send` never blocks and `receive` is cancel-safe.
pub struct ProcessChannel {
    _child:        Child,
    outgoing:      mpsc::UnboundedSender<String>,
    incoming:      mpsc::UnboundedReceiver<Response>,
    closed_logged: bool,
}

impl ProcessChannel {
    /// Spawn the bridge described by `argv` (program followed by arguments).
    pub fn spawn(argv: &[String]) -> io::Result<Self> {
        let (program, args) = argv.split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty bridge command"))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "bridge stdin unavailable"))?;
        let stdout = child.stdout.take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "bridge stdout unavailable"))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx)   = mpsc::unbounded_channel();
        tokio::spawn(write_lines(stdin, out_rx));
        tokio::spawn(read_lines(stdout, in_tx));

        log::info!("[channel] Bridge started: {program}");
        Ok(Self { _child: child, outgoing: out_tx, incoming: in_rx, closed_logged: false })
    }
}

impl PrimaryChannel for ProcessChannel {
    fn send(&mut self, request_id: u64, function: Function) {
        let line = match encode_request(request_id, &function) {
            Ok(l)  => l,
            Err(e) => {
                log::warn!("[channel] Cannot encode {} (#{request_id}): {e}", function.kind());
                return;
            }
        };
        if self.outgoing.send(line).is_err() {
            log::warn!("[channel] Writer gone, {} (#{request_id}) not sent", function.kind());
        }
    }

    async fn receive(&mut self, max_wait: Duration) -> Option<Response> {
        if max_wait.is_zero() {
            return self.incoming.try_recv().ok();
        }
        match tokio::time::timeout(max_wait, self.incoming.recv()).await {
            Ok(Some(r)) => Some(r),
            Ok(None) => {
                if !self.closed_logged {
                    log::warn!("[channel] Bridge output closed");
                    self.closed_logged = true;
                }
                tokio::time::sleep(max_wait).await;
                None
            }
            Err(_elapsed) => None,
        }
    }
}

async fn write_lines(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_line(&mut stdin, &line).await {
            log::warn!("[channel] Write to bridge failed: {e}");
            break;
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

async fn read_lines(stdout: ChildStdout, tx: mpsc::UnboundedSender<Response>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let response = match decode_response(&line) {
                    Ok((request_id, object)) => Response { request_id, object },
                    // the request still completes, so its continuation is not stranded
                    Err(e) if e.request_id != 0 => {
                        log::warn!("[channel] Malformed response delivered as unknown: {e}");
                        Response { request_id: e.request_id, object: Object::Unknown }
                    }
                    Err(e) => {
                        log::warn!("[channel] Malformed payload skipped: {e}");
                        continue;
                    }
                };
                if tx.send(response).is_err() {
                    break;
                }
            }
            Ok(None) => {
                log::info!("[channel] Bridge reached end of output");
                break;
            }
            Err(e) => {
                log::warn!("[channel] Read from bridge failed: {e}");
                break;
            }
        }
    }
}
