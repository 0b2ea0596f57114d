//! Output drains: background capture of a child process's output stream.
//!
//! A drain is attached to exactly one process. It runs on a dedicated thread,
//! pulls from the stream until end-of-stream and hands each chunk to a capture
//! strategy ([`RawDrain`], [`TextDrain`] or [`LineDrain`]). The pipe is always
//! emptied, so the child never blocks on a full OS pipe buffer.
//!
//! Capture is best-effort. A read error or a panicking capture strategy ends
//! capture and is reported as [`DrainStatus::Faulted`]; it is never surfaced as
//! an [`AgentError`] and never replaces the child's exit status, which stays
//! the authoritative result.
//!
//! Completion is signalled through a one-shot channel. The sending half is
//! consumed when it fires, so a drain can signal at most once.

use std::io::{self, ErrorKind, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::action::panic_message;
use crate::core::AgentError;

const CHUNK_SIZE: usize = 8 * 1024;

/// Capture strategy fed by the drain loop.
pub trait OutputDrain: Send + 'static {
    /// Consume one chunk of bytes read from the stream.
    fn consume(&mut self, chunk: &[u8]);

    /// Called once after end-of-stream or a read fault. Not called again if
    /// the strategy panicked.
    fn finish(&mut self) {}
}

/// I/O failure while capturing output.
#[derive(Debug, Error)]
#[error("output capture failed after {bytes_read} bytes: {source}")]
pub struct DrainFault {
    /// Bytes successfully read before the fault.
    pub bytes_read: u64,
    /// Underlying read error, or `ErrorKind::Other` for a panicking strategy.
    #[source]
    pub source: std::io::Error,
}

/// How the drain loop ended. Independent of the process exit status.
#[derive(Debug)]
pub enum DrainStatus {
    /// The stream reached end-of-stream and every byte was consumed.
    Complete {
        /// Total bytes read.
        bytes_read: u64,
    },
    /// A read error or a capture strategy panic ended capture early.
    Faulted(DrainFault),
}

impl DrainStatus {
    /// Whether all output was captured.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Bytes read before the loop ended.
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        match self {
            Self::Complete { bytes_read } => *bytes_read,
            Self::Faulted(fault) => fault.bytes_read,
        }
    }
}

/// Captured output together with the drain outcome.
#[derive(Debug)]
pub struct Captured<D> {
    /// The capture strategy, holding everything it consumed.
    pub drain: D,
    /// How capture ended.
    pub status: DrainStatus,
}

/// Run the read loop to completion on the current thread.
///
/// `Ok(0)` is end-of-stream. Interrupted reads are retried and never end the
/// loop early. If the capture strategy panics, the rest of the stream is read
/// and discarded so the writer is never blocked.
pub fn drain_stream<R: Read, D: OutputDrain>(mut reader: R, mut drain: D) -> Captured<D> {
    let mut bytes_read: u64 = 0;

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let status = read_into(&mut reader, &mut drain, &mut bytes_read);
        drain.finish();
        status
    }));

    let status = match outcome {
        Ok(status) => status,
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            let discarded = io::copy(&mut reader, &mut io::sink()).unwrap_or(0);
            warn!(
                reason = %reason,
                bytes_read = bytes_read,
                discarded = discarded,
                "Capture strategy panicked, discarding remaining output"
            );
            DrainStatus::Faulted(DrainFault {
                bytes_read,
                source: io::Error::other(format!("capture strategy panicked: {reason}")),
            })
        }
    };

    Captured { drain, status }
}

fn read_into<R: Read, D: OutputDrain>(
    reader: &mut R,
    drain: &mut D,
    bytes_read: &mut u64,
) -> DrainStatus {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return DrainStatus::Complete { bytes_read: *bytes_read },
            Ok(n) => {
                *bytes_read += n as u64;
                drain.consume(&buf[..n]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(source) => {
                return DrainStatus::Faulted(DrainFault {
                    bytes_read: *bytes_read,
                    source,
                });
            }
        }
    }
}

/// Sending half of the one-shot completion signal.
struct Completion<D> {
    tx: Sender<Captured<D>>,
}

impl<D> Completion<D> {
    fn fire(self, captured: Captured<D>) {
        // The waiter may already be gone (execution dropped without waiting).
        let _ = self.tx.send(captured);
    }
}

/// Receiving half held by the owner of a running drain.
pub struct DrainWaiter<D> {
    rx: Receiver<Captured<D>>,
    thread: Option<JoinHandle<()>>,
}

impl<D> std::fmt::Debug for DrainWaiter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainWaiter")
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl<D: OutputDrain> DrainWaiter<D> {
    /// Block until the drain has consumed the whole stream.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Interrupted` if the drain thread died without
    /// signalling.
    pub fn wait(mut self) -> Result<Captured<D>, AgentError> {
        let captured = self.rx.recv().map_err(|_| {
            AgentError::Interrupted("output drain ended without signalling completion".into())
        });
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        captured
    }
}

/// Start draining `reader` into `drain` on a dedicated thread.
///
/// # Errors
///
/// Returns the OS error if the drain thread cannot be spawned.
pub fn spawn_drain<R, D>(reader: R, drain: D, name: String) -> std::io::Result<DrainWaiter<D>>
where
    R: Read + Send + 'static,
    D: OutputDrain,
{
    let (tx, rx) = bounded(1);
    let completion = Completion { tx };

    let thread = thread::Builder::new().name(name).spawn(move || {
        let captured = drain_stream(reader, drain);
        match &captured.status {
            DrainStatus::Complete { bytes_read } => {
                debug!(bytes_read = *bytes_read, "Output drain reached end of stream");
            }
            DrainStatus::Faulted(fault) => {
                warn!(error = %fault, "Output drain stopped early");
            }
        }
        completion.fire(captured);
    })?;

    Ok(DrainWaiter {
        rx,
        thread: Some(thread),
    })
}

/// Accumulates every byte verbatim.
#[derive(Debug, Clone, Default)]
pub struct RawDrain {
    bytes: Vec<u8>,
}

impl RawDrain {
    /// Create an empty raw drain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode the whole buffer as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn string_data(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl OutputDrain for RawDrain {
    fn consume(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }
}

/// Decodes UTF-8 incrementally as chunks arrive.
///
/// A multi-byte character split across two reads is carried over and decoded
/// once its remaining bytes arrive. Invalid sequences become U+FFFD.
#[derive(Debug, Clone, Default)]
pub struct TextDrain {
    text: String,
    pending: Vec<u8>,
}

impl TextDrain {
    /// Create an empty text drain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text decoded so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Take ownership of the decoded text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

impl OutputDrain for TextDrain {
    fn consume(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let consumed = decode_utf8_prefix(&self.pending, &mut self.text);
        self.pending.drain(..consumed);
    }

    fn finish(&mut self) {
        if !self.pending.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}

/// Decode as much of `bytes` as possible into `out`, stopping before an
/// incomplete trailing sequence. Returns the number of bytes consumed.
fn decode_utf8_prefix(bytes: &[u8], out: &mut String) -> usize {
    let mut start = 0;
    loop {
        match std::str::from_utf8(&bytes[start..]) {
            Ok(valid) => {
                out.push_str(valid);
                return bytes.len();
            }
            Err(e) => {
                let valid_end = start + e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&bytes[start..valid_end]));
                match e.error_len() {
                    Some(invalid) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        start = valid_end + invalid;
                    }
                    None => return valid_end,
                }
            }
        }
    }
}

/// Retains output one line at a time.
///
/// `\n`, `\r\n` and a bare `\r` each end a line and are stripped, also when a
/// `\r\n` pair is split across two reads. A trailing line without a
/// terminator is kept when the stream ends.
#[derive(Debug, Clone, Default)]
pub struct LineDrain {
    lines: Vec<String>,
    partial: Vec<u8>,
    after_cr: bool,
}

impl LineDrain {
    /// Create an empty line drain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed lines in the order they were read.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines joined with `\n`.
    #[must_use]
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }

    fn push_line(&mut self, raw: Vec<u8>) {
        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        self.lines.push(line);
    }
}

impl OutputDrain for LineDrain {
    fn consume(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            // The \n of a \r\n pair; the line already ended at the \r.
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' => {
                    let line = std::mem::take(&mut self.partial);
                    self.push_line(line);
                }
                b'\r' => {
                    let line = std::mem::take(&mut self.partial);
                    self.push_line(line);
                    self.after_cr = true;
                }
                _ => self.partial.push(byte),
            }
        }
    }

    fn finish(&mut self) {
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            self.push_line(rest);
        }
    }
}
