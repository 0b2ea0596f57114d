//! Tests for output drains fed with arbitrarily chunked input

use std::io::{self, Read};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hook_agent::process::{drain_stream, LineDrain, OutputDrain, RawDrain, TextDrain};

const SAMPLE: &str = "Kérdés: ünnep? ✓ 日本語のテキスト 🦀🦀\nsecond line\r\nthird – done\n";

/// Reader that returns at most a random number of bytes per call and
/// interrupts itself now and then.
struct ChunkingReader {
    data: Vec<u8>,
    pos: usize,
    rng: StdRng,
}

impl ChunkingReader {
    fn new(data: &[u8], seed: u64) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Read for ChunkingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.rng.random_range(0..10) == 0 {
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        let left = self.data.len() - self.pos;
        let n = self.rng.random_range(1..=7).min(left).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Reader that fails after yielding some bytes.
struct FailingReader {
    served: bool,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        self.served = true;
        buf[..5].copy_from_slice(b"hello");
        Ok(5)
    }
}

#[test]
fn test_text_drain_survives_any_chunking() {
    for seed in 0..64 {
        let captured = drain_stream(ChunkingReader::new(SAMPLE.as_bytes(), seed), TextDrain::new());
        assert!(captured.status.is_complete());
        assert_eq!(captured.status.bytes_read(), SAMPLE.len() as u64);
        assert_eq!(captured.drain.text(), SAMPLE, "seed {seed}");
    }
}

#[test]
fn test_line_drain_survives_any_chunking() {
    for seed in 0..32 {
        let captured = drain_stream(ChunkingReader::new(SAMPLE.as_bytes(), seed), LineDrain::new());
        assert_eq!(
            captured.drain.lines(),
            ["Kérdés: ünnep? ✓ 日本語のテキスト 🦀🦀", "second line", "third – done"],
            "seed {seed}"
        );
    }
}

#[test]
fn test_raw_drain_keeps_exact_bytes() {
    let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let captured = drain_stream(ChunkingReader::new(&data, 11), RawDrain::new());
    assert_eq!(captured.drain.bytes(), data.as_slice());
}

#[test]
fn test_invalid_utf8_is_replaced() {
    let mut drain = TextDrain::new();
    drain.consume(b"ok \xff\xfe end");
    drain.finish();
    assert_eq!(drain.text(), "ok \u{FFFD}\u{FFFD} end");
}

#[test]
fn test_truncated_sequence_flushed_on_finish() {
    let mut drain = TextDrain::new();
    // First two bytes of the three-byte encoding of '✓'.
    drain.consume(b"done \xe2\x9c");
    assert_eq!(drain.text(), "done ");
    drain.finish();
    assert_eq!(drain.text(), "done \u{FFFD}");
}

#[test]
fn test_read_fault_keeps_partial_output() {
    let captured = drain_stream(FailingReader { served: false }, RawDrain::new());
    assert!(!captured.status.is_complete());
    assert_eq!(captured.status.bytes_read(), 5);
    assert_eq!(captured.drain.bytes(), b"hello");
}

#[test]
fn test_empty_stream() {
    let captured = drain_stream(io::empty(), LineDrain::new());
    assert!(captured.status.is_complete());
    assert!(captured.drain.lines().is_empty());
    assert_eq!(captured.drain.joined(), "");
}
