//! Streaming statement extraction for dumps too large to hold in memory.
//!
//! Reads fixed-size chunks, decodes them incrementally, and scans the carry
//! buffer for statement boundaries. Memory use is bounded by the longest
//! single statement plus one chunk, independent of file size.

use std::io::Read;

use crate::classifier::{self, SkipStats};
use crate::parser::find_statement_end;
use crate::parser::decode::Utf8Decoder;

/// Read granularity for streaming extraction.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Pull-based statement stream over any reader.
///
/// [`next_statement`](StatementStream::next_statement) yields every non-empty
/// statement, trimmed and without its terminator; empty segments (stray `;`)
/// are dropped and counted, and a trailing statement that lost its `;` is
/// still yielded at end of input.
/// [`next_executable`](StatementStream::next_executable) additionally applies
/// the dump-artifact classifier and tallies what it skipped.
pub struct StatementStream<R: Read> {
    reader: R,
    decoder: Utf8Decoder,
    buf: String,
    chunk: Vec<u8>,
    eof: bool,
    skip_stats: SkipStats,
    bytes_read: u64,
}

impl<R: Read> StatementStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            decoder: Utf8Decoder::new(),
            buf: String::new(),
            chunk: vec![0u8; chunk_size.max(1)],
            eof: false,
            skip_stats: SkipStats::default(),
            bytes_read: 0,
        }
    }

    /// Next statement in source order, or `None` at end of input.
    pub fn next_statement(&mut self) -> std::io::Result<Option<String>> {
        loop {
            while let Some(end) = find_statement_end(&self.buf) {
                let stmt = self.buf[..end].trim().to_string();
                self.buf.drain(..=end);
                if !stmt.is_empty() {
                    return Ok(Some(stmt));
                }
                self.skip_stats.record(classifier::SkipReason::Empty);
            }

            if self.eof {
                let tail = self.buf.trim().to_string();
                self.buf.clear();
                if tail.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(tail));
            }

            self.fill()?;
        }
    }

    /// Next statement that should reach the database. Skipped artifacts are
    /// recorded in [`skip_stats`](StatementStream::skip_stats).
    pub fn next_executable(&mut self) -> std::io::Result<Option<String>> {
        while let Some(stmt) = self.next_statement()? {
            match classifier::classify(&stmt) {
                None => return Ok(Some(stmt)),
                Some(reason) => self.skip_stats.record(reason),
            }
        }
        Ok(None)
    }

    pub fn skip_stats(&self) -> SkipStats {
        self.skip_stats
    }

    /// Bytes consumed from the underlying reader so far (after any
    /// decompression the caller wrapped around it).
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn fill(&mut self) -> std::io::Result<()> {
        let n = self.reader.read(&mut self.chunk)?;
        if n == 0 {
            self.eof = true;
            self.decoder.finish(&mut self.buf);
        } else {
            self.bytes_read += n as u64;
            self.decoder.decode(&self.chunk[..n], &mut self.buf);
        }
        Ok(())
    }
}
