//! Byte-position progress tracking for deployment runs.
//!
//! Dump files are consumed through a [`ProgressReader`] so progress bars can
//! follow the on-disk read position even when the statement pipeline sits
//! behind a decompressor.

use std::io::Read;

/// A reader wrapper that reports cumulative bytes read to a callback.
///
/// Wrap the raw file, then hand the wrapper to the decompressor: the
/// callback then tracks compressed (on-disk) position, which is what a
/// file-sized progress bar wants.
pub struct ProgressReader<R: Read> {
    reader: R,
    callback: Box<dyn Fn(u64)>,
    bytes_read: u64,
}

impl<R: Read> ProgressReader<R> {
    pub fn new<F>(reader: R, callback: F) -> Self
    where
        F: Fn(u64) + 'static,
    {
        Self {
            reader,
            callback: Box::new(callback),
            bytes_read: 0,
        }
    }

    /// Total bytes pulled through this reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.bytes_read += n as u64;
        (self.callback)(self.bytes_read);
        Ok(n)
    }
}
