//! Byte-count limits
//!
//! [`Limited`] is the caller-facing reader wrapper; [`Remaining`] is the
//! counter threaded through the selectors and the fallback loop.

use fdxfer_types::ChunkSize;
use std::io::{self, Read};

/// Bytes still allowed to move; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining(Option<u64>);

impl Remaining {
    /// Create a counter from an optional limit
    pub fn new(limit: Option<u64>) -> Self {
        Self(limit)
    }

    /// Counter without a limit
    pub fn unlimited() -> Self {
        Self(None)
    }

    /// Bytes left, or `None` when unlimited
    pub fn get(self) -> Option<u64> {
        self.0
    }

    /// Whether no more bytes may move
    pub fn is_exhausted(self) -> bool {
        self.0 == Some(0)
    }

    /// Record `n` bytes as moved
    pub fn consume(&mut self, n: u64) {
        if let Some(left) = self.0.as_mut() {
            *left = left.saturating_sub(n);
        }
    }

    /// Size of the next syscall request
    pub fn chunk(self, chunk: ChunkSize) -> usize {
        chunk.clamp_to(self.0)
    }

    /// Usable prefix length of a buffer of `len` bytes
    pub fn cap(self, len: usize) -> usize {
        match self.0 {
            Some(left) if left < len as u64 => left as usize,
            _ => len,
        }
    }
}

/// Reader adapter that yields at most a fixed number of bytes
///
/// Passing it to [`crate::Copier::transfer_limited`] keeps the acceleration
/// of the inner descriptor while honoring the limit. The remaining count is
/// decreased by exactly the bytes moved, also when the transfer fails.
#[derive(Debug)]
pub struct Limited<R> {
    inner: R,
    remaining: u64,
}

impl<R> Limited<R> {
    /// Wrap `inner`, allowing at most `limit` bytes
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    /// Bytes that may still be read
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Replace the remaining count
    pub fn set_limit(&mut self, limit: u64) {
        self.remaining = limit;
    }

    /// Get a reference to the wrapped reader
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Get a mutable reference to the wrapped reader
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwrap the reader
    pub fn into_inner(self) -> R {
        self.inner
    }

    pub(crate) fn consume(&mut self, n: u64) {
        self.remaining = self.remaining.saturating_sub(n);
    }
}

impl<R: Read> Read for Limited<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let len = Remaining::new(Some(self.remaining)).cap(buf.len());
        let n = self.inner.read(&mut buf[..len])?;
        self.consume(n as u64);
        Ok(n)
    }
}
