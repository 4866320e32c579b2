//! Core data types for fdxfer
//!
//! Endpoint classification, transfer methods and per-call transfer reports.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bytes moved by a transfer
pub type ByteCount = u64;

/// Kind of an open descriptor, as far as transfer acceleration is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EndpointKind {
    /// Regular, seekable file
    RegularFile,
    /// Anonymous pipe or FIFO
    Pipe,
    /// Connected `SOCK_STREAM` socket in the unix, inet or inet6 domain
    StreamSocket,
    /// Anything else (terminals, character devices, datagram sockets, ...)
    Other,
}

impl EndpointKind {
    /// Whether the descriptor carries a meaningful file offset
    pub fn is_seekable(self) -> bool {
        matches!(self, Self::RegularFile)
    }

    /// Short lowercase name used in logs and CLI output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegularFile => "regular-file",
            Self::Pipe => "pipe",
            Self::StreamSocket => "stream-socket",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy that moved (or tried to move) the bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransferMethod {
    /// `copy_file_range(2)` between two regular files
    RangeCopy,
    /// `sendfile(2)` from a regular file
    SendFile,
    /// `splice(2)` through a pipe
    Splice,
    /// Buffered read/write loop
    Fallback,
}

impl TransferMethod {
    /// All methods in dispatch priority order
    pub const ALL: [TransferMethod; 4] = [
        Self::RangeCopy,
        Self::SendFile,
        Self::Splice,
        Self::Fallback,
    ];

    /// Whether the method avoids user-space buffering
    pub fn is_accelerated(self) -> bool {
        !matches!(self, Self::Fallback)
    }

    /// Name of the underlying system call(s)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RangeCopy => "copy_file_range",
            Self::SendFile => "sendfile",
            Self::Splice => "splice",
            Self::Fallback => "read/write",
        }
    }
}

impl fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the file behind a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileIdentity {
    /// Device the file lives on (`st_dev`)
    pub device: u64,
    /// Inode number (`st_ino`)
    pub inode: u64,
}

/// Breakdown of a finished transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransferReport {
    /// Total bytes moved
    pub bytes: ByteCount,
    /// Bytes moved by `copy_file_range(2)`
    pub range_copy_bytes: ByteCount,
    /// Bytes moved by `sendfile(2)`
    pub sendfile_bytes: ByteCount,
    /// Bytes moved by `splice(2)`
    pub splice_bytes: ByteCount,
    /// Bytes moved by the buffered loop
    pub fallback_bytes: ByteCount,
    /// Whether the buffered loop ran at all
    pub fallback_used: bool,
}

impl TransferReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Account `bytes` moved by `method`
    pub fn record(&mut self, method: TransferMethod, bytes: ByteCount) {
        self.bytes += bytes;
        match method {
            TransferMethod::RangeCopy => self.range_copy_bytes += bytes,
            TransferMethod::SendFile => self.sendfile_bytes += bytes,
            TransferMethod::Splice => self.splice_bytes += bytes,
            TransferMethod::Fallback => {
                self.fallback_bytes += bytes;
                self.fallback_used = true;
            }
        }
    }

    /// Bytes moved by a given method
    pub fn bytes_for(&self, method: TransferMethod) -> ByteCount {
        match method {
            TransferMethod::RangeCopy => self.range_copy_bytes,
            TransferMethod::SendFile => self.sendfile_bytes,
            TransferMethod::Splice => self.splice_bytes,
            TransferMethod::Fallback => self.fallback_bytes,
        }
    }

    /// Bytes moved without user-space buffering
    pub fn accelerated_bytes(&self) -> ByteCount {
        self.range_copy_bytes + self.sendfile_bytes + self.splice_bytes
    }

    /// Share of bytes moved by an accelerated method
    pub fn zerocopy_efficiency(&self) -> f64 {
        if self.bytes > 0 {
            self.accelerated_bytes() as f64 / self.bytes as f64
        } else {
            0.0
        }
    }

    /// Method that moved the most bytes, if anything moved
    pub fn primary_method(&self) -> Option<TransferMethod> {
        TransferMethod::ALL
            .into_iter()
            .filter(|&method| self.bytes_for(method) > 0)
            .max_by_key(|&method| self.bytes_for(method))
    }
}
