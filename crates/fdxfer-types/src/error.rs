//! Error types and handling for fdxfer
//!
//! Only three conditions ever reach a caller: an invalid endpoint, an I/O
//! error before any byte moved, and an I/O error after some bytes moved.
//! "Not applicable" and "unsupported pairing" are internal to the dispatcher.

use crate::TransferMethod;
use std::io;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - operation may be retried by the caller
    Medium,
    /// High severity - operation should be aborted
    High,
}

/// Main error type for fdxfer operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An endpoint was not an open descriptor; no I/O was attempted
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument
        message: String,
    },

    /// I/O failed before any byte was moved
    #[error("{method} failed: {source}")]
    Io {
        /// Method that hit the error
        method: TransferMethod,
        /// Underlying operating system error
        #[source]
        source: io::Error,
    },

    /// I/O failed after some bytes were already moved
    #[error("{method} failed after {written} bytes: {source}")]
    PartialTransfer {
        /// Bytes moved by the whole call before the failure
        written: u64,
        /// Method that hit the error
        method: TransferMethod,
        /// Underlying operating system error
        #[source]
        source: io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid endpoint
    InvalidArgument,
    /// I/O errors, with or without partial progress
    Io,
    /// Configuration errors
    Config,
    /// Other errors
    Other,
}

impl Error {
    /// Build the right I/O variant for an error hit after `written` bytes
    pub fn transfer(written: u64, method: TransferMethod, source: io::Error) -> Self {
        if written == 0 {
            Self::Io { method, source }
        } else {
            Self::PartialTransfer {
                written,
                method,
                source,
            }
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Io { .. } | Self::PartialTransfer { .. } => ErrorKind::Io,
            Self::Config { .. } => ErrorKind::Config,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidArgument { .. } | Self::Config { .. } => ErrorSeverity::High,
            Self::Io { .. } | Self::PartialTransfer { .. } => ErrorSeverity::Medium,
            Self::Other { .. } => ErrorSeverity::Low,
        }
    }

    /// Bytes moved before the error; never lost on failure
    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::PartialTransfer { written, .. } => *written,
            _ => 0,
        }
    }

    /// Method that failed, for I/O errors
    pub fn method(&self) -> Option<TransferMethod> {
        match self {
            Self::Io { method, .. } | Self::PartialTransfer { method, .. } => Some(*method),
            _ => None,
        }
    }

    /// Underlying operating system error, if any
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::Io { source, .. } | Self::PartialTransfer { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check if retrying the remainder could succeed
    pub fn is_recoverable(&self) -> bool {
        match self.io_error() {
            Some(err) => matches!(
                err.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            None => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io { source, .. } | Error::PartialTransfer { source, .. } => source,
            Error::InvalidArgument { message } => io::Error::new(io::ErrorKind::InvalidInput, message),
            other => io::Error::other(other.to_string()),
        }
    }
}
