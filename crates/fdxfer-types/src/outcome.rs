//! Result of a single transfer strategy attempt

use std::io;

/// What a selector did with a transfer request
///
/// `Completed` and `Failed` are "handled": the selector owns the final result
/// and the dispatcher stops. `NotApplicable` and `Partial` hand the remainder
/// to the next strategy.
#[derive(Debug)]
pub enum Outcome {
    /// The strategy does not apply; nothing was moved
    NotApplicable,
    /// Moved some bytes, then hit a condition the strategy cannot handle
    Partial(u64),
    /// Finished successfully; zero is a valid count
    Completed(u64),
    /// Failed after moving the given number of bytes
    Failed(u64, io::Error),
}

impl Outcome {
    /// Bytes moved by the attempt
    pub fn bytes(&self) -> u64 {
        match self {
            Self::NotApplicable => 0,
            Self::Partial(n) | Self::Completed(n) | Self::Failed(n, _) => *n,
        }
    }

    /// Whether the attempt owns the final result
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(..))
    }

    /// Map "stopped early" conditions to the right variant for `written` bytes
    pub fn unsupported_after(written: u64) -> Self {
        if written == 0 {
            Self::NotApplicable
        } else {
            Self::Partial(written)
        }
    }
}
