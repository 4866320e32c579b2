//! fdxfer test suite
//!
//! Integration tests and benchmarks for the fdxfer crates, plus the shared
//! fixtures they use: deterministic data, temp files, pipes, socket pairs,
//! pseudo-terminals and a selector wrapper that records what the engine did.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Common fixtures used across the integration tests and benchmarks.
pub mod test_utils;
