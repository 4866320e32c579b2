//! OS-accelerated bulk data transfer for fdxfer
//!
//! This crate moves bytes between two open descriptors using the kernel's
//! zero-copy primitives where the endpoint types allow it, and a buffered
//! read/write loop everywhere else. Results are indistinguishable from the
//! plain loop: same bytes, same final offsets, same error semantics.
//!
//! - **Endpoint probe**: classifies descriptors as regular files, pipes,
//!   stream sockets or other
//! - **Selectors**: `copy_file_range(2)`, `sendfile(2)` and `splice(2)`
//!   strategies, injectable per [`Copier`]
//! - **Limits**: [`Limited`] readers keep acceleration while capping the count
//! - **Fallback**: [`fallback::copy_buffered`] for any `Read`/`Write` pair
//!
//! # Platform Support
//!
//! - **Linux**: all three selectors
//! - **Other Unix**: probe and fallback only
//!
//! # Examples
//!
//! ```rust,no_run
//! use fdxfer_zerocopy::Copier;
//! use std::fs::File;
//!
//! let mut src = File::open("source.bin")?;
//! let mut dst = File::create("dest.bin")?;
//! let report = Copier::new().transfer_report(&mut dst, &mut src, None)?;
//! println!("{} bytes, {:.0}% zero-copy", report.bytes, report.zerocopy_efficiency() * 100.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod endpoint;
pub mod engine;
pub mod fallback;
pub mod limit;
pub mod methods;

#[cfg(target_os = "linux")]
pub mod linux;

// Re-export main types
pub use cache::UnsupportedCache;
pub use endpoint::Endpoint;
pub use engine::{copy, copy_limited, copy_n, Copier};
pub use limit::{Limited, Remaining};
pub use methods::{Request, Selector, Selectors};
