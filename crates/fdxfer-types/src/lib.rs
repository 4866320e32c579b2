//! Core type system and error handling for fdxfer
//!
//! This crate provides the shared vocabulary of the fdxfer workspace:
//!
//! - **Error handling**: the caller-visible error taxonomy, which always keeps
//!   the number of bytes already moved
//! - **Core types**: endpoint kinds, transfer methods, selector outcomes and
//!   per-call reports
//! - **Configuration**: validated buffer and chunk sizes plus `TransferOptions`
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use fdxfer_types::{TransferMethod, TransferReport};
//!
//! let mut report = TransferReport::new();
//! report.record(TransferMethod::Splice, 4096);
//! assert_eq!(report.accelerated_bytes(), 4096);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod outcome;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::{BufferSize, ChunkSize, TransferOptions};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use outcome::Outcome;
pub use result::Result;
pub use types::*;
