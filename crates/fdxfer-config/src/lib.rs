//! Configuration management for fdxfer
//!
//! Tunables for the transfer engine and the CLI's logging, layered from
//! built-in defaults, YAML/TOML/JSON files and environment variables.
//!
//! # Features
//!
//! - **Multiple formats**: YAML, TOML and JSON configuration files
//! - **Validation**: buffer and chunk sizes are range-checked on load
//! - **Environment overrides**: e.g. `FDXFER__TRANSFER__BUFFER_SIZE=65536`
//! - **Defaults**: every field has a working default
//!
//! # Examples
//!
//! ```rust
//! use fdxfer_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("fdxfer.yaml")
//!     .add_env_prefix("FDXFER")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Buffer size: {}", config.transfer.buffer_size.get());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use fdxfer_types::{BufferSize, ChunkSize, TransferOptions};
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for fdxfer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transfer engine configuration
    pub transfer: TransferConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Transfer engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Buffer size for the read/write fallback
    pub buffer_size: BufferSize,
    /// Largest request passed to `copy_file_range(2)`
    pub range_copy_chunk: ChunkSize,
    /// Largest request passed to `sendfile(2)`
    pub sendfile_chunk: ChunkSize,
    /// Largest request passed to `splice(2)`
    pub splice_chunk: ChunkSize,
    /// Use `copy_file_range(2)` between regular files
    pub enable_range_copy: bool,
    /// Use `sendfile(2)` from regular files
    pub enable_sendfile: bool,
    /// Use `splice(2)` for pipes and sockets
    pub enable_splice: bool,
    /// Skip pairings the kernel already refused in this process
    pub remember_unsupported: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        let options = TransferOptions::default();
        Self {
            buffer_size: options.buffer_size,
            range_copy_chunk: options.range_copy_chunk,
            sendfile_chunk: options.sendfile_chunk,
            splice_chunk: options.splice_chunk,
            enable_range_copy: options.enable_range_copy,
            enable_sendfile: options.enable_sendfile,
            enable_splice: options.enable_splice,
            remember_unsupported: options.remember_unsupported,
        }
    }
}

impl TransferConfig {
    /// Engine options described by this configuration
    pub fn to_options(&self) -> TransferOptions {
        TransferOptions {
            buffer_size: self.buffer_size,
            range_copy_chunk: self.range_copy_chunk,
            sendfile_chunk: self.sendfile_chunk,
            splice_chunk: self.splice_chunk,
            enable_range_copy: self.enable_range_copy,
            enable_sendfile: self.enable_sendfile,
            enable_splice: self.enable_splice,
            remember_unsupported: self.remember_unsupported,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}
