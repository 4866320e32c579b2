//! JSON output structures for the fdxfer CLI

use fdxfer_types::{EndpointKind, TransferMethod, TransferReport};
use fdxfer_zerocopy::Endpoint;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete JSON output for a copy operation
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Per-method breakdown
    pub report: TransferReport,
    /// Method that moved the most bytes
    pub primary_method: Option<String>,
    /// Share of bytes moved without user-space buffering
    pub zerocopy_efficiency: f64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Average throughput in bytes per second
    pub throughput_bytes_per_sec: f64,
}

/// Operation metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// fdxfer version
    pub version: String,
    /// Operation type
    pub operation: String,
    /// Source path, `-` for stdin
    pub source_path: String,
    /// Destination path, `-` for stdout
    pub destination_path: String,
}

impl TransferResultJson {
    /// Build the output for a finished copy
    pub fn new(source: &str, destination: &str, report: TransferReport, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let throughput_bytes_per_sec = if secs > 0.0 {
            report.bytes as f64 / secs
        } else {
            0.0
        };

        Self {
            metadata: OperationMetadata::new("copy", source, destination),
            primary_method: report
                .primary_method()
                .map(|method: TransferMethod| method.as_str().to_string()),
            zerocopy_efficiency: report.zerocopy_efficiency(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            throughput_bytes_per_sec,
            report,
        }
    }
}

impl OperationMetadata {
    fn new(operation: &str, source: &str, destination: &str) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            operation: operation.to_string(),
            source_path: source.to_string(),
            destination_path: destination.to_string(),
        }
    }
}

/// JSON output for the `probe` command
#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointJson {
    /// Probed path, `-` for stdin
    pub path: String,
    /// Descriptor classification
    pub kind: EndpointKind,
    /// Opened with `O_APPEND`
    pub append: bool,
    /// Device number, when known
    pub device: Option<u64>,
    /// Inode number, when known
    pub inode: Option<u64>,
    /// Current file offset, for seekable descriptors
    pub offset: Option<u64>,
    /// Methods the engine would consider with this descriptor as source
    pub source_methods: Vec<String>,
}

impl EndpointJson {
    /// Describe a probed descriptor
    pub fn new(path: &str, endpoint: &Endpoint<'_>) -> Self {
        let identity = endpoint.identity();
        Self {
            path: path.to_string(),
            kind: endpoint.kind(),
            append: endpoint.is_append(),
            device: identity.map(|id| id.device),
            inode: identity.map(|id| id.inode),
            offset: endpoint.offset(),
            source_methods: source_methods(endpoint.kind())
                .iter()
                .map(|method| method.as_str().to_string())
                .collect(),
        }
    }
}

/// Accelerated methods that can read from a descriptor of `kind`
pub fn source_methods(kind: EndpointKind) -> &'static [TransferMethod] {
    match kind {
        EndpointKind::RegularFile => &[
            TransferMethod::RangeCopy,
            TransferMethod::SendFile,
            TransferMethod::Splice,
        ],
        EndpointKind::Pipe | EndpointKind::StreamSocket => &[TransferMethod::Splice],
        EndpointKind::Other => &[],
    }
}

/// Serialize any output structure as pretty-printed JSON
pub fn to_json_string<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
