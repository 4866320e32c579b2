//! Configuration types for fdxfer
//!
//! Validated tunables shared by the transfer engine and the config loader.

/// Buffer size used by the read/write fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct BufferSize(usize);

impl BufferSize {
    /// Minimum buffer size (4KB)
    pub const MIN: usize = 4 * 1024;
    /// Maximum buffer size (64MB)
    pub const MAX: usize = 64 * 1024 * 1024;
    /// Default buffer size (32KB)
    pub const DEFAULT: usize = 32 * 1024;

    /// Create a new buffer size with validation
    pub fn new(size: usize) -> Result<Self, String> {
        if size < Self::MIN {
            Err(format!("Buffer size {} is below minimum {}", size, Self::MIN))
        } else if size > Self::MAX {
            Err(format!("Buffer size {} exceeds maximum {}", size, Self::MAX))
        } else if !size.is_power_of_two() {
            Err(format!("Buffer size {} must be a power of two", size))
        } else {
            Ok(Self(size))
        }
    }

    /// Get the buffer size value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for BufferSize {
    type Error = String;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<BufferSize> for usize {
    fn from(size: BufferSize) -> Self {
        size.get()
    }
}

/// Upper bound on the bytes requested from the kernel by one syscall
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct ChunkSize(usize);

impl ChunkSize {
    /// Minimum chunk size (4KB)
    pub const MIN: usize = 4 * 1024;
    /// Maximum chunk size (1GB)
    pub const MAX: usize = 1 << 30;
    /// Default `copy_file_range(2)` chunk (1GB)
    pub const RANGE_COPY_DEFAULT: Self = Self(1 << 30);
    /// Default `sendfile(2)` chunk (4MB)
    pub const SENDFILE_DEFAULT: Self = Self(4 << 20);
    /// Default `splice(2)` chunk (1MB)
    pub const SPLICE_DEFAULT: Self = Self(1 << 20);

    /// Create a new chunk size with validation
    pub fn new(size: usize) -> Result<Self, String> {
        if size < Self::MIN {
            Err(format!("Chunk size {} is below minimum {}", size, Self::MIN))
        } else if size > Self::MAX {
            Err(format!("Chunk size {} exceeds maximum {}", size, Self::MAX))
        } else {
            Ok(Self(size))
        }
    }

    /// Get the chunk size value
    pub fn get(self) -> usize {
        self.0
    }

    /// Bytes to request next, given an optional remaining limit
    pub fn clamp_to(self, remaining: Option<u64>) -> usize {
        match remaining {
            Some(left) if left < self.0 as u64 => left as usize,
            _ => self.0,
        }
    }
}

impl TryFrom<usize> for ChunkSize {
    type Error = String;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<ChunkSize> for usize {
    fn from(size: ChunkSize) -> Self {
        size.get()
    }
}

/// Runtime knobs for one transfer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferOptions {
    /// Fallback buffer size
    pub buffer_size: BufferSize,
    /// `copy_file_range(2)` chunk
    pub range_copy_chunk: ChunkSize,
    /// `sendfile(2)` chunk
    pub sendfile_chunk: ChunkSize,
    /// `splice(2)` chunk
    pub splice_chunk: ChunkSize,
    /// Try `copy_file_range(2)` between regular files
    pub enable_range_copy: bool,
    /// Try `sendfile(2)` from regular files
    pub enable_sendfile: bool,
    /// Try `splice(2)` through pipes
    pub enable_splice: bool,
    /// Memoize pairings the kernel refused
    pub remember_unsupported: bool,
}

impl TransferOptions {
    /// Options with every accelerated method turned off
    pub fn fallback_only() -> Self {
        Self {
            enable_range_copy: false,
            enable_sendfile: false,
            enable_splice: false,
            ..Self::default()
        }
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            buffer_size: BufferSize::default(),
            range_copy_chunk: ChunkSize::RANGE_COPY_DEFAULT,
            sendfile_chunk: ChunkSize::SENDFILE_DEFAULT,
            splice_chunk: ChunkSize::SPLICE_DEFAULT,
            enable_range_copy: true,
            enable_sendfile: true,
            enable_splice: true,
            remember_unsupported: true,
        }
    }
}
