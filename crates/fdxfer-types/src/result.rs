//! Result type alias for fdxfer operations

use crate::Error;

/// Result type alias for fdxfer operations
pub type Result<T> = std::result::Result<T, Error>;
