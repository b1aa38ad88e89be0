//! Error types for the core crate.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A state message could not be encoded or decoded.
    #[error("codec failure: {reason}")]
    Codec { reason: String },

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl Error {
    /// Create a codec error.
    pub fn codec(reason: impl Into<String>) -> Self {
        Self::Codec {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
