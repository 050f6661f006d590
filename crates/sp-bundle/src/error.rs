//! Error types for bundle operations.

use thiserror::Error;

/// Errors that can occur during bundle encode/decode.
#[derive(Error, Debug)]
pub enum BundleError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream is not the restricted Marshal graph this crate accepts.
    #[error("corrupt bundle: {0}")]
    Corrupt(String),

    /// Unsupported Marshal version header.
    #[error("unsupported marshal version {major}.{minor} (expected 4.8)")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// A code payload failed to inflate.
    #[error("corrupt code payload for section '{name}': {reason}")]
    BadPayload { name: String, reason: String },
}

impl BundleError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        BundleError::Corrupt(msg.into())
    }
}

/// Result type alias for bundle operations.
pub type Result<T> = std::result::Result<T, BundleError>;
