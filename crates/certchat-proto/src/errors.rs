//! Protocol error types

use thiserror::Error;

/// Result alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from encoding or decoding certchat records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A required field is absent or empty
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Input exceeds the maximum accepted size
    #[error("input too large: {size} bytes (max {max})")]
    TooLarge {
        /// Input size in bytes
        size: usize,
        /// Maximum accepted size
        max: usize,
    },

    /// JSON could not be parsed into the expected shape
    #[error("malformed json: {0}")]
    Json(String),

    /// CBOR encoding failed
    #[error("cbor encoding failed: {0}")]
    CborEncode(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
