//! Error types for the registry core.

use thiserror::Error;

/// Errors raised by pure core computations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("{field} exceeds {max} bytes (got {len})")]
    NameTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{0} contains a NUL byte")]
    NameContainsNul(&'static str),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
