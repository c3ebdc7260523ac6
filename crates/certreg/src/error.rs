//! Error types for the Registry.

use certreg_core::{CertificateId, CoreError, Identity};
use certreg_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Registry operations.
///
/// Every error leaves registry state unchanged.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The caller lacks the role or ownership the operation requires.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Deauthorization of an identity that is not currently an issuer.
    #[error("issuer not authorized: {0}")]
    NotAuthorized(Identity),

    /// Malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No certificate with this identifier exists.
    #[error("certificate not found: {0}")]
    NotFound(CertificateId),

    /// The certificate has already been revoked.
    #[error("certificate already revoked: {0}")]
    AlreadyRevoked(CertificateId),

    /// The derived identifier is already taken.
    #[error("certificate id collision: {0}")]
    IdCollision(CertificateId),

    /// The store has no administrator yet.
    #[error("registry not initialized")]
    NotInitialized,

    /// The store already belongs to a different administrator.
    #[error("registry already initialized with administrator {0}")]
    AlreadyInitialized(Identity),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Flat classification of [`RegistryError`] for callers that branch on the
/// kind of failure without inspecting payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    NotAuthorized,
    InvalidArgument,
    NotFound,
    AlreadyRevoked,
    IdCollision,
    NotInitialized,
    AlreadyInitialized,
    Config,
    Store,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Unauthorized(_) => ErrorKind::Unauthorized,
            RegistryError::NotAuthorized(_) => ErrorKind::NotAuthorized,
            RegistryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::AlreadyRevoked(_) => ErrorKind::AlreadyRevoked,
            RegistryError::IdCollision(_) => ErrorKind::IdCollision,
            RegistryError::NotInitialized => ErrorKind::NotInitialized,
            RegistryError::AlreadyInitialized(_) => ErrorKind::AlreadyInitialized,
            RegistryError::Config(_) => ErrorKind::Config,
            RegistryError::Store(_) => ErrorKind::Store,
        }
    }
}

impl From<CoreError> for RegistryError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidIdentity(_)
            | CoreError::NameTooLong { .. }
            | CoreError::NameContainsNul(_) => RegistryError::InvalidArgument(e.to_string()),
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                RegistryError::Unauthorized(e.to_string())
            }
            CoreError::EncodingError(_) | CoreError::DecodingError(_) => {
                RegistryError::Store(StoreError::Serialization(e.to_string()))
            }
        }
    }
}

/// Result type for Registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
