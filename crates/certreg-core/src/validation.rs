//! Input validation for registry operations.
//!
//! Validation is pure: it checks arguments only, never registry state.

use crate::error::{CoreError, Result};
use crate::types::Identity;

/// Default upper bound for certificate and recipient names, in bytes.
pub const DEFAULT_MAX_NAME_BYTES: usize = 1024;

/// Check a free-text name field.
///
/// Empty names are accepted. Names longer than `max_bytes` or containing a
/// NUL byte are rejected.
pub fn validate_name(field: &'static str, value: &str, max_bytes: usize) -> Result<()> {
    if value.len() > max_bytes {
        return Err(CoreError::NameTooLong {
            field,
            len: value.len(),
            max: max_bytes,
        });
    }
    if value.contains('\0') {
        return Err(CoreError::NameContainsNul(field));
    }
    Ok(())
}

/// An issuer identity must not be the sentinel.
pub fn validate_issuer_identity(identity: &Identity) -> Result<()> {
    if identity.is_zero() {
        return Err(CoreError::InvalidIdentity(
            "sentinel identity cannot be an issuer".into(),
        ));
    }
    Ok(())
}
