//! Authenticated caller context.
//!
//! Every registry operation receives a [`Caller`]. Holding one means some
//! collaborator has already established which identity is invoking the
//! operation. Remote callers go through
//! [`SignedRequest::verify`](crate::SignedRequest::verify) instead, which
//! binds the credential to one request.

use crate::crypto::Keypair;
use crate::error::{CoreError, Result};
use crate::types::Identity;

/// An authenticated caller identity.
///
/// Cannot be constructed for [`Identity::ZERO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    identity: Identity,
}

impl Caller {
    /// Accept an identity the surrounding substrate has already authenticated.
    pub fn trusted(identity: Identity) -> Result<Self> {
        if identity.is_zero() {
            return Err(CoreError::InvalidIdentity(
                "sentinel identity cannot act as a caller".into(),
            ));
        }
        Ok(Self { identity })
    }

    /// The authenticated identity.
    pub fn identity(&self) -> Identity {
        self.identity
    }
}

impl Keypair {
    /// A caller context for this keypair's identity, for in-process callers
    /// that hold the key directly.
    pub fn caller(&self) -> Caller {
        Caller {
            identity: self.identity(),
        }
    }
}
