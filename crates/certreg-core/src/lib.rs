//! # certreg core
//!
//! Pure primitives for the certificate registry: identities, certificate
//! records, identifier derivation and registry events.
//!
//! This crate contains no I/O, no storage, no clock. Everything here is a
//! function of its inputs.
//!
//! ## Key Types
//!
//! - [`Identity`] - Opaque 32-byte caller/issuer identity (Ed25519 public key)
//! - [`CertificateId`] - 256-bit fingerprint identifying a certificate
//! - [`Certificate`] - The stored record, immutable except for `revoked`
//! - [`Verification`] - What a verification query returns
//! - [`RegistryEvent`] - Notifications emitted on successful mutations
//! - [`Caller`] - Authenticated identity context passed into every operation
//! - [`SignedRequest`] - A caller credential bound to one operation and nonce
//!
//! ## Identifier Derivation
//!
//! Certificate identifiers are BLAKE3 fingerprints over a canonical CBOR
//! encoding of the issuance inputs. See [`fingerprint`].

pub mod auth;
pub mod canonical;
pub mod certificate;
pub mod crypto;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod request;
pub mod types;
pub mod validation;

pub use auth::Caller;
pub use certificate::{Certificate, CertificateStatus, Verification};
pub use crypto::{Keypair, Signature};
pub use error::{CoreError, Result};
pub use event::{EventRecord, RegistryEvent};
pub use fingerprint::{derive_certificate_id, fingerprint_input, IdDerivation, IssuanceInput};
pub use request::{Request, SignedRequest};
pub use types::{CertificateId, Identity};
pub use validation::{validate_issuer_identity, validate_name, DEFAULT_MAX_NAME_BYTES};
