//! Certificate identifier derivation.
//!
//! The identifier is `BLAKE3(ID_DOMAIN || canonical_cbor(input))` where the
//! input map holds the issuance timestamp, issuer, certificate name,
//! recipient name and, in [`IdDerivation::Sequenced`] mode, the issuer's
//! issuance counter.
//!
//! The input is encoded with [`to_canonical_bytes`].
//!
//! **This encoding is frozen.** Changing it changes every derived identifier.

use ciborium::value::{Integer, Value};
use serde::{Deserialize, Serialize};

use crate::canonical::to_canonical_bytes;
use crate::error::Result;
use crate::types::{CertificateId, Identity};

/// Domain separation prefix for certificate identifiers.
pub const ID_DOMAIN: &[u8] = b"certreg/certificate-id/v1";

mod keys {
    pub const ISSUED_AT: &str = "issued_at";
    pub const ISSUER: &str = "issuer";
    pub const CERTIFICATE_NAME: &str = "certificate_name";
    pub const RECIPIENT_NAME: &str = "recipient_name";
    pub const NONCE: &str = "nonce";
}

/// Which inputs feed the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdDerivation {
    /// Timestamp, issuer and both names only. Two issuances by the same
    /// issuer in the same second with the same names derive the same id.
    Plain,
    /// Also mixes in the issuer's monotonically increasing issuance counter.
    #[default]
    Sequenced,
}

/// The inputs to identifier derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceInput<'a> {
    pub issued_at: i64,
    pub issuer: Identity,
    pub certificate_name: &'a str,
    pub recipient_name: &'a str,
    /// The issuer's issuance counter before this issuance.
    pub nonce: u64,
}

/// Canonical CBOR bytes of the fingerprint input.
pub fn fingerprint_input(input: &IssuanceInput<'_>, mode: IdDerivation) -> Result<Vec<u8>> {
    let mut entries = vec![
        (
            Value::Text(keys::ISSUED_AT.to_string()),
            Value::Integer(Integer::from(input.issued_at)),
        ),
        (
            Value::Text(keys::ISSUER.to_string()),
            Value::Bytes(input.issuer.0.to_vec()),
        ),
        (
            Value::Text(keys::CERTIFICATE_NAME.to_string()),
            Value::Text(input.certificate_name.to_string()),
        ),
        (
            Value::Text(keys::RECIPIENT_NAME.to_string()),
            Value::Text(input.recipient_name.to_string()),
        ),
    ];

    if mode == IdDerivation::Sequenced {
        entries.push((
            Value::Text(keys::NONCE.to_string()),
            Value::Integer(Integer::from(input.nonce)),
        ));
    }

    to_canonical_bytes(&Value::Map(entries))
}

/// Derive the certificate identifier for an issuance.
pub fn derive_certificate_id(input: &IssuanceInput<'_>, mode: IdDerivation) -> Result<CertificateId> {
    let encoded = fingerprint_input(input, mode)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(ID_DOMAIN);
    hasher.update(&encoded);
    Ok(CertificateId(*hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(name: &'a str, recipient: &'a str, nonce: u64) -> IssuanceInput<'a> {
        IssuanceInput {
            issued_at: 1_700_000_000,
            issuer: Identity::from_bytes([0x11; 32]),
            certificate_name: name,
            recipient_name: recipient,
            nonce,
        }
    }

    #[test]
    fn test_derivation_deterministic() {
        let a = derive_certificate_id(&input("Degree", "Jane Doe", 0), IdDerivation::Sequenced)
            .unwrap();
        let b = derive_certificate_id(&input("Degree", "Jane Doe", 0), IdDerivation::Sequenced)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nonce_only_matters_when_sequenced() {
        let plain0 = derive_certificate_id(&input("Degree", "Jane", 0), IdDerivation::Plain).unwrap();
        let plain1 = derive_certificate_id(&input("Degree", "Jane", 1), IdDerivation::Plain).unwrap();
        assert_eq!(plain0, plain1);

        let seq0 = derive_certificate_id(&input("Degree", "Jane", 0), IdDerivation::Sequenced).unwrap();
        let seq1 = derive_certificate_id(&input("Degree", "Jane", 1), IdDerivation::Sequenced).unwrap();
        assert_ne!(seq0, seq1);
        assert_ne!(plain0, seq0);
    }

    #[test]
    fn test_issuer_and_timestamp_change_id() {
        let base = input("Degree", "Jane", 0);
        let id = derive_certificate_id(&base, IdDerivation::Plain).unwrap();

        let other_issuer = IssuanceInput {
            issuer: Identity::from_bytes([0x22; 32]),
            ..base
        };
        let later = IssuanceInput {
            issued_at: base.issued_at + 1,
            ..base
        };
        assert_ne!(id, derive_certificate_id(&other_issuer, IdDerivation::Plain).unwrap());
        assert_ne!(id, derive_certificate_id(&later, IdDerivation::Plain).unwrap());
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        // "ab"+"c" and "a"+"bc" must not collide.
        let a = derive_certificate_id(&input("ab", "c", 0), IdDerivation::Plain).unwrap();
        let b = derive_certificate_id(&input("a", "bc", 0), IdDerivation::Plain).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_map_header_and_key_order() {
        let bytes = fingerprint_input(&input("D", "J", 0), IdDerivation::Plain).unwrap();
        // map(4)
        assert_eq!(bytes[0], 0xa4);
        // Shortest key sorts first: text(6) "issuer"
        assert_eq!(bytes[1], 0x66);
        assert_eq!(&bytes[2..8], b"issuer");

        let seq = fingerprint_input(&input("D", "J", 0), IdDerivation::Sequenced).unwrap();
        assert_eq!(seq[0], 0xa5);
        // "nonce" (5 bytes) now sorts before "issuer"
        assert_eq!(seq[1], 0x65);
        assert_eq!(&seq[2..7], b"nonce");
    }

    #[test]
    fn test_negative_timestamp_encodes() {
        let mut i = input("D", "J", 0);
        i.issued_at = -1;
        let bytes = fingerprint_input(&i, IdDerivation::Plain).unwrap();
        assert!(!bytes.is_empty());
    }
}
