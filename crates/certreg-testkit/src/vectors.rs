//! Golden test vectors for certificate identifier derivation.
//!
//! Each vector pins both the canonical CBOR input and the resulting
//! identifier, so an implementation can tell an encoding mismatch from a
//! hashing mismatch.

use certreg_core::{
    derive_certificate_id, fingerprint_input, CertificateId, IdDerivation, Identity,
    IssuanceInput,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Raw issuer identity bytes.
    pub issuer: [u8; 32],
    pub issued_at: i64,
    pub certificate_name: &'static str,
    pub recipient_name: &'static str,
    pub nonce: u64,
    pub mode: IdDerivation,
    /// Expected canonical fingerprint input (hex).
    pub expected_input: &'static str,
    /// Expected certificate id (hex).
    pub expected_id: &'static str,
}

impl GoldenVector {
    pub fn input(&self) -> IssuanceInput<'static> {
        IssuanceInput {
            issued_at: self.issued_at,
            issuer: Identity::from_bytes(self.issuer),
            certificate_name: self.certificate_name,
            recipient_name: self.recipient_name,
            nonce: self.nonce,
        }
    }

    /// Hex of the canonical input this implementation produces.
    pub fn computed_input(&self) -> String {
        fingerprint_input(&self.input(), self.mode)
            .map(hex::encode)
            .unwrap_or_default()
    }

    /// Hex of the id this implementation derives.
    pub fn computed_id(&self) -> String {
        derive_certificate_id(&self.input(), self.mode)
            .map(|id: CertificateId| id.to_hex())
            .unwrap_or_default()
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "plain degree",
            issuer: [0x11; 32],
            issued_at: 1_700_000_000,
            certificate_name: "BSc Computer Science",
            recipient_name: "Jane Doe",
            nonce: 0,
            mode: IdDerivation::Plain,
            expected_input: "a46669737375657258201111111111111111111111111111111111111111111111111111111111111111696973737565645f61741a6553f1006e726563697069656e745f6e616d65684a616e6520446f657063657274696669636174655f6e616d657442536320436f6d707574657220536369656e6365",
            expected_id: "a97fb3e5591735bc62f17924c96bded2c549807052232a3b89b796c0d35a9770",
        },
        GoldenVector {
            name: "sequenced first issuance",
            issuer: [0x11; 32],
            issued_at: 1_700_000_000,
            certificate_name: "BSc Computer Science",
            recipient_name: "Jane Doe",
            nonce: 0,
            mode: IdDerivation::Sequenced,
            expected_input: "a5656e6f6e6365006669737375657258201111111111111111111111111111111111111111111111111111111111111111696973737565645f61741a6553f1006e726563697069656e745f6e616d65684a616e6520446f657063657274696669636174655f6e616d657442536320436f6d707574657220536369656e6365",
            expected_id: "fbbee48ce418e34c0446653b480d8535f6b87bd421583d8ec96b80ac04c21c6d",
        },
        GoldenVector {
            name: "sequenced second issuance",
            issuer: [0x11; 32],
            issued_at: 1_700_000_000,
            certificate_name: "BSc Computer Science",
            recipient_name: "Jane Doe",
            nonce: 1,
            mode: IdDerivation::Sequenced,
            expected_input: "a5656e6f6e6365016669737375657258201111111111111111111111111111111111111111111111111111111111111111696973737565645f61741a6553f1006e726563697069656e745f6e616d65684a616e6520446f657063657274696669636174655f6e616d657442536320436f6d707574657220536369656e6365",
            expected_id: "2bac6491f46e1aea3b9f43b11918ab0a0cd4174f78e5862feaa3b24aaaa8116a",
        },
        GoldenVector {
            name: "empty names at epoch",
            issuer: [0x01; 32],
            issued_at: 0,
            certificate_name: "",
            recipient_name: "",
            nonce: 0,
            mode: IdDerivation::Plain,
            expected_input: "a46669737375657258200101010101010101010101010101010101010101010101010101010101010101696973737565645f6174006e726563697069656e745f6e616d65607063657274696669636174655f6e616d6560",
            expected_id: "cf8c086cd92568ee5b92d07be0210fae06c545e4af05ebbeb227d249023c8d0e",
        },
        GoldenVector {
            name: "unicode names before epoch",
            issuer: [0xfe; 32],
            issued_at: -1,
            certificate_name: "Diplôme",
            recipient_name: "Zoë",
            nonce: 300,
            mode: IdDerivation::Sequenced,
            expected_input: "a5656e6f6e636519012c666973737565725820fefefefefefefefefefefefefefefefefefefefefefefefefefefefefefefefe696973737565645f6174206e726563697069656e745f6e616d65645a6fc3ab7063657274696669636174655f6e616d65684469706cc3b46d65",
            expected_id: "170c48b6c4f649be3be8ba3407b8e9d0510d68be091c7b7d7fc201c2115f0c77",
        },
    ]
}

/// Check every vector against this implementation.
///
/// Returns `(name, matches, computed id hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let id = v.computed_id();
            let matches = v.computed_input() == v.expected_input && id == v.expected_id;
            (v.name.to_string(), matches, id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_canonical_inputs_match() {
        for v in all_vectors() {
            assert_eq!(
                v.computed_input(),
                v.expected_input,
                "vector '{}' encoded differently",
                v.name
            );
        }
    }

    #[test]
    fn test_ids_match() {
        for v in all_vectors() {
            assert_eq!(v.computed_id(), v.expected_id, "vector '{}'", v.name);
        }
    }

    #[test]
    fn test_vectors_are_distinct() {
        let ids: HashSet<_> = all_vectors().iter().map(|v| v.expected_id).collect();
        assert_eq!(ids.len(), all_vectors().len());
    }

    #[test]
    fn test_verify_all_vectors_reports_success() {
        for (name, matches, hex) in verify_all_vectors() {
            assert!(matches, "vector '{}' produced {}", name, hex);
        }
    }
}
