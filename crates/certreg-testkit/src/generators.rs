//! Proptest generators for property-based testing.

use proptest::prelude::*;

use certreg_core::{
    derive_certificate_id, fingerprint_input, CertificateId, IdDerivation, Identity,
    IssuanceInput, Keypair,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random identity, possibly the sentinel.
pub fn identity() -> impl Strategy<Value = Identity> {
    prop_oneof![
        1 => Just(Identity::ZERO),
        9 => any::<[u8; 32]>().prop_map(Identity::from_bytes),
    ]
}

/// Generate a random identity other than the sentinel.
pub fn nonzero_identity() -> impl Strategy<Value = Identity> {
    any::<[u8; 32]>()
        .prop_filter("sentinel identity", |b| b.iter().any(|&x| x != 0))
        .prop_map(Identity::from_bytes)
}

/// Generate a random CertificateId.
pub fn certificate_id() -> impl Strategy<Value = CertificateId> {
    any::<[u8; 32]>().prop_map(CertificateId::from_bytes)
}

/// Generate a name: printable text with no control characters, possibly empty.
pub fn name() -> impl Strategy<Value = String> {
    "\\PC{0,48}".prop_map(String::from)
}

/// Generate a timestamp on either side of the Unix epoch.
pub fn timestamp() -> impl Strategy<Value = i64> {
    -1_000_000_000i64..=4_000_000_000i64
}

pub fn id_derivation() -> impl Strategy<Value = IdDerivation> {
    prop_oneof![Just(IdDerivation::Plain), Just(IdDerivation::Sequenced)]
}

/// Parameters for one issuance.
#[derive(Debug, Clone)]
pub struct IssueParams {
    pub issuer: Identity,
    pub issued_at: i64,
    pub certificate_name: String,
    pub recipient_name: String,
    pub nonce: u64,
    pub mode: IdDerivation,
}

impl IssueParams {
    pub fn input(&self) -> IssuanceInput<'_> {
        IssuanceInput {
            issued_at: self.issued_at,
            issuer: self.issuer,
            certificate_name: &self.certificate_name,
            recipient_name: &self.recipient_name,
            nonce: self.nonce,
        }
    }

    pub fn encoded(&self) -> Vec<u8> {
        fingerprint_input(&self.input(), self.mode).expect("fingerprint input must encode")
    }

    pub fn derive_id(&self) -> CertificateId {
        derive_certificate_id(&self.input(), self.mode).expect("fingerprint input must encode")
    }
}

impl Arbitrary for IssueParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            nonzero_identity(),
            timestamp(),
            name(),
            name(),
            0u64..=10_000u64, // nonce
            id_derivation(),
        )
            .prop_map(|(issuer, issued_at, certificate_name, recipient_name, nonce, mode)| {
                IssueParams {
                    issuer,
                    issued_at,
                    certificate_name,
                    recipient_name,
                    nonce,
                    mode,
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_certificate_id_deterministic(params: IssueParams) {
            prop_assert_eq!(params.derive_id(), params.derive_id());
            prop_assert_eq!(params.encoded(), params.encoded());
        }

        #[test]
        fn test_recipient_changes_id(
            params: IssueParams,
            other in name(),
        ) {
            prop_assume!(other != params.recipient_name);

            let changed = IssueParams { recipient_name: other, ..params.clone() };
            prop_assert_ne!(params.derive_id(), changed.derive_id());
        }

        #[test]
        fn test_nonce_changes_id_only_when_sequenced(
            params: IssueParams,
            nonce in any::<u64>(),
        ) {
            prop_assume!(nonce != params.nonce);

            let changed = IssueParams { nonce, ..params.clone() };
            match params.mode {
                IdDerivation::Plain => prop_assert_eq!(params.derive_id(), changed.derive_id()),
                IdDerivation::Sequenced => prop_assert_ne!(params.derive_id(), changed.derive_id()),
            }
        }

        #[test]
        fn test_name_boundary_is_unambiguous(
            params: IssueParams,
            split in 0usize..=4,
        ) {
            // Moving bytes between the two names must change the encoding.
            let joined = format!("{}{}", params.certificate_name, params.recipient_name);
            prop_assume!(joined.is_char_boundary(split.min(joined.len())));
            let (a, b) = joined.split_at(split.min(joined.len()));
            prop_assume!(a != params.certificate_name);

            let moved = IssueParams {
                certificate_name: a.to_string(),
                recipient_name: b.to_string(),
                ..params.clone()
            };
            prop_assert_ne!(params.encoded(), moved.encoded());
        }
    }
}
