//! Signed operation requests.
//!
//! A [`SignedRequest`] is an Ed25519 signature over
//! `REQUEST_DOMAIN || canonical_cbor({op, args.., signer, nonce})`. It
//! authorizes exactly one operation with exactly these arguments, once: the
//! registry accepts a signer's nonce only if it is greater than every nonce
//! it accepted from that signer before.

use ciborium::value::{Integer, Value};
use serde::{Deserialize, Serialize};

use crate::auth::Caller;
use crate::canonical::to_canonical_bytes;
use crate::crypto::{Keypair, Signature};
use crate::error::Result;
use crate::types::{CertificateId, Identity};

/// Domain separation prefix for request signatures.
pub const REQUEST_DOMAIN: &[u8] = b"certreg/request/v1";

/// A mutating registry operation and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    AuthorizeIssuer {
        issuer: Identity,
    },
    DeauthorizeIssuer {
        issuer: Identity,
    },
    IssueCertificate {
        certificate_name: String,
        recipient_name: String,
    },
    RevokeCertificate {
        id: CertificateId,
    },
}

impl Request {
    /// Stable operation name, also the `op` value in the signed encoding.
    pub fn name(&self) -> &'static str {
        match self {
            Request::AuthorizeIssuer { .. } => "authorize_issuer",
            Request::DeauthorizeIssuer { .. } => "deauthorize_issuer",
            Request::IssueCertificate { .. } => "issue_certificate",
            Request::RevokeCertificate { .. } => "revoke_certificate",
        }
    }

    /// The exact bytes `signer` signs to submit this request with `nonce`.
    pub fn signing_message(&self, signer: &Identity, nonce: u64) -> Result<Vec<u8>> {
        let mut entries = vec![
            entry("op", Value::Text(self.name().to_string())),
            entry("signer", Value::Bytes(signer.0.to_vec())),
            entry("nonce", Value::Integer(Integer::from(nonce))),
        ];
        match self {
            Request::AuthorizeIssuer { issuer } | Request::DeauthorizeIssuer { issuer } => {
                entries.push(entry("issuer", Value::Bytes(issuer.0.to_vec())));
            }
            Request::IssueCertificate {
                certificate_name,
                recipient_name,
            } => {
                entries.push(entry("certificate_name", Value::Text(certificate_name.clone())));
                entries.push(entry("recipient_name", Value::Text(recipient_name.clone())));
            }
            Request::RevokeCertificate { id } => {
                entries.push(entry("id", Value::Bytes(id.0.to_vec())));
            }
        }

        let encoded = to_canonical_bytes(&Value::Map(entries))?;
        let mut message = Vec::with_capacity(REQUEST_DOMAIN.len() + encoded.len());
        message.extend_from_slice(REQUEST_DOMAIN);
        message.extend_from_slice(&encoded);
        Ok(message)
    }
}

fn entry(key: &str, value: Value) -> (Value, Value) {
    (Value::Text(key.to_string()), value)
}

/// A request together with the signer's credential for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub signer: Identity,
    /// Must exceed every nonce previously accepted from `signer`.
    pub nonce: u64,
    pub request: Request,
    pub signature: Signature,
}

impl SignedRequest {
    /// Check the signature and return the authenticated caller.
    ///
    /// Replay protection is not checked here; it needs registry state.
    pub fn verify(&self) -> Result<Caller> {
        let message = self.request.signing_message(&self.signer, self.nonce)?;
        self.signer.verify(&message, &self.signature)?;
        Caller::trusted(self.signer)
    }
}

impl Keypair {
    /// Sign `request` for submission with `nonce`.
    pub fn sign_request(&self, request: Request, nonce: u64) -> Result<SignedRequest> {
        let signer = self.identity();
        let signature = self.sign(&request.signing_message(&signer, nonce)?);
        Ok(SignedRequest {
            signer,
            nonce,
            request,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn issuer() -> Identity {
        Identity::from_bytes([9; 32])
    }

    #[test]
    fn test_signed_request_verifies() {
        let kp = Keypair::from_seed(&[7; 32]);
        let signed = kp
            .sign_request(Request::AuthorizeIssuer { issuer: issuer() }, 1)
            .unwrap();
        assert_eq!(signed.verify().unwrap().identity(), kp.identity());
    }

    #[test]
    fn test_signature_bound_to_operation() {
        let kp = Keypair::from_seed(&[7; 32]);
        let mut signed = kp
            .sign_request(Request::AuthorizeIssuer { issuer: issuer() }, 1)
            .unwrap();
        signed.request = Request::DeauthorizeIssuer { issuer: issuer() };
        assert_eq!(signed.verify(), Err(CoreError::InvalidSignature));
    }

    #[test]
    fn test_signature_bound_to_arguments() {
        let kp = Keypair::from_seed(&[7; 32]);
        let mut signed = kp
            .sign_request(Request::AuthorizeIssuer { issuer: issuer() }, 1)
            .unwrap();
        signed.request = Request::AuthorizeIssuer {
            issuer: Identity::from_bytes([8; 32]),
        };
        assert_eq!(signed.verify(), Err(CoreError::InvalidSignature));
    }

    #[test]
    fn test_signature_bound_to_nonce_and_signer() {
        let kp = Keypair::from_seed(&[7; 32]);
        let other = Keypair::from_seed(&[8; 32]);
        let signed = kp
            .sign_request(Request::RevokeCertificate { id: CertificateId::from_bytes([1; 32]) }, 5)
            .unwrap();

        let bumped = SignedRequest { nonce: 6, ..signed.clone() };
        assert!(bumped.verify().is_err());

        let stolen = SignedRequest {
            signer: other.identity(),
            ..signed
        };
        assert!(stolen.verify().is_err());
    }

    #[test]
    fn test_raw_signature_rejected() {
        let kp = Keypair::from_seed(&[7; 32]);
        let request = Request::AuthorizeIssuer { issuer: issuer() };
        let raw = kp.sign(b"authorize issuer");
        let forged = SignedRequest {
            signer: kp.identity(),
            nonce: 1,
            request,
            signature: raw,
        };
        assert!(forged.verify().is_err());
    }

    #[test]
    fn test_name_fields_do_not_shift() {
        // "ab"+"c" and "a"+"bc" sign different messages.
        let signer = issuer();
        let a = Request::IssueCertificate {
            certificate_name: "ab".into(),
            recipient_name: "c".into(),
        };
        let b = Request::IssueCertificate {
            certificate_name: "a".into(),
            recipient_name: "bc".into(),
        };
        assert_ne!(
            a.signing_message(&signer, 1).unwrap(),
            b.signing_message(&signer, 1).unwrap()
        );
    }
}
