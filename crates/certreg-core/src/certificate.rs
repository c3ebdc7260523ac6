//! Certificate records and verification results.
//!
//! A certificate is created once by issuance. Afterwards only `revoked`
//! changes, from `false` to `true`, unless a colliding issuance under the
//! overwrite policy replaces the whole record.

use serde::{Deserialize, Serialize};

use crate::types::{CertificateId, Identity};

/// A stored certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// The derived identifier (store key).
    pub id: CertificateId,

    /// The identity that issued this certificate.
    pub issuer: Identity,

    /// Free-text certificate name, e.g. "Degree in Software Development".
    pub certificate_name: String,

    /// Free-text recipient name.
    pub recipient_name: String,

    /// Issuance time (Unix seconds).
    pub issued_at: i64,

    /// Set by the issuer's revocation.
    pub revoked: bool,
}

/// Lifecycle position of an existing certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateStatus {
    /// Issued and not revoked.
    Issued,
    /// Revoked by its issuer. Terminal.
    Revoked,
}

impl Certificate {
    /// Create a freshly issued, unrevoked certificate.
    pub fn new(
        id: CertificateId,
        issuer: Identity,
        certificate_name: impl Into<String>,
        recipient_name: impl Into<String>,
        issued_at: i64,
    ) -> Self {
        Self {
            id,
            issuer,
            certificate_name: certificate_name.into(),
            recipient_name: recipient_name.into(),
            issued_at,
            revoked: false,
        }
    }

    /// A record with a sentinel issuer is treated as absent.
    pub fn exists(&self) -> bool {
        !self.issuer.is_zero()
    }

    /// Valid iff not revoked. Issuer authorization is not consulted.
    pub fn is_valid(&self) -> bool {
        !self.revoked
    }

    pub fn status(&self) -> CertificateStatus {
        if self.revoked {
            CertificateStatus::Revoked
        } else {
            CertificateStatus::Issued
        }
    }

    /// The revoked form of this certificate. All other fields are preserved.
    pub fn as_revoked(&self) -> Self {
        Self {
            revoked: true,
            ..self.clone()
        }
    }

    /// Project into the result of a verification query.
    pub fn verification(&self) -> Verification {
        Verification {
            id: self.id,
            issuer: self.issuer,
            certificate_name: self.certificate_name.clone(),
            recipient_name: self.recipient_name.clone(),
            issued_at: self.issued_at,
            valid: self.is_valid(),
        }
    }
}

/// The result of verifying a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub id: CertificateId,
    pub issuer: Identity,
    pub certificate_name: String,
    pub recipient_name: String,
    pub issued_at: i64,
    /// `true` iff the certificate has not been revoked.
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Certificate {
        Certificate::new(
            CertificateId::from_bytes([1; 32]),
            Identity::from_bytes([2; 32]),
            "Degree in Software Development",
            "Jane Doe",
            1_700_000_000,
        )
    }

    #[test]
    fn test_new_certificate_is_valid() {
        let cert = sample();
        assert!(cert.exists());
        assert!(cert.is_valid());
        assert_eq!(cert.status(), CertificateStatus::Issued);
    }

    #[test]
    fn test_revoked_keeps_fields() {
        let cert = sample();
        let revoked = cert.as_revoked();
        assert_eq!(revoked.status(), CertificateStatus::Revoked);
        assert!(!revoked.verification().valid);
        assert_eq!(revoked.certificate_name, cert.certificate_name);
        assert_eq!(revoked.recipient_name, cert.recipient_name);
        assert_eq!(revoked.issuer, cert.issuer);
        assert_eq!(revoked.issued_at, cert.issued_at);
    }

    #[test]
    fn test_sentinel_issuer_means_absent() {
        let mut cert = sample();
        cert.issuer = Identity::ZERO;
        assert!(!cert.exists());
    }

    #[test]
    fn test_verification_json_shape() {
        let v = sample().verification();
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["recipient_name"], "Jane Doe");
        assert_eq!(json["valid"], true);
    }
}
