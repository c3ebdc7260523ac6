//! Registry notifications.
//!
//! Exactly one event is appended per successful mutating operation. Events
//! are ordered by `seq` and never rewritten.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{CertificateId, Identity};

/// A notification emitted by a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegistryEvent {
    IssuerAuthorized {
        issuer: Identity,
    },
    IssuerDeauthorized {
        issuer: Identity,
    },
    CertificateIssued {
        id: CertificateId,
        issuer: Identity,
        recipient_name: String,
    },
    CertificateRevoked {
        id: CertificateId,
        issuer: Identity,
    },
}

impl RegistryEvent {
    /// Short stable name, used as the stored event kind.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::IssuerAuthorized { .. } => "IssuerAuthorized",
            RegistryEvent::IssuerDeauthorized { .. } => "IssuerDeauthorized",
            RegistryEvent::CertificateIssued { .. } => "CertificateIssued",
            RegistryEvent::CertificateRevoked { .. } => "CertificateRevoked",
        }
    }

    /// The certificate this event concerns, if any.
    pub fn certificate_id(&self) -> Option<CertificateId> {
        match self {
            RegistryEvent::CertificateIssued { id, .. }
            | RegistryEvent::CertificateRevoked { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

/// An event as recorded in the append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1 with no gaps.
    pub seq: u64,
    /// When the mutation was committed (Unix seconds).
    pub recorded_at: i64,
    pub event: RegistryEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cbor_roundtrip_issued() {
        let event = RegistryEvent::CertificateIssued {
            id: CertificateId::from_bytes([9; 32]),
            issuer: Identity::from_bytes([3; 32]),
            recipient_name: "Jane Doe".into(),
        };
        let bytes = event.to_cbor().unwrap();
        assert_eq!(RegistryEvent::from_cbor(&bytes).unwrap(), event);
    }

    #[test]
    fn test_garbage_cbor_rejected() {
        assert!(matches!(
            RegistryEvent::from_cbor(&[0xff, 0x00]),
            Err(CoreError::DecodingError(_))
        ));
    }

    #[test]
    fn test_json_is_tagged() {
        let event = RegistryEvent::IssuerAuthorized {
            issuer: Identity::from_bytes([3; 32]),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "IssuerAuthorized");
        assert_eq!(event.certificate_id(), None);
    }
}
