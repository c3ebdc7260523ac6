//! Store trait: the abstract interface for registry persistence.
//!
//! Implementations include SQLite (primary) and in-memory (tests).

use async_trait::async_trait;
use certreg_core::{Certificate, CertificateId, EventRecord, Identity, RegistryEvent};

use crate::error::Result;

/// A fact about stored state that a changeset was planned against.
///
/// [`Store::commit`] re-checks every precondition inside its transaction and
/// rejects the whole changeset with
/// [`StoreError::PreconditionFailed`](crate::StoreError::PreconditionFailed)
/// if any no longer holds, so another writer on the same database cannot
/// slip in between validation and commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// `issuer` is currently authorized.
    IssuerAuthorized(Identity),
    /// The issuance counter of `issuer` still equals `nonce`.
    IssuerNonce { issuer: Identity, nonce: u64 },
    /// No certificate with this id exists.
    CertificateAbsent(CertificateId),
    /// The certificate exists, was issued by `issuer` and is not revoked.
    CertificateUnrevoked { id: CertificateId, issuer: Identity },
    /// The last request nonce accepted from `signer` still equals `last`.
    RequestNonce { signer: Identity, last: u64 },
}

/// A batch of writes produced by one registry operation.
///
/// [`Store::commit`] applies every write in the batch or none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    /// Checked before any write is applied.
    pub preconditions: Vec<Precondition>,
    /// Issuer authorization flags to set.
    pub issuer_flags: Vec<(Identity, bool)>,
    /// Certificates to insert, or replace when the id already exists.
    pub certificates: Vec<Certificate>,
    /// New issuance counter values.
    pub nonces: Vec<(Identity, u64)>,
    /// Last accepted request nonce per signer.
    pub request_nonces: Vec<(Identity, u64)>,
    /// Events to append, in order.
    pub events: Vec<RegistryEvent>,
    /// Commit time (Unix seconds), stamped on every appended event.
    pub recorded_at: i64,
}

impl Changeset {
    /// Create an empty changeset stamped with `recorded_at`.
    pub fn new(recorded_at: i64) -> Self {
        Self {
            recorded_at,
            ..Self::default()
        }
    }

    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn set_issuer(mut self, issuer: Identity, authorized: bool) -> Self {
        self.issuer_flags.push((issuer, authorized));
        self
    }

    pub fn put_certificate(mut self, certificate: Certificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    pub fn set_nonce(mut self, issuer: Identity, nonce: u64) -> Self {
        self.nonces.push((issuer, nonce));
        self
    }

    pub fn set_request_nonce(mut self, signer: Identity, nonce: u64) -> Self {
        self.request_nonces.push((signer, nonce));
        self
    }

    pub fn emit(mut self, event: RegistryEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Whether the changeset carries no writes at all.
    pub fn is_empty(&self) -> bool {
        self.issuer_flags.is_empty()
            && self.certificates.is_empty()
            && self.nonces.is_empty()
            && self.request_nonces.is_empty()
            && self.events.is_empty()
    }
}

/// The Store trait: async interface for registry persistence.
///
/// # Design Notes
///
/// - **Default-false authorization**: an identity with no issuer record is
///   not authorized.
/// - **Absent certificates**: `get_certificate` returns `None` for unknown ids
///   and for records whose issuer is the sentinel.
/// - **Optimistic writes**: reads outside `commit` may be stale by the time a
///   changeset lands. Callers state what they read as [`Precondition`]s and
///   the store re-checks them atomically with the writes.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Administrator
    // ─────────────────────────────────────────────────────────────────────────

    /// Record the administrator if none is set yet.
    ///
    /// Returns the administrator now stored, which differs from `admin` when
    /// the store was already initialized by someone else.
    async fn initialize(&self, admin: Identity) -> Result<Identity>;

    /// The administrator, if the store has been initialized.
    async fn admin(&self) -> Result<Option<Identity>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Issuers
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `identity` is currently flagged as an authorized issuer.
    async fn is_authorized(&self, identity: &Identity) -> Result<bool>;

    /// All identities currently flagged authorized, sorted.
    async fn authorized_issuers(&self) -> Result<Vec<Identity>>;

    /// The issuance counter for `issuer` (0 if it never issued).
    async fn issuer_nonce(&self, issuer: &Identity) -> Result<u64>;

    /// The last request nonce accepted from `signer` (0 if none).
    async fn request_nonce(&self, signer: &Identity) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Certificates
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a certificate by id.
    async fn get_certificate(&self, id: &CertificateId) -> Result<Option<Certificate>>;

    /// All certificates issued by `issuer`, ordered by issuance time then id.
    async fn certificates_by_issuer(&self, issuer: &Identity) -> Result<Vec<Certificate>>;

    /// Number of stored certificates, not counting sentinel-issuer records.
    async fn certificate_count(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes and the event log
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a changeset atomically, after checking its preconditions.
    ///
    /// Returns the appended events with their assigned sequence numbers.
    async fn commit(&self, changes: Changeset) -> Result<Vec<EventRecord>>;

    /// Events with `seq > after_seq`, in order.
    async fn events_since(&self, after_seq: u64) -> Result<Vec<EventRecord>>;
}
