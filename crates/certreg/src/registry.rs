//! The Registry: issuer administration, issuance, revocation and verification.
//!
//! Every mutating operation is planned against a read of the store and then
//! written through exactly one [`Store::commit`]. The plan carries the facts
//! it relied on as [`Precondition`]s, so a concurrent writer on another handle
//! to the same database makes the commit fail instead of being overwritten;
//! the operation is then planned again against fresh state. A rejected
//! operation never reaches the commit, so it leaves no trace.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use certreg_core::{
    derive_certificate_id, validate_issuer_identity, validate_name, Caller, Certificate,
    CertificateId, EventRecord, Identity, IssuanceInput, RegistryEvent, Request, SignedRequest,
    Verification,
};
use certreg_store::{Changeset, Precondition, Store, StoreError};

use crate::clock::{Clock, SystemClock};
use crate::config::{CollisionPolicy, RegistryConfig};
use crate::error::{RegistryError, Result};

/// Commits attempted per operation before a conflict is reported.
const MAX_COMMIT_ATTEMPTS: usize = 8;

/// The certificate registry.
///
/// Holds the administrator identity, the configuration and a handle to the
/// store that owns the issuer set, the certificates and the event log.
pub struct Registry<S: Store> {
    /// Set at creation, never reassigned.
    admin: Identity,
    store: Arc<S>,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    /// Serializes mutating operations issued through this handle.
    write_lock: Mutex<()>,
    events: broadcast::Sender<EventRecord>,
}

impl<S: Store> Registry<S> {
    /// Create a registry administered by `admin` on top of `store`.
    ///
    /// A fresh store is initialized with `admin`. A store that already has
    /// the same administrator is reopened as is.
    pub async fn create(store: S, admin: Identity, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        if admin.is_zero() {
            return Err(RegistryError::InvalidArgument(
                "administrator cannot be the sentinel identity".into(),
            ));
        }

        let stored = store.initialize(admin).await?;
        if stored != admin {
            return Err(RegistryError::AlreadyInitialized(stored));
        }

        tracing::info!(admin = %admin, "registry created");
        Ok(Self::assemble(store, admin, config))
    }

    /// Reopen a registry whose store was initialized earlier.
    pub async fn open(store: S, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let admin = store.admin().await?.ok_or(RegistryError::NotInitialized)?;
        tracing::info!(admin = %admin, "registry opened");
        Ok(Self::assemble(store, admin, config))
    }

    fn assemble(store: S, admin: Identity, config: RegistryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer);
        Self {
            admin,
            store: Arc::new(store),
            config,
            clock: Arc::new(SystemClock),
            write_lock: Mutex::new(()),
            events,
        }
    }

    /// Replace the time source used for issuance and event timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The administrator identity.
    pub fn admin(&self) -> Identity {
        self.admin
    }

    /// The configuration this registry was opened with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Administration
    // ─────────────────────────────────────────────────────────────────────────

    /// Mark `issuer` as authorized. Re-authorizing is accepted and emits
    /// another `IssuerAuthorized`.
    pub async fn authorize_issuer(&self, caller: &Caller, issuer: Identity) -> Result<EventRecord> {
        self.execute(caller, &Request::AuthorizeIssuer { issuer }, None)
            .await
    }

    /// Remove `issuer` from the authorized set.
    ///
    /// Fails with `NotAuthorized` when `issuer` is not currently authorized.
    /// Certificates it already issued stay valid and stay revocable by it.
    pub async fn deauthorize_issuer(
        &self,
        caller: &Caller,
        issuer: Identity,
    ) -> Result<EventRecord> {
        self.execute(caller, &Request::DeauthorizeIssuer { issuer }, None)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Issuance and revocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a certificate as `caller`, returning its derived identifier.
    pub async fn issue_certificate(
        &self,
        caller: &Caller,
        certificate_name: &str,
        recipient_name: &str,
    ) -> Result<CertificateId> {
        let request = Request::IssueCertificate {
            certificate_name: certificate_name.to_string(),
            recipient_name: recipient_name.to_string(),
        };
        let record = self.execute(caller, &request, None).await?;
        record.event.certificate_id().ok_or_else(|| {
            RegistryError::Store(StoreError::InvalidData(
                "issuance committed without a certificate id".into(),
            ))
        })
    }

    /// Revoke a certificate. Only its issuer may do so, whether or not the
    /// issuer is still authorized.
    pub async fn revoke_certificate(&self, caller: &Caller, id: &CertificateId) -> Result<EventRecord> {
        self.execute(caller, &Request::RevokeCertificate { id: *id }, None)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signed requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a request on behalf of its signer.
    ///
    /// The signature must cover this exact operation, its arguments and the
    /// nonce. The nonce must be greater than the last one accepted from the
    /// signer; it is recorded in the same commit as the operation, so a
    /// request is accepted at most once. A request that fails leaves the
    /// signer's nonce where it was.
    pub async fn submit(&self, signed: &SignedRequest) -> Result<EventRecord> {
        let op = signed.request.name();
        let caller = signed.verify().map_err(|e| rejected(op, e.into()))?;
        self.execute(&caller, &signed.request, Some(signed.nonce))
            .await
    }

    /// The last request nonce accepted from `signer` (0 if none).
    pub async fn last_request_nonce(&self, signer: &Identity) -> Result<u64> {
        Ok(self.store.request_nonce(signer).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up a certificate and report whether it is valid.
    ///
    /// Validity only reflects revocation, not the issuer's current status.
    pub async fn verify_certificate(&self, id: &CertificateId) -> Result<Verification> {
        let certificate = self
            .store
            .get_certificate(id)
            .await?
            .ok_or(RegistryError::NotFound(*id))?;
        Ok(certificate.verification())
    }

    /// The stored record, or `None` if no certificate has this id.
    pub async fn certificate(&self, id: &CertificateId) -> Result<Option<Certificate>> {
        Ok(self.store.get_certificate(id).await?)
    }

    /// Whether `identity` may currently issue certificates.
    pub async fn is_authorized_issuer(&self, identity: &Identity) -> Result<bool> {
        Ok(self.store.is_authorized(identity).await?)
    }

    /// Every currently authorized issuer, sorted.
    pub async fn authorized_issuers(&self) -> Result<Vec<Identity>> {
        Ok(self.store.authorized_issuers().await?)
    }

    /// Certificates issued by `issuer`, oldest first.
    pub async fn certificates_issued_by(&self, issuer: &Identity) -> Result<Vec<Certificate>> {
        Ok(self.store.certificates_by_issuer(issuer).await?)
    }

    /// Number of certificates on record, revoked ones included.
    pub async fn certificate_count(&self) -> Result<u64> {
        Ok(self.store.certificate_count().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────────────────

    /// Receive every event committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    /// Durable events with `seq > after_seq`, oldest first.
    pub async fn events_since(&self, after_seq: u64) -> Result<Vec<EventRecord>> {
        Ok(self.store.events_since(after_seq).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn require_admin(&self, caller: &Caller, op: &'static str) -> Result<()> {
        if caller.identity() != self.admin {
            return Err(rejected(
                op,
                RegistryError::Unauthorized(format!(
                    "{} is not the registry administrator",
                    caller.identity()
                )),
            ));
        }
        Ok(())
    }

    /// Plan, commit and publish one mutating operation.
    ///
    /// A commit that fails on a precondition means another handle changed
    /// what the plan read; the operation is planned again, which turns the
    /// race into the error a sequential caller would have seen.
    async fn execute(
        &self,
        caller: &Caller,
        request: &Request,
        request_nonce: Option<u64>,
    ) -> Result<EventRecord> {
        let _guard = self.write_lock.lock().await;
        let op = request.name();

        let mut attempt = 1;
        loop {
            let mut changes = Changeset::new(self.clock.now());
            if let Some(nonce) = request_nonce {
                changes = self.bind_request_nonce(changes, caller, nonce, op).await?;
            }
            let changes = self.plan(changes, caller, request).await?;

            match self.store.commit(changes).await {
                Ok(records) => return self.publish(records),
                Err(StoreError::PreconditionFailed(failed)) if attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(
                        op,
                        attempt,
                        precondition = ?failed,
                        "state changed under commit, replanning"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn bind_request_nonce(
        &self,
        changes: Changeset,
        caller: &Caller,
        nonce: u64,
        op: &'static str,
    ) -> Result<Changeset> {
        let signer = caller.identity();
        let last = self.store.request_nonce(&signer).await?;
        if nonce <= last {
            return Err(rejected(
                op,
                RegistryError::Unauthorized(format!(
                    "request nonce {} from {} is not above the last accepted nonce {}",
                    nonce, signer, last
                )),
            ));
        }
        Ok(changes
            .require(Precondition::RequestNonce { signer, last })
            .set_request_nonce(signer, nonce))
    }

    /// Validate `request` against current state and build its changeset.
    async fn plan(&self, changes: Changeset, caller: &Caller, request: &Request) -> Result<Changeset> {
        let op = request.name();
        match request {
            Request::AuthorizeIssuer { issuer } => {
                let issuer = *issuer;
                self.require_admin(caller, op)?;
                validate_issuer_identity(&issuer).map_err(|e| rejected(op, e.into()))?;
                Ok(changes
                    .set_issuer(issuer, true)
                    .emit(RegistryEvent::IssuerAuthorized { issuer }))
            }

            Request::DeauthorizeIssuer { issuer } => {
                let issuer = *issuer;
                self.require_admin(caller, op)?;
                if !self.store.is_authorized(&issuer).await? {
                    return Err(rejected(op, RegistryError::NotAuthorized(issuer)));
                }
                Ok(changes
                    .require(Precondition::IssuerAuthorized(issuer))
                    .set_issuer(issuer, false)
                    .emit(RegistryEvent::IssuerDeauthorized { issuer }))
            }

            Request::IssueCertificate {
                certificate_name,
                recipient_name,
            } => {
                self.plan_issuance(changes, caller, certificate_name, recipient_name)
                    .await
            }

            Request::RevokeCertificate { id } => {
                let id = *id;
                let certificate = self
                    .store
                    .get_certificate(&id)
                    .await?
                    .ok_or_else(|| rejected(op, RegistryError::NotFound(id)))?;

                if certificate.issuer != caller.identity() {
                    return Err(rejected(
                        op,
                        RegistryError::Unauthorized(format!(
                            "{} is not the issuer of certificate {}",
                            caller.identity(),
                            id
                        )),
                    ));
                }
                if certificate.revoked {
                    return Err(rejected(op, RegistryError::AlreadyRevoked(id)));
                }

                let issuer = certificate.issuer;
                Ok(changes
                    .require(Precondition::CertificateUnrevoked { id, issuer })
                    .put_certificate(certificate.as_revoked())
                    .emit(RegistryEvent::CertificateRevoked { id, issuer }))
            }
        }
    }

    async fn plan_issuance(
        &self,
        changes: Changeset,
        caller: &Caller,
        certificate_name: &str,
        recipient_name: &str,
    ) -> Result<Changeset> {
        const OP: &str = "issue_certificate";
        let issuer = caller.identity();

        if !self.store.is_authorized(&issuer).await? {
            return Err(rejected(
                OP,
                RegistryError::Unauthorized(format!("{} is not an authorized issuer", issuer)),
            ));
        }

        let max = self.config.max_name_bytes;
        validate_name("certificate_name", certificate_name, max)
            .and_then(|_| validate_name("recipient_name", recipient_name, max))
            .map_err(|e| rejected(OP, e.into()))?;

        let now = changes.recorded_at;
        let nonce = self.store.issuer_nonce(&issuer).await?;
        let next_nonce = nonce.checked_add(1).ok_or_else(|| {
            RegistryError::InvalidArgument(format!("issuance counter exhausted for {}", issuer))
        })?;

        let id = derive_certificate_id(
            &IssuanceInput {
                issued_at: now,
                issuer,
                certificate_name,
                recipient_name,
                nonce,
            },
            self.config.id_derivation,
        )?;

        let mut changes = changes
            .require(Precondition::IssuerAuthorized(issuer))
            .require(Precondition::IssuerNonce { issuer, nonce });

        match self.config.collision_policy {
            CollisionPolicy::Reject => {
                if self.store.get_certificate(&id).await?.is_some() {
                    return Err(rejected(OP, RegistryError::IdCollision(id)));
                }
                changes = changes.require(Precondition::CertificateAbsent(id));
            }
            CollisionPolicy::Overwrite => {
                if let Some(existing) = self.store.get_certificate(&id).await? {
                    tracing::warn!(
                        id = %id,
                        previous_issuer = %existing.issuer,
                        previous_revoked = existing.revoked,
                        "certificate id collision, overwriting existing record"
                    );
                }
            }
        }

        let certificate = Certificate::new(id, issuer, certificate_name, recipient_name, now);
        Ok(changes
            .put_certificate(certificate)
            .set_nonce(issuer, next_nonce)
            .emit(RegistryEvent::CertificateIssued {
                id,
                issuer,
                recipient_name: recipient_name.to_string(),
            }))
    }

    /// Log the committed event and push it to subscribers.
    fn publish(&self, mut records: Vec<EventRecord>) -> Result<EventRecord> {
        let record = records.pop().ok_or_else(|| {
            RegistryError::Store(StoreError::InvalidData(
                "commit returned no event record".into(),
            ))
        })?;

        let seq = record.seq;
        match &record.event {
            RegistryEvent::IssuerAuthorized { issuer } => {
                tracing::info!(issuer = %issuer, seq, "issuer authorized");
            }
            RegistryEvent::IssuerDeauthorized { issuer } => {
                tracing::info!(issuer = %issuer, seq, "issuer deauthorized");
            }
            RegistryEvent::CertificateIssued { id, issuer, .. } => {
                tracing::info!(id = %id, issuer = %issuer, seq, "certificate issued");
            }
            RegistryEvent::CertificateRevoked { id, issuer } => {
                tracing::info!(id = %id, issuer = %issuer, seq, "certificate revoked");
            }
        }

        // Err only means there are no subscribers right now.
        let _ = self.events.send(record.clone());
        Ok(record)
    }
}

fn rejected(op: &'static str, err: RegistryError) -> RegistryError {
    tracing::debug!(op, error = %err, "operation rejected");
    err
}
