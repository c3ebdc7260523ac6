//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite but nothing is persisted. Each commit is applied
//! under a single write lock, so readers never see half a changeset.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use certreg_core::{Certificate, CertificateId, EventRecord, Identity};

use crate::error::{Result, StoreError};
use crate::traits::{Changeset, Precondition, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    admin: Option<Identity>,

    /// Issuer flags. Missing means not authorized.
    issuers: HashMap<Identity, bool>,

    /// Per-issuer issuance counters.
    nonces: HashMap<Identity, u64>,

    /// Last accepted request nonce per signer.
    request_nonces: HashMap<Identity, u64>,

    certificates: HashMap<CertificateId, Certificate>,

    /// Event log keyed by seq.
    events: BTreeMap<u64, EventRecord>,
}

impl MemoryStoreInner {
    fn holds(&self, precondition: &Precondition) -> bool {
        match *precondition {
            Precondition::IssuerAuthorized(issuer) => {
                self.issuers.get(&issuer).copied().unwrap_or(false)
            }
            Precondition::IssuerNonce { issuer, nonce } => {
                self.nonces.get(&issuer).copied().unwrap_or(0) == nonce
            }
            Precondition::CertificateAbsent(id) => {
                !self.certificates.get(&id).is_some_and(|c| c.exists())
            }
            Precondition::CertificateUnrevoked { id, issuer } => self
                .certificates
                .get(&id)
                .is_some_and(|c| c.exists() && c.issuer == issuer && !c.revoked),
            Precondition::RequestNonce { signer, last } => {
                self.request_nonces.get(&signer).copied().unwrap_or(0) == last
            }
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn initialize(&self, admin: Identity) -> Result<Identity> {
        let mut inner = self.write()?;
        Ok(*inner.admin.get_or_insert(admin))
    }

    async fn admin(&self) -> Result<Option<Identity>> {
        Ok(self.read()?.admin)
    }

    async fn is_authorized(&self, identity: &Identity) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner.issuers.get(identity).copied().unwrap_or(false))
    }

    async fn authorized_issuers(&self) -> Result<Vec<Identity>> {
        let inner = self.read()?;
        let mut issuers: Vec<Identity> = inner
            .issuers
            .iter()
            .filter(|&(_, &authorized)| authorized)
            .map(|(id, _)| *id)
            .collect();
        issuers.sort();
        Ok(issuers)
    }

    async fn issuer_nonce(&self, issuer: &Identity) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.nonces.get(issuer).copied().unwrap_or(0))
    }

    async fn request_nonce(&self, signer: &Identity) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.request_nonces.get(signer).copied().unwrap_or(0))
    }

    async fn get_certificate(&self, id: &CertificateId) -> Result<Option<Certificate>> {
        let inner = self.read()?;
        Ok(inner
            .certificates
            .get(id)
            .filter(|c| c.exists())
            .cloned())
    }

    async fn certificates_by_issuer(&self, issuer: &Identity) -> Result<Vec<Certificate>> {
        let inner = self.read()?;
        let mut certs: Vec<Certificate> = inner
            .certificates
            .values()
            .filter(|c| c.exists() && &c.issuer == issuer)
            .cloned()
            .collect();
        certs.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then(a.id.cmp(&b.id)));
        Ok(certs)
    }

    async fn certificate_count(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.certificates.values().filter(|c| c.exists()).count() as u64)
    }

    async fn commit(&self, changes: Changeset) -> Result<Vec<EventRecord>> {
        let mut inner = self.write()?;

        if let Some(failed) = changes.preconditions.iter().find(|p| !inner.holds(p)) {
            return Err(StoreError::PreconditionFailed(*failed));
        }

        for (issuer, authorized) in changes.issuer_flags {
            inner.issuers.insert(issuer, authorized);
        }
        for (issuer, nonce) in changes.nonces {
            inner.nonces.insert(issuer, nonce);
        }
        for (signer, nonce) in changes.request_nonces {
            inner.request_nonces.insert(signer, nonce);
        }
        for cert in changes.certificates {
            inner.certificates.insert(cert.id, cert);
        }

        let mut next_seq = inner.events.keys().next_back().copied().unwrap_or(0) + 1;
        let mut appended = Vec::with_capacity(changes.events.len());
        for event in changes.events {
            let record = EventRecord {
                seq: next_seq,
                recorded_at: changes.recorded_at,
                event,
            };
            inner.events.insert(next_seq, record.clone());
            appended.push(record);
            next_seq += 1;
        }

        Ok(appended)
    }

    async fn events_since(&self, after_seq: u64) -> Result<Vec<EventRecord>> {
        let inner = self.read()?;
        Ok(inner
            .events
            .range(after_seq.saturating_add(1)..)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
