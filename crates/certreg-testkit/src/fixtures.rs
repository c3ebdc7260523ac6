//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use certreg::{ManualClock, Registry, RegistryConfig, Result};
use certreg_core::{Caller, CertificateId, Keypair};
use certreg_store::MemoryStore;

/// Fixed start time for fixture clocks (2023-11-14T22:13:20Z).
pub const FIXTURE_EPOCH: i64 = 1_700_000_000;

/// A registry on a memory store with deterministic keys and a manual clock.
pub struct RegistryFixture {
    pub admin: Keypair,
    pub issuer: Keypair,
    pub clock: Arc<ManualClock>,
    pub registry: Registry<MemoryStore>,
}

impl RegistryFixture {
    /// A fresh registry with the default configuration and no issuers.
    pub async fn new() -> Self {
        Self::with_config(RegistryConfig::default()).await
    }

    pub async fn with_config(config: RegistryConfig) -> Self {
        let admin = Keypair::from_seed(&[0xA0; 32]);
        let issuer = Keypair::from_seed(&[0x15; 32]);
        let clock = Arc::new(ManualClock::new(FIXTURE_EPOCH));

        let registry = Registry::create(MemoryStore::new(), admin.identity(), config)
            .await
            .expect("fixture registry creation failed")
            .with_clock(clock.clone());

        Self {
            admin,
            issuer,
            clock,
            registry,
        }
    }

    /// A fresh registry where `issuer` is already authorized.
    pub async fn with_authorized_issuer() -> Self {
        let fixture = Self::new().await;
        fixture.authorize(&fixture.issuer).await;
        fixture
    }

    pub fn admin_caller(&self) -> Caller {
        self.admin.caller()
    }

    pub fn issuer_caller(&self) -> Caller {
        self.issuer.caller()
    }

    /// Authorize `keypair` as the administrator.
    pub async fn authorize(&self, keypair: &Keypair) {
        self.registry
            .authorize_issuer(&self.admin_caller(), keypair.identity())
            .await
            .expect("fixture authorization failed");
    }

    /// Issue a certificate as the fixture issuer.
    pub async fn issue(&self, certificate_name: &str, recipient_name: &str) -> Result<CertificateId> {
        self.registry
            .issue_certificate(&self.issuer_caller(), certificate_name, recipient_name)
            .await
    }
}

/// Deterministic keypairs for multi-party tests.
pub fn multi_party_keypairs(count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[31] = 0x5E;
            Keypair::from_seed(&seed)
        })
        .collect()
}
