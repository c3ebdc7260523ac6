//! # certreg
//!
//! A permissioned certificate registry. One administrator decides which
//! identities may issue certificates; authorized issuers issue certificates
//! under content-derived identifiers and may revoke their own; anyone can
//! verify a certificate by id.
//!
//! ## Example
//!
//! ```no_run
//! use certreg::{Registry, RegistryConfig};
//! use certreg::core::Keypair;
//! use certreg::store::SqliteStore;
//!
//! # async fn example() -> certreg::Result<()> {
//! let admin = Keypair::generate();
//! let issuer = Keypair::generate();
//!
//! let store = SqliteStore::open("registry.db")?;
//! let registry = Registry::create(store, admin.identity(), RegistryConfig::default()).await?;
//!
//! registry.authorize_issuer(&admin.caller(), issuer.identity()).await?;
//! let id = registry
//!     .issue_certificate(&issuer.caller(), "BSc Computer Science", "Jane Doe")
//!     .await?;
//!
//! assert!(registry.verify_certificate(&id).await?.valid);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - [`certreg_core`] (re-exported as [`core`]): identities, certificates,
//!   id derivation, events, caller authentication and signed requests.
//! - [`certreg_store`] (re-exported as [`store`]): the `Store` trait with
//!   SQLite and in-memory backends.

pub mod clock;
pub mod config;
pub mod error;
pub mod registry;

// Re-export component crates
pub use certreg_core as core;
pub use certreg_store as store;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CollisionPolicy, RegistryConfig};
pub use error::{ErrorKind, RegistryError, Result};
pub use registry::Registry;

// Re-export commonly used core types
pub use certreg_core::{
    Caller, Certificate, CertificateId, CertificateStatus, EventRecord, IdDerivation, Identity,
    Keypair, RegistryEvent, Request, SignedRequest, Verification,
};
