//! # certreg testkit
//!
//! Testing utilities for the certificate registry.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed issuance inputs with their canonical encoding
//!   and derived identifier, for cross-implementation checks
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A ready-made registry with an administrator, an authorized
//!   issuer and a manual clock
//!
//! ## Golden Vectors
//!
//! ```rust
//! use certreg_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{name}: {hex}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use certreg_testkit::generators::IssueParams;
//!
//! proptest! {
//!     #[test]
//!     fn derivation_is_deterministic(params: IssueParams) {
//!         prop_assert_eq!(params.derive_id(), params.derive_id());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use certreg_testkit::fixtures::RegistryFixture;
//!
//! # tokio_test_block(async {
//! let fixture = RegistryFixture::with_authorized_issuer().await;
//! let id = fixture.issue("Degree", "Jane Doe").await.unwrap();
//! assert!(fixture.registry.verify_certificate(&id).await.unwrap().valid);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_keypairs, RegistryFixture};
pub use generators::IssueParams;
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
