//! # certreg store
//!
//! Storage abstraction for the certificate registry. The registry talks to
//! persistence only through the [`Store`] trait, so it is storage-agnostic.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`Changeset`] - A batch of writes applied atomically by [`Store::commit`]
//! - [`Precondition`] - State a changeset depends on, re-checked at commit
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests and embedding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use certreg_store::{SqliteStore, Store};
//! use certreg_core::Keypair;
//!
//! async fn example() {
//!     let store = SqliteStore::open("registry.db").unwrap();
//!     let admin = Keypair::generate().identity();
//!     store.initialize(admin).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic commits**: every write a registry operation makes goes through a
//!   single `commit`; it is applied completely or not at all.
//! - **Append-only log**: events get gap-free sequence numbers assigned
//!   inside the commit that produced them.
//! - **Safe across handles**: two stores on the same SQLite file (or two
//!   processes) cannot both commit changesets planned against the same state.
//! - **No deletes**: certificates are only ever inserted or upserted.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Changeset, Precondition, Store};
