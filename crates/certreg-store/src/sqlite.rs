//! SQLite implementation of the Store trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite;
//! every call runs on tokio's blocking pool and every commit is one
//! `BEGIN IMMEDIATE` transaction. Preconditions are checked inside that
//! transaction, so several handles on one database file stay consistent.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use certreg_core::{Certificate, CertificateId, EventRecord, Identity, RegistryEvent};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_secs};
use crate::traits::{Changeset, Precondition, Store};

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store implementation.
///
/// Thread-safe via an internal Mutex around the single connection.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("sqlite connection: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn blob32(row: &Row<'_>, idx: usize, name: &str) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, name.into(), rusqlite::types::Type::Blob)
    })
}

const CERTIFICATE_COLUMNS: &str =
    "certificate_id, issuer, certificate_name, recipient_name, issued_at, revoked";

fn row_to_certificate(row: &Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: CertificateId::from_bytes(blob32(row, 0, "certificate_id")?),
        issuer: Identity::from_bytes(blob32(row, 1, "issuer")?),
        certificate_name: row.get(2)?,
        recipient_name: row.get(3)?,
        issued_at: row.get(4)?,
        revoked: row.get::<_, i64>(5)? != 0,
    })
}

fn precondition_holds(tx: &Transaction<'_>, precondition: &Precondition) -> Result<bool> {
    let holds = match *precondition {
        Precondition::IssuerAuthorized(issuer) => tx
            .query_row(
                "SELECT authorized FROM issuers WHERE identity = ?1",
                params![issuer.0.as_slice()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some_and(|flag| flag != 0),
        Precondition::IssuerNonce { issuer, nonce } => {
            let stored: Option<i64> = tx
                .query_row(
                    "SELECT nonce FROM issuers WHERE identity = ?1",
                    params![issuer.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            stored.unwrap_or(0) as u64 == nonce
        }
        Precondition::CertificateAbsent(id) => tx
            .query_row(
                "SELECT 1 FROM certificates WHERE certificate_id = ?1 AND issuer != ?2",
                params![id.0.as_slice(), Identity::ZERO.0.as_slice()],
                |_| Ok(()),
            )
            .optional()?
            .is_none(),
        Precondition::CertificateUnrevoked { id, issuer } => tx
            .query_row(
                "SELECT 1 FROM certificates
                 WHERE certificate_id = ?1 AND issuer = ?2 AND revoked = 0",
                params![id.0.as_slice(), issuer.0.as_slice()],
                |_| Ok(()),
            )
            .optional()?
            .is_some(),
        Precondition::RequestNonce { signer, last } => {
            let stored: Option<i64> = tx
                .query_row(
                    "SELECT last_nonce FROM request_nonces WHERE identity = ?1",
                    params![signer.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            stored.unwrap_or(0) as u64 == last
        }
    };
    Ok(holds)
}

fn row_to_event(row: &Row<'_>) -> Result<EventRecord> {
    let seq: i64 = row.get(0)?;
    let body: Vec<u8> = row.get(1)?;
    let recorded_at: i64 = row.get(2)?;
    let event = RegistryEvent::from_cbor(&body)?;
    Ok(EventRecord {
        seq: seq as u64,
        recorded_at,
        event,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn initialize(&self, admin: Identity) -> Result<Identity> {
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO registry_admin (id, identity, created_at) VALUES (1, ?1, ?2)",
                params![admin.0.as_slice(), now_secs()],
            )?;
            let stored = tx.query_row(
                "SELECT identity FROM registry_admin WHERE id = 1",
                [],
                |row| blob32(row, 0, "identity"),
            )?;
            tx.commit()?;
            Ok(Identity::from_bytes(stored))
        })
        .await
    }

    async fn admin(&self) -> Result<Option<Identity>> {
        self.blocking(|conn| {
            let stored = conn
                .query_row(
                    "SELECT identity FROM registry_admin WHERE id = 1",
                    [],
                    |row| blob32(row, 0, "identity"),
                )
                .optional()?;
            Ok(stored.map(Identity::from_bytes))
        })
        .await
    }

    async fn is_authorized(&self, identity: &Identity) -> Result<bool> {
        let identity = *identity;
        self.blocking(move |conn| {
            let flag: Option<i64> = conn
                .query_row(
                    "SELECT authorized FROM issuers WHERE identity = ?1",
                    params![identity.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(flag.unwrap_or(0) != 0)
        })
        .await
    }

    async fn authorized_issuers(&self) -> Result<Vec<Identity>> {
        self.blocking(|conn| {
            let mut stmt = conn
                .prepare("SELECT identity FROM issuers WHERE authorized = 1 ORDER BY identity")?;
            let issuers = stmt
                .query_map([], |row| blob32(row, 0, "identity").map(Identity::from_bytes))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(issuers)
        })
        .await
    }

    async fn issuer_nonce(&self, issuer: &Identity) -> Result<u64> {
        let issuer = *issuer;
        self.blocking(move |conn| {
            let nonce: Option<i64> = conn
                .query_row(
                    "SELECT nonce FROM issuers WHERE identity = ?1",
                    params![issuer.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(nonce.unwrap_or(0) as u64)
        })
        .await
    }

    async fn request_nonce(&self, signer: &Identity) -> Result<u64> {
        let signer = *signer;
        self.blocking(move |conn| {
            let nonce: Option<i64> = conn
                .query_row(
                    "SELECT last_nonce FROM request_nonces WHERE identity = ?1",
                    params![signer.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(nonce.unwrap_or(0) as u64)
        })
        .await
    }

    async fn get_certificate(&self, id: &CertificateId) -> Result<Option<Certificate>> {
        let id = *id;
        self.blocking(move |conn| {
            let cert = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM certificates WHERE certificate_id = ?1",
                        CERTIFICATE_COLUMNS
                    ),
                    params![id.0.as_slice()],
                    row_to_certificate,
                )
                .optional()?;
            Ok(cert.filter(|c| c.exists()))
        })
        .await
    }

    async fn certificates_by_issuer(&self, issuer: &Identity) -> Result<Vec<Certificate>> {
        let issuer = *issuer;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM certificates WHERE issuer = ?1 ORDER BY issued_at, certificate_id",
                CERTIFICATE_COLUMNS
            ))?;
            let certs = stmt
                .query_map(params![issuer.0.as_slice()], row_to_certificate)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(certs.into_iter().filter(|c| c.exists()).collect())
        })
        .await
    }

    async fn certificate_count(&self) -> Result<u64> {
        self.blocking(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM certificates WHERE issuer != ?1",
                params![Identity::ZERO.0.as_slice()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn commit(&self, changes: Changeset) -> Result<Vec<EventRecord>> {
        // Encode up front so a bad event fails before the transaction opens.
        let encoded = changes
            .events
            .iter()
            .map(|e| e.to_cbor().map_err(StoreError::from))
            .collect::<Result<Vec<_>>>()?;

        self.blocking(move |conn| {
            // Take the write lock up front: the precondition reads must see
            // the state the writes land on.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            for precondition in &changes.preconditions {
                if !precondition_holds(&tx, precondition)? {
                    return Err(StoreError::PreconditionFailed(*precondition));
                }
            }

            for (issuer, authorized) in &changes.issuer_flags {
                tx.execute(
                    "INSERT INTO issuers (identity, authorized) VALUES (?1, ?2)
                     ON CONFLICT(identity) DO UPDATE SET authorized = excluded.authorized",
                    params![issuer.0.as_slice(), *authorized as i64],
                )?;
            }

            for (issuer, nonce) in &changes.nonces {
                tx.execute(
                    "INSERT INTO issuers (identity, authorized, nonce) VALUES (?1, 0, ?2)
                     ON CONFLICT(identity) DO UPDATE SET nonce = excluded.nonce",
                    params![issuer.0.as_slice(), *nonce as i64],
                )?;
            }

            for (signer, nonce) in &changes.request_nonces {
                tx.execute(
                    "INSERT INTO request_nonces (identity, last_nonce) VALUES (?1, ?2)
                     ON CONFLICT(identity) DO UPDATE SET last_nonce = excluded.last_nonce",
                    params![signer.0.as_slice(), *nonce as i64],
                )?;
            }

            for cert in &changes.certificates {
                tx.execute(
                    "INSERT INTO certificates (
                        certificate_id, issuer, certificate_name, recipient_name, issued_at, revoked
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(certificate_id) DO UPDATE SET
                        issuer = excluded.issuer,
                        certificate_name = excluded.certificate_name,
                        recipient_name = excluded.recipient_name,
                        issued_at = excluded.issued_at,
                        revoked = excluded.revoked",
                    params![
                        cert.id.0.as_slice(),
                        cert.issuer.0.as_slice(),
                        cert.certificate_name,
                        cert.recipient_name,
                        cert.issued_at,
                        cert.revoked as i64,
                    ],
                )?;
            }

            let last_seq: i64 =
                tx.query_row("SELECT COALESCE(MAX(seq), 0) FROM events", [], |row| row.get(0))?;

            let mut appended = Vec::with_capacity(changes.events.len());
            for (offset, (event, body)) in changes.events.into_iter().zip(encoded).enumerate() {
                let seq = last_seq + 1 + offset as i64;
                let certificate_id = event.certificate_id();
                tx.execute(
                    "INSERT INTO events (seq, kind, certificate_id, body, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        seq,
                        event.name(),
                        certificate_id.as_ref().map(|id| id.0.as_slice()),
                        body,
                        changes.recorded_at,
                    ],
                )?;
                appended.push(EventRecord {
                    seq: seq as u64,
                    recorded_at: changes.recorded_at,
                    event,
                });
            }

            tx.commit()?;
            Ok(appended)
        })
        .await
    }

    async fn events_since(&self, after_seq: u64) -> Result<Vec<EventRecord>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, body, recorded_at FROM events WHERE seq > ?1 ORDER BY seq",
            )?;
            let mut rows = stmt.query(params![after_seq as i64])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_event(row)?);
            }
            Ok(records)
        })
        .await
    }
}
