//! Database schema migrations for SQLite.
//!
//! Each migration is a SQL batch that takes the schema from version N to N+1.

use rusqlite::{Connection, TransactionBehavior};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// Idempotent: calling it on an up-to-date database does nothing. Runs under
/// the database write lock, so concurrent openers migrate at most once.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = tx.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    for version in (current + 1)..=CURRENT_VERSION {
        apply_migration(&tx, version)?;

        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, now_secs()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }

    tx.commit()?;
    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Single administrator, set once
        CREATE TABLE registry_admin (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            identity BLOB NOT NULL,           -- 32 bytes
            created_at INTEGER NOT NULL
        );

        -- Issuer authorization flags; absent row = not authorized
        CREATE TABLE issuers (
            identity BLOB PRIMARY KEY,        -- 32 bytes
            authorized INTEGER NOT NULL,      -- 0/1
            nonce INTEGER NOT NULL DEFAULT 0  -- issuance counter
        );

        -- Certificate records; only `revoked` changes after insert
        CREATE TABLE certificates (
            certificate_id BLOB PRIMARY KEY,  -- 32 bytes, BLAKE3 fingerprint
            issuer BLOB NOT NULL,             -- 32 bytes
            certificate_name TEXT NOT NULL,
            recipient_name TEXT NOT NULL,
            issued_at INTEGER NOT NULL,       -- Unix seconds
            revoked INTEGER NOT NULL DEFAULT 0
        );

        -- Append-only notification log
        CREATE TABLE events (
            seq INTEGER PRIMARY KEY,          -- 1-based, gap-free
            kind TEXT NOT NULL,
            certificate_id BLOB,              -- set for certificate events
            body BLOB NOT NULL,               -- CBOR-encoded RegistryEvent
            recorded_at INTEGER NOT NULL
        );

        CREATE INDEX idx_certificates_issuer ON certificates(issuer, issued_at);
        CREATE INDEX idx_events_certificate ON events(certificate_id);
        "#,
    )?;

    Ok(())
}

/// Migration v2: replay protection for signed requests.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Highest request nonce accepted per signer
        CREATE TABLE request_nonces (
            identity BLOB PRIMARY KEY,        -- 32 bytes
            last_nonce INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}

pub(crate) fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "registry_admin",
            "issuers",
            "certificates",
            "events",
            "request_nonces",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }

    #[test]
    fn test_v1_database_upgrades() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL);
             INSERT INTO schema_migrations (version, applied_at) VALUES (1, 0);",
        )
        .unwrap();
        apply_v1(&conn).unwrap();

        migrate(&mut conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='request_nonces'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
