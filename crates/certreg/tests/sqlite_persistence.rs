//! Registry state survives closing and reopening a SQLite database.

use std::sync::Arc;

use certreg::store::SqliteStore;
use certreg::{
    ErrorKind, IdDerivation, Keypair, ManualClock, Registry, RegistryConfig, RegistryEvent, Request,
};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn state_survives_reopen() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.db");

    let admin = Keypair::from_seed(&[0xAD; 32]);
    let issuer = Keypair::from_seed(&[0x15; 32]);

    let (kept, revoked) = {
        let registry = Registry::create(
            SqliteStore::open(&path).unwrap(),
            admin.identity(),
            RegistryConfig::default(),
        )
        .await
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(1_700_000_000)));

        registry
            .authorize_issuer(&admin.caller(), issuer.identity())
            .await
            .unwrap();
        let kept = registry
            .issue_certificate(&issuer.caller(), "Degree", "Jane Doe")
            .await
            .unwrap();
        let revoked = registry
            .issue_certificate(&issuer.caller(), "Degree", "Jane Doe")
            .await
            .unwrap();
        registry
            .revoke_certificate(&issuer.caller(), &revoked)
            .await
            .unwrap();
        (kept, revoked)
    };

    let registry = Registry::open(SqliteStore::open(&path).unwrap(), RegistryConfig::default())
        .await
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(1_700_000_000)));

    assert_eq!(registry.admin(), admin.identity());
    assert!(registry.is_authorized_issuer(&issuer.identity()).await.unwrap());
    assert!(registry.verify_certificate(&kept).await.unwrap().valid);
    assert!(!registry.verify_certificate(&revoked).await.unwrap().valid);
    assert_eq!(registry.certificate_count().await.unwrap(), 2);

    let events = registry.events_since(0).await.unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(
        events[3].event,
        RegistryEvent::CertificateRevoked {
            id: revoked,
            issuer: issuer.identity(),
        }
    );

    // The issuance counter persisted too: the same inputs at the same
    // instant still derive a fresh id.
    let third = registry
        .issue_certificate(&issuer.caller(), "Degree", "Jane Doe")
        .await
        .unwrap();
    assert_ne!(third, kept);
    assert_ne!(third, revoked);
    assert_eq!(registry.events_since(4).await.unwrap()[0].seq, 5);
}

#[tokio::test]
async fn create_on_foreign_database_fails() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.db");

    let admin = Keypair::from_seed(&[0xAD; 32]);
    let usurper = Keypair::from_seed(&[0xEE; 32]);

    Registry::create(
        SqliteStore::open(&path).unwrap(),
        admin.identity(),
        RegistryConfig::default(),
    )
    .await
    .unwrap();

    let err = Registry::create(
        SqliteStore::open(&path).unwrap(),
        usurper.identity(),
        RegistryConfig::default(),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);

    // The rightful administrator can create again; it is a reopen.
    let registry = Registry::create(
        SqliteStore::open(&path).unwrap(),
        admin.identity(),
        RegistryConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(registry.admin(), admin.identity());
}

#[tokio::test]
async fn open_on_empty_database_is_not_initialized() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("empty.db")).unwrap();

    let err = Registry::open(store, RegistryConfig::default())
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::NotInitialized);
}

/// Two registries on one database file, as two processes would have.
async fn two_handles(
    path: &std::path::Path,
    admin: &Keypair,
    config: RegistryConfig,
) -> (Registry<SqliteStore>, Registry<SqliteStore>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let a = Registry::create(SqliteStore::open(path).unwrap(), admin.identity(), config.clone())
        .await
        .unwrap()
        .with_clock(clock.clone());
    let b = Registry::open(SqliteStore::open(path).unwrap(), config)
        .await
        .unwrap()
        .with_clock(clock);
    (a, b)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_revocations_across_handles_apply_once() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.db");
    let admin = Keypair::from_seed(&[0xAD; 32]);
    let issuer = Keypair::from_seed(&[0x15; 32]);
    let (a, b) = two_handles(&path, &admin, RegistryConfig::default()).await;

    a.authorize_issuer(&admin.caller(), issuer.identity())
        .await
        .unwrap();

    for _ in 0..10 {
        let id = a
            .issue_certificate(&issuer.caller(), "Degree", "Jane Doe")
            .await
            .unwrap();

        let caller = issuer.caller();
        let (ra, rb) = tokio::join!(
            a.revoke_certificate(&caller, &id),
            b.revoke_certificate(&caller, &id)
        );

        let mut kinds: Vec<_> = [ra, rb]
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.kind()))
            .collect();
        assert_eq!(kinds.len(), 1, "exactly one revocation must succeed");
        assert_eq!(kinds.pop(), Some(ErrorKind::AlreadyRevoked));

        let revocations = a
            .events_since(0)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.event == RegistryEvent::CertificateRevoked { id, issuer: issuer.identity() })
            .count();
        assert_eq!(revocations, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn colliding_issuance_across_handles_never_overwrites() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.db");
    let admin = Keypair::from_seed(&[0xAD; 32]);
    let issuer = Keypair::from_seed(&[0x15; 32]);
    let config = RegistryConfig {
        id_derivation: IdDerivation::Plain,
        ..RegistryConfig::default()
    };
    let (a, b) = two_handles(&path, &admin, config).await;

    a.authorize_issuer(&admin.caller(), issuer.identity())
        .await
        .unwrap();

    for round in 0..10 {
        let recipient = format!("Recipient {}", round);
        let caller = issuer.caller();
        let (ra, rb) = tokio::join!(
            a.issue_certificate(&caller, "Degree", &recipient),
            b.issue_certificate(&caller, "Degree", &recipient)
        );

        let (id, err) = match (ra, rb) {
            (Ok(id), Err(err)) | (Err(err), Ok(id)) => (id, err),
            (ra, rb) => panic!("expected one success and one collision, got {:?} / {:?}", ra, rb),
        };
        assert_eq!(err.kind(), ErrorKind::IdCollision);

        let issued = a
            .events_since(0)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.event.certificate_id() == Some(id))
            .count();
        assert_eq!(issued, 1);
    }
    assert_eq!(a.certificate_count().await.unwrap(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn signed_request_replayed_on_second_handle_is_rejected() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.db");
    let admin = Keypair::from_seed(&[0xAD; 32]);
    let issuer = Keypair::from_seed(&[0x15; 32]);
    let (a, b) = two_handles(&path, &admin, RegistryConfig::default()).await;

    let signed = admin
        .sign_request(
            Request::AuthorizeIssuer {
                issuer: issuer.identity(),
            },
            1,
        )
        .unwrap();

    let (ra, rb) = tokio::join!(a.submit(&signed), b.submit(&signed));
    let failures: Vec<_> = [ra, rb]
        .into_iter()
        .filter_map(|r| r.err().map(|e| e.kind()))
        .collect();
    assert_eq!(failures, vec![ErrorKind::Unauthorized]);
    assert_eq!(a.events_since(0).await.unwrap().len(), 1);
    assert_eq!(b.last_request_nonce(&admin.identity()).await.unwrap(), 1);
}
