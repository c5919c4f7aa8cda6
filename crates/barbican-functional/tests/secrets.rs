//! Secret functional tests against the in-memory service

use barbican_client::{EntityState, Error, NewSecret, SecretPayload};
use barbican_functional::{CleanUp, MockBarbican};
use chrono::{TimeZone, Utc};

/// Initialize tracing for tests
fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("barbican_client=debug,barbican_functional=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_store_get_and_delete_text_secret() {
    init_test();
    let mock = MockBarbican::new();
    let client = mock.client();
    let mut cleanup = CleanUp::new(client.clone());

    let mut secret = client
        .secrets
        .create(NewSecret {
            algorithm: Some("aes".to_string()),
            bit_length: Some(256),
            mode: Some("cbc".to_string()),
            ..NewSecret::new("db-password", "hunter2")
        })
        .unwrap();
    let secret_ref = cleanup.store_secret(&mut secret).await.unwrap();
    assert_eq!(secret.state(), EntityState::Submitted);

    let mut fetched = client.secrets.get(&secret_ref).unwrap();
    assert_eq!(fetched.name().await.unwrap().as_deref(), Some("db-password"));
    assert_eq!(fetched.bit_length().await.unwrap(), Some(256));
    assert_eq!(fetched.secret_type().await.unwrap().as_deref(), Some("opaque"));
    assert_eq!(fetched.status().await.unwrap().as_deref(), Some("ACTIVE"));
    assert_eq!(
        fetched.payload().await.unwrap().cloned(),
        Some(SecretPayload::Text("hunter2".to_string()))
    );

    cleanup.delete_all_entities().await.unwrap();
    assert_eq!(mock.secret_count(), 0);

    let mut gone = client.secrets.get(&secret_ref).unwrap();
    assert!(gone.name().await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_binary_payload_round_trip() {
    init_test();
    let mock = MockBarbican::new();
    let client = mock.client();
    let bytes = vec![0u8, 159, 146, 150, 255];

    let mut secret = client
        .secrets
        .create(NewSecret::new("blob", bytes.clone()))
        .unwrap();
    let secret_ref = secret.store().await.unwrap();
    assert_eq!(mock.stored_payload(&secret_ref), Some(bytes.clone()));

    let mut fetched = client.secrets.get(&secret_ref).unwrap();
    assert_eq!(
        fetched.payload_content_type().await.unwrap().as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(
        fetched.payload().await.unwrap().cloned(),
        Some(SecretPayload::Binary(bytes))
    );
}

#[tokio::test]
async fn test_lazy_secret_loads_once() {
    init_test();
    let mock = MockBarbican::new();
    let client = mock.client();
    let secret_ref = client
        .secrets
        .create(NewSecret::new("lazy", "value"))
        .unwrap()
        .store()
        .await
        .unwrap();
    mock.reset_counts();

    let mut secret = client.secrets.get(&secret_ref).unwrap();
    assert_eq!(mock.request_count(), 0);
    assert!(!secret.is_loaded());

    secret.name().await.unwrap();
    secret.created().await.unwrap();
    secret.algorithm().await.unwrap();
    assert!(secret.is_loaded());
    assert_eq!(secret.state(), EntityState::Loaded);
    assert_eq!(mock.get_count(), 1);
}

#[tokio::test]
async fn test_stored_secret_is_immutable() {
    init_test();
    let mock = MockBarbican::new();
    let client = mock.client();

    let mut secret = client
        .secrets
        .create(NewSecret::new("frozen", "value"))
        .unwrap();
    secret.set_mode("ctr").unwrap();
    secret.store().await.unwrap();

    assert!(matches!(secret.set_name("other"), Err(Error::Immutable { .. })));
    assert!(matches!(secret.set_payload("other"), Err(Error::Immutable { .. })));
    assert!(matches!(
        secret.set_attribute("status", "DELETED"),
        Err(Error::ReadOnlyAttribute { .. })
    ));
    assert!(matches!(
        secret.store().await,
        Err(Error::AlreadySubmitted { .. })
    ));
    assert_eq!(mock.secret_count(), 1);
}

#[tokio::test]
async fn test_expiration_is_stored() {
    init_test();
    let mock = MockBarbican::new();
    let client = mock.client();
    let expiration = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();

    let secret_ref = client
        .secrets
        .create(NewSecret {
            expiration: Some(expiration),
            ..NewSecret::new("expiring", "value")
        })
        .unwrap()
        .store()
        .await
        .unwrap();

    let mut fetched = client.secrets.get(&secret_ref).unwrap();
    assert_eq!(fetched.expiration().await.unwrap(), Some(expiration));
}

#[tokio::test]
async fn test_delete_errors() {
    init_test();
    let mock = MockBarbican::new();
    let client = mock.client();

    assert!(matches!(
        client.secrets.delete("").await,
        Err(Error::MissingReference { .. })
    ));
    assert!(matches!(
        client.secrets.delete("not-a-ref").await,
        Err(Error::InvalidReference { .. })
    ));
    assert_eq!(mock.request_count(), 0);

    let secret_ref = client
        .secrets
        .create(NewSecret::new("once", "value"))
        .unwrap()
        .store()
        .await
        .unwrap();
    client.secrets.delete(&secret_ref).await.unwrap();
    assert!(client
        .secrets
        .delete(&secret_ref)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_server_failure_surfaces_as_http_error() {
    init_test();
    let mock = MockBarbican::new();
    let client = mock.client();
    mock.set_fail_requests(true);

    let err = client
        .secrets
        .create(NewSecret::new("x", "y"))
        .unwrap()
        .store()
        .await
        .unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(err.kind(), "HTTPServerError");
}
