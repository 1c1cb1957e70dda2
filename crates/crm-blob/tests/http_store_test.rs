//! Contract tests for HttpBlobStore.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | PUT | `/{bucket}/{key}` | `put_*` |
//! | DELETE | `/{bucket}/{key}` | `delete_*` |

use bytes::Bytes;
use crm_blob::{BlobConfig, BlobError, BlobStore, HttpBlobStore, RetryPolicy};
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_store(server: &MockServer) -> HttpBlobStore {
    let config = BlobConfig::local_mock(&server.uri(), "test-token").unwrap();
    HttpBlobStore::new(config).unwrap()
}

// ── PUT /{bucket}/{key} ──────────────────────────────────────────────

#[tokio::test]
async fn put_sends_bytes_with_auth_and_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/test-bucket/leads/abc/quote.pdf"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "application/pdf"))
        .and(body_bytes(b"%PDF-1.4".to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store(&server);
    let blob = store
        .put(
            "leads/abc/quote.pdf",
            Bytes::from_static(b"%PDF-1.4"),
            "application/pdf",
        )
        .await
        .unwrap();

    assert_eq!(blob.storage_id, "leads/abc/quote.pdf");
    assert_eq!(
        blob.url,
        format!("{}/test-bucket/leads/abc/quote.pdf", server.uri())
    );
}

#[tokio::test]
async fn put_server_error_is_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/test-bucket/tasks/t1/big.png"))
        .respond_with(ResponseTemplate::new(507).set_body_string("quota exceeded"))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store(&server);
    let err = store
        .put("tasks/t1/big.png", Bytes::from_static(b"png"), "image/png")
        .await
        .unwrap_err();

    match err {
        BlobError::Api { status, body, .. } => {
            assert_eq!(status, 507);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn put_retries_while_gateway_is_busy() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/test-bucket/leads/abc/brief.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/test-bucket/leads/abc/brief.pdf"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store(&server).with_retry(RetryPolicy::immediate(2));
    let blob = store
        .put("leads/abc/brief.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
        .await
        .unwrap();
    assert_eq!(blob.storage_id, "leads/abc/brief.pdf");
}

// ── DELETE /{bucket}/{key} ───────────────────────────────────────────

#[tokio::test]
async fn delete_succeeds_on_204() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/test-bucket/contacts/c1/logo.png"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store(&server);
    store.delete("contacts/c1/logo.png").await.unwrap();
}

#[tokio::test]
async fn delete_missing_object_is_ok() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/test-bucket/contacts/c1/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store(&server);
    assert!(store.delete("contacts/c1/gone.png").await.is_ok());
}

#[tokio::test]
async fn delete_forbidden_is_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/test-bucket/chargeables/x/a.pdf"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store(&server);
    let err = store.delete("chargeables/x/a.pdf").await.unwrap_err();
    assert!(matches!(err, BlobError::Api { status: 403, .. }));
}
