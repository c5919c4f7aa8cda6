//! HttpTransport tests against a wiremock server

use barbican_client::{Error, HttpTransport, HttpTransportConfig, Transport};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("barbican_client=debug")
        .with_test_writer()
        .try_init();
}

fn transport(server: &MockServer) -> HttpTransport {
    HttpTransport::new(
        HttpTransportConfig::new(server.uri())
            .with_project_id("project-1")
            .with_auth_token("token-1"),
    )
    .unwrap()
}

#[tokio::test]
async fn test_collection_paths_and_default_headers() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets/"))
        .and(header("X-Auth-Token", "token-1"))
        .and(header("X-Project-Id", "project-1"))
        .and(header("Accept", "application/json"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "secrets": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let body = transport(&server)
        .get("secrets", &[("limit".to_string(), "10".to_string())])
        .await
        .unwrap();
    assert_eq!(body, json!({ "secrets": [] }));
}

#[tokio::test]
async fn test_full_urls_are_not_rewritten() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "type": "key" })))
        .expect(1)
        .mount(&server)
        .await;

    let href = format!("{}/v1/orders/abc", server.uri());
    let body = transport(&server).get(&href, &[]).await.unwrap();
    assert_eq!(body["type"], "key");
}

#[tokio::test]
async fn test_post_sends_json_body() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/secrets/"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({ "name": "x" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "secret_ref": "ref" })))
        .expect(1)
        .mount(&server)
        .await;

    let body = transport(&server)
        .post("secrets", &json!({ "name": "x" }))
        .await
        .unwrap();
    assert_eq!(body["secret_ref"], "ref");
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/containers/"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let body = transport(&server).post("containers", &json!({})).await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn test_not_found_uses_json_title() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "title": "Not Found", "description": "No such secret" })),
        )
        .mount(&server)
        .await;

    let err = transport(&server).get("secrets", &[]).await.unwrap_err();
    match err {
        Error::NotFound { message, .. } => assert_eq!(message, "Not Found"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_status_classes() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Authentication required"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "description": "Bad limit" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/cas/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let t = transport(&server);

    let auth = t.get("secrets", &[]).await.unwrap_err();
    assert!(auth.is_auth_error());
    assert_eq!(auth.to_string(), "HTTP 401: Authentication required");

    let client = t.get("orders", &[]).await.unwrap_err();
    assert!(client.is_client_error());
    assert!(!client.is_auth_error());
    assert_eq!(client.to_string(), "HTTP 400: Bad limit");

    let server_err = t.get("cas", &[]).await.unwrap_err();
    assert!(server_err.is_server_error());
    assert_eq!(server_err.status(), Some(503));
}

#[tokio::test]
async fn test_get_raw_sends_accept_header() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secrets/abc/payload"))
        .and(header("Accept", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 159, 146, 150]))
        .expect(1)
        .mount(&server)
        .await;

    let href = format!("{}/v1/secrets/abc/payload", server.uri());
    let bytes = transport(&server)
        .get_raw(&href, "application/octet-stream")
        .await
        .unwrap();
    assert_eq!(bytes, vec![0u8, 159, 146, 150]);
}

#[tokio::test]
async fn test_delete_with_body() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/containers/abc/consumers/"))
        .and(body_json(json!({ "name": "lb", "URL": "http://lb" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    transport(&server)
        .delete(
            "containers/abc/consumers",
            Some(&json!({ "name": "lb", "URL": "http://lb" })),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_headers_are_omitted_when_not_configured() {
    init_test();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists("X-Auth-Token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let anonymous = HttpTransport::new(HttpTransportConfig::new(server.uri())).unwrap();
    anonymous.get("secrets", &[]).await.unwrap();
}
