//! Remote record store integration tests against a mock contents API.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use folio_tracker::models::Portfolio;
use folio_tracker::store::{RecordStore, RemoteConfig, RemoteStore, StoreError};

const DOCUMENT_PATH: &str = "/repos/user/portfolios/contents/data/portfolios.json";

fn store_for(server: &MockServer) -> RemoteStore {
    RemoteStore::new(RemoteConfig {
        repo: "user/portfolios".to_string(),
        branch: "main".to_string(),
        path: "data/portfolios.json".to_string(),
        token: "test-token".to_string(),
        api_base: server.uri(),
    })
    .unwrap()
}

fn encoded(portfolios: &[Portfolio]) -> String {
    BASE64.encode(serde_json::to_string_pretty(portfolios).unwrap())
}

#[tokio::test]
async fn missing_document_fetches_as_empty_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOCUMENT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (portfolios, token) = store_for(&server).fetch().await.unwrap();
    assert!(portfolios.is_empty());
    assert!(token.is_none());
}

#[tokio::test]
async fn fetch_decodes_the_document_and_returns_its_token() {
    let stored = vec![Portfolio::new("Main".to_string(), "BRL".to_string())];

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOCUMENT_PATH))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": encoded(&stored),
            "sha": "abc123",
            "encoding": "base64",
        })))
        .mount(&server)
        .await;

    let (portfolios, token) = store_for(&server).fetch().await.unwrap();
    assert_eq!(portfolios, stored);
    assert_eq!(token.unwrap().as_str(), "abc123");
}

#[tokio::test]
async fn fetch_handles_newline_wrapped_base64() {
    let stored = vec![Portfolio::new("Main".to_string(), "BRL".to_string())];
    let mut wrapped = String::new();
    for chunk in encoded(&stored).into_bytes().chunks(60) {
        wrapped.push_str(std::str::from_utf8(chunk).unwrap());
        wrapped.push('\n');
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOCUMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": wrapped,
            "sha": "abc123",
        })))
        .mount(&server)
        .await;

    let (portfolios, _) = store_for(&server).fetch().await.unwrap();
    assert_eq!(portfolios, stored);
}

#[tokio::test]
async fn fetch_maps_invalid_credentials_to_permission() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOCUMENT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&server)
        .await;

    let err = store_for(&server).fetch().await.unwrap_err();
    assert!(matches!(err, StoreError::Permission(_)));
}

#[tokio::test]
async fn replace_returns_the_new_token() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(DOCUMENT_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "content": { "sha": "def456" },
        })))
        .mount(&server)
        .await;

    let portfolios = vec![Portfolio::new("Main".to_string(), "BRL".to_string())];
    let token = store_for(&server)
        .replace(&portfolios, None)
        .await
        .unwrap();
    assert_eq!(token.unwrap().as_str(), "def456");
}

#[tokio::test]
async fn replace_with_a_stale_token_is_a_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(DOCUMENT_PATH))
        .respond_with(ResponseTemplate::new(409).set_body_string("is at 111 but expected 222"))
        .mount(&server)
        .await;

    let portfolios = vec![Portfolio::new("Main".to_string(), "BRL".to_string())];
    let err = store_for(&server)
        .replace(&portfolios, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict));
}

#[tokio::test]
async fn replace_without_write_access_is_a_permission_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(DOCUMENT_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("Resource not accessible"))
        .mount(&server)
        .await;

    let portfolios = vec![Portfolio::new("Main".to_string(), "BRL".to_string())];
    let err = store_for(&server)
        .replace(&portfolios, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Permission(_)));
}

#[tokio::test]
async fn unexpected_statuses_surface_as_backend_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOCUMENT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = store_for(&server).fetch().await.unwrap_err();
    match err {
        StoreError::Backend { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Backend error, got {:?}", other),
    }
}
