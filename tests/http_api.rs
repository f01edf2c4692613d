//! Integration tests for the HTTP API
//!
//! Drives the router in-process with a scripted model so no network or
//! API key is needed.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use minjo_server::chat::ChatService;
use minjo_server::context::HolidayClient;
use minjo_server::llm::{GenerativeModel, LlmError};
use minjo_server::server::{router, AppState};
use minjo_server::session::SessionStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct ScriptedModel {
    result: Result<String, LlmError>,
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.result.clone()
    }
}

fn test_app(dir: &std::path::Path, result: Result<String, LlmError>) -> axum::Router {
    let store = Arc::new(SessionStore::new(dir));
    let chat = ChatService::new(
        Arc::clone(&store),
        Arc::new(ScriptedModel { result }),
        // Unreachable endpoint: holiday lookup fails fast and is ignored.
        Arc::new(HolidayClient::new("http://127.0.0.1:9/api")),
    );
    router(Arc::new(AppState {
        chat,
        store,
        model_name: "gemini-2.5-flash".to_string(),
    }))
}

async fn send_json(app: axum::Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn root_describes_service() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("x".into()));

    let (status, body) = get_json(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["codename"], json!("Minjo"));
    assert_eq!(body["model"], json!("gemini-2.5-flash"));
}

#[tokio::test]
async fn chat_returns_answer() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(
        dir.path(),
        Ok("Halo! Ada project apa yang bisa saya bantu?".into()),
    );

    let (status, body) = send_json(
        app,
        Method::POST,
        "/chat",
        json!({"sessionId": "alpha", "question": "Halo, bisa bantu skripsi?"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.contains("Ada project apa"));
}

#[tokio::test]
async fn chat_is_served_on_api_prefix_too() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("Siap, dicatat ya.".into()));

    let (status, body) = send_json(
        app,
        Method::POST,
        "/api/chat",
        json!({"sessionId": "alpha", "question": "Butuh web kasir"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn blank_session_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("x".into()));

    let (status, body) = send_json(
        app,
        Method::POST,
        "/chat",
        json!({"sessionId": "   ", "question": "Halo"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["error"], json!("missing_session_id"));
}

#[tokio::test]
async fn missing_question_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("x".into()));

    let (status, body) = send_json(
        app,
        Method::POST,
        "/chat",
        json!({"sessionId": "alpha"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("missing_question"));
}

#[tokio::test]
async fn malformed_json_is_invalid_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("x".into()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_request"));
}

#[tokio::test]
async fn missing_api_key_maps_to_500() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Err(LlmError::MissingApiKey));

    let (status, body) = send_json(
        app,
        Method::POST,
        "/chat",
        json!({"sessionId": "alpha", "question": "Halo"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("missing_api_key"));
}

#[tokio::test]
async fn connection_reset_maps_to_503() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(
        dir.path(),
        Err(LlmError::ConnectionReset("read ECONNRESET".into())),
    );

    let (status, body) = send_json(
        app,
        Method::POST,
        "/chat",
        json!({"sessionId": "alpha", "question": "Halo"}),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], json!("upstream_connection_reset"));
    assert!(body["detail"].as_str().unwrap().contains("Koneksi"));
}

#[tokio::test]
async fn rate_limit_maps_to_429() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(
        dir.path(),
        Err(LlmError::RateLimited("quota exceeded".into())),
    );

    let (status, body) = send_json(
        app,
        Method::POST,
        "/chat",
        json!({"sessionId": "alpha", "question": "Halo"}),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], json!("rate_limit_exceeded"));
}

#[tokio::test]
async fn upstream_error_maps_to_502() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(
        dir.path(),
        Err(LlmError::Upstream("HTTP 500 from model".into())),
    );

    let (status, body) = send_json(
        app,
        Method::POST,
        "/chat",
        json!({"sessionId": "alpha", "question": "Halo"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], json!("upstream_error"));
    // The provider message must not leak to clients.
    let detail = body["detail"].as_str().unwrap();
    assert!(!detail.contains("HTTP 500 from model"));
    assert_eq!(detail, "Gagal mendapatkan respons dari AI. Silakan coba lagi.");
}

#[tokio::test]
async fn sessions_lists_saved_conversations() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("Baik, saya catat.".into()));

    let (status, _) = send_json(
        app.clone(),
        Method::POST,
        "/chat",
        json!({"sessionId": "alpha", "question": "Butuh aplikasi kasir"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_json(app, "/sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["sessionId"], json!("alpha"));
    assert_eq!(sessions[0]["messageCount"], json!(2));
    assert_eq!(sessions[0]["lastRole"], json!("assistant"));
}

#[tokio::test]
async fn delete_reports_deleted_and_missing() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("Oke.".into()));

    send_json(
        app.clone(),
        Method::POST,
        "/chat",
        json!({"sessionId": "alpha", "question": "Halo"}),
    )
    .await;

    let (status, body) = send_json(
        app,
        Method::DELETE,
        "/sessions",
        json!({"sessionIds": ["alpha", "ghost"]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["deleted"], json!(["alpha"]));
    assert_eq!(body["missing"], json!(["ghost"]));
    assert_eq!(body["errors"], json!([]));
}

#[tokio::test]
async fn delete_failure_yields_multi_status() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("Oke.".into()));

    send_json(
        app.clone(),
        Method::POST,
        "/chat",
        json!({"sessionId": "ok", "question": "Halo"}),
    )
    .await;
    // A directory at the record path makes remove_file fail for that id.
    std::fs::create_dir(dir.path().join("stuck.json")).unwrap();

    let (status, body) = send_json(
        app,
        Method::DELETE,
        "/sessions",
        json!({"sessionIds": ["ok", "stuck"]}),
    )
    .await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["deleted"], json!(["ok"]));
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["sessionId"], json!("stuck"));
}

#[tokio::test]
async fn delete_without_ids_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Ok("x".into()));

    let (status, body) = send_json(
        app.clone(),
        Method::DELETE,
        "/sessions",
        json!({"sessionIds": []}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("empty_session_ids"));

    let (status, body) = send_json(app, Method::DELETE, "/sessions", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_payload"));
}
