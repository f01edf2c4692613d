//! HTTP surface for the assistant
//!
//! JSON in, `{ok, ...}` envelopes out. Every failure path maps to a typed
//! error kind and status code; nothing here panics the process.

use crate::chat::{ChatError, ChatService};
use crate::llm::LlmError;
use crate::session::SessionStore;
use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state
pub struct AppState {
    pub chat: ChatService,
    pub store: Arc<SessionStore>,
    pub model_name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ChatRequest {
    session_id: String,
    question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteSessionsRequest {
    session_ids: Vec<String>,
}

fn error_response(status: StatusCode, kind: &str, detail: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "ok": false, "error": kind, "detail": detail.into() })),
    )
        .into_response()
}

fn map_chat_error(err: ChatError) -> Response {
    match err {
        ChatError::MissingSessionId => error_response(
            StatusCode::BAD_REQUEST,
            "missing_session_id",
            "sessionId is required",
        ),
        ChatError::MissingQuestion => error_response(
            StatusCode::BAD_REQUEST,
            "missing_question",
            "question is required",
        ),
        ChatError::Llm(llm) => match llm {
            LlmError::MissingApiKey => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "missing_api_key", llm.to_string())
            }
            LlmError::ConnectionReset(_) => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "upstream_connection_reset",
                "Koneksi ke layanan AI terputus. Coba lagi nanti.",
            ),
            LlmError::RateLimited(_) => error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                "Terlalu banyak permintaan. Silakan coba lagi sebentar.",
            ),
            LlmError::ContentBlocked(_) => error_response(
                StatusCode::BAD_REQUEST,
                "content_blocked",
                "Konten tidak dapat diproses karena kebijakan keamanan.",
            ),
            LlmError::Upstream(detail) => {
                // The raw provider message stays in the logs, not on the wire.
                tracing::error!("upstream model failure: {detail}");
                error_response(
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "Gagal mendapatkan respons dari AI. Silakan coba lagi.",
                )
            }
        },
    }
}

/// Build the router. Split from [`run`] so tests can drive it in-process.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(describe_service))
        .route("/chat", post(handle_chat))
        .route("/api/chat", post(handle_chat))
        .route("/sessions", get(list_sessions).delete(delete_sessions))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!("minjo assistant listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn describe_service(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "service": "Jokipremium Assistant",
        "codename": "Minjo",
        "role": "System Analyst + Customer Service",
        "model": state.model_name,
        "sessionStorage": format!("{}/<sessionId>.json", state.store.dir().display()),
        "note": "POST /chat { sessionId, question }",
    }))
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                rejection.body_text(),
            );
        }
    };

    match state.chat.handle(&req.session_id, &req.question).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "answer": outcome.answer })),
        )
            .into_response(),
        Err(err) => map_chat_error(err),
    }
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> Response {
    let sessions = state.store.list_sessions();
    (
        StatusCode::OK,
        Json(json!({ "ok": true, "sessions": sessions })),
    )
        .into_response()
}

async fn delete_sessions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteSessionsRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                "Body must include array field sessionIds.",
            );
        }
    };

    if !req.session_ids.iter().any(|id| !id.trim().is_empty()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "empty_session_ids",
            "Provide at least one session id to delete.",
        );
    }

    let outcome = state.store.delete_sessions(&req.session_ids);
    state.chat.release_locks(&outcome.deleted);
    let all_ok = outcome.errors.is_empty();
    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };

    (
        status,
        Json(json!({
            "ok": all_ok,
            "deleted": outcome.deleted,
            "missing": outcome.missing,
            "errors": outcome.errors,
        })),
    )
        .into_response()
}
