//! Typed errors for generative-model calls
//!
//! The orchestrator maps each variant to a distinct HTTP error kind, so the
//! classification here is the single place upstream failures are interpreted.
//! None of these are retried automatically.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// No API key configured. Operator-fixable only; surfaced as HTTP 500.
    #[error("missing Gemini API key")]
    MissingApiKey,

    /// Transient network failure reaching the provider (HTTP 503).
    #[error("connection to the model provider was reset: {0}")]
    ConnectionReset(String),

    /// Provider throttling (HTTP 429). The caller should back off.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider refused the content on safety grounds (HTTP 400).
    /// Not retryable with the same input.
    #[error("content blocked by the model provider: {0}")]
    ContentBlocked(String),

    /// Catch-all provider failure (HTTP 502).
    #[error("upstream model error: {0}")]
    Upstream(String),
}

impl LlmError {
    /// Classify an HTTP-level provider response.
    pub fn from_response(status: reqwest::StatusCode, body: String) -> Self {
        if status.as_u16() == 429 {
            return LlmError::RateLimited(body);
        }
        Self::from_message(status.as_u16(), body)
    }

    /// Classify by error-body text, the way the upstream SDK reports failures.
    fn from_message(status: u16, message: String) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("quota") || lowered.contains("rate limit") {
            LlmError::RateLimited(message)
        } else if lowered.contains("safety") || lowered.contains("blocked") {
            LlmError::ContentBlocked(message)
        } else {
            LlmError::Upstream(format!("HTTP {status}: {message}"))
        }
    }

    /// Classify transport errors from reqwest.
    pub fn from_network(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            LlmError::ConnectionReset(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_response(status, e.to_string())
        } else {
            LlmError::Upstream(e.to_string())
        }
    }
}
