//! Generative-model boundary
//!
//! The orchestrator only sees [`GenerativeModel`]: opaque prompt text in,
//! response text out, or a typed [`LlmError`]. Tests substitute mock
//! implementations; production wires in [`GeminiClient`].

mod error;
mod gemini;

pub use error::LlmError;
pub use gemini::GeminiClient;

use async_trait::async_trait;

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
