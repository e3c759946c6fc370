//! Provider Traits
//!
//! Trait definitions for LLM provider adapters. The routing layer works
//! against this abstraction so local servers (Ollama, LM Studio) and hosted
//! APIs are interchangeable behind a common contract.
//!
//! # Design Philosophy
//!
//! Adapters handle provider-specific details (API shapes, auth, token
//! accounting); the router only sees `process_request`, a health probe, and
//! best-effort shutdown.

use async_trait::async_trait;
use thiserror::Error;

use crate::routing::{GenerationRequest, ProjectContext, ProviderKind};

/// Token accounting reported by a provider, when available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Usage {
    /// Total tokens consumed by the request (prompt + completion)
    pub total_tokens: u64,
}

/// Response from a completed provider request.
#[derive(Clone, Debug)]
pub struct ProviderResponse {
    /// Generated text
    pub content: String,
    /// Model that produced the response
    pub model: String,
    /// Token accounting, if the backend reported it
    pub usage: Option<Usage>,
}

/// Errors produced by provider adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, TLS, read)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status
    #[error("backend returned {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body (may be truncated)
        body: String,
    },

    /// Backend rejected the input itself (HTTP 400). Not provider-specific:
    /// the executor will not retry this against other candidates.
    #[error("input rejected by backend: {0}")]
    Validation(String),

    /// Response body did not match the expected shape
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// Required API key environment variable is absent or empty
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
}

impl ProviderError {
    /// Whether this failure is validation-classified (stops the fallback
    /// chain instead of moving to the next candidate).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// LLM provider adapter contract.
///
/// Implementations must be cheap to share (`Arc`) and safe to call
/// concurrently.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which backend this adapter fronts.
    fn kind(&self) -> ProviderKind;

    /// Model identifier requests are sent with.
    fn model_name(&self) -> &str;

    /// Execute one generation request.
    async fn process_request(
        &self,
        request: &GenerationRequest,
        context: Option<&ProjectContext>,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Probe backend reachability. An error means the probe failed; the
    /// registry maps that to `false` rather than propagating.
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Best-effort cleanup. Adapters holding only an HTTP client have
    /// nothing to release; the default is a no-op.
    async fn shutdown(&self) {}
}

/// Render the shared prompt text sent to every backend: the optional
/// project-context header followed by the user prompt.
pub(crate) fn render_prompt(request: &GenerationRequest, context: Option<&ProjectContext>) -> String {
    match context {
        Some(ctx) if !ctx.files.is_empty() => {
            let mut prompt = String::from("Project files in scope:\n");
            for file in &ctx.files {
                prompt.push_str("- ");
                prompt.push_str(file);
                prompt.push('\n');
            }
            prompt.push('\n');
            prompt.push_str(&request.prompt);
            prompt
        }
        _ => request.prompt.clone(),
    }
}
