//! Router Error Types
//!
//! The error taxonomy for the routing layer. Per-attempt failures
//! ([`RouterError::ProviderRequest`], [`RouterError::Timeout`]) are caught
//! and recorded by the executor and never surface individually; only
//! validation failures and chain exhaustion reach the caller.

use thiserror::Error;

use super::config::ProviderKind;
use crate::provider::ProviderError;

/// Errors produced by the routing layer.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Input rejected before any provider was contacted. Never retried
    /// across providers.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A provider failed to construct at startup. Logged and excluded;
    /// fatal only when it empties the registry.
    #[error("provider {provider} failed to initialize: {message}")]
    ProviderInit {
        /// Provider that failed to construct
        provider: ProviderKind,
        /// Construction failure detail
        message: String,
    },

    /// Zero providers survived initialization.
    #[error("no providers available")]
    NoProviders,

    /// A single attempt against one provider failed.
    #[error("provider {provider} request failed: {message}")]
    ProviderRequest {
        /// Provider the attempt ran against
        provider: ProviderKind,
        /// Backend failure detail
        message: String,
    },

    /// An attempt exceeded its timeout budget.
    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout {
        /// Provider the attempt ran against
        provider: ProviderKind,
        /// Budget that was exceeded
        timeout_ms: u64,
    },

    /// Every candidate in the fallback chain failed.
    #[error("all {attempts} provider(s) failed; last error from {last_provider}: {last_error}")]
    AllProvidersFailed {
        /// Number of attempts made
        attempts: usize,
        /// Provider of the final attempt
        last_provider: ProviderKind,
        /// Failure message of the final attempt
        last_error: String,
    },

    /// The overflow queue is at capacity.
    #[error("request queue is full")]
    QueueFull,

    /// The router is shutting down and refuses new work.
    #[error("router is shutting down")]
    ShuttingDown,
}

impl RouterError {
    /// Whether this error is validation-classified. Validation failures are
    /// not provider-specific: the executor stops the chain immediately
    /// instead of trying further candidates.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Wrap a provider-level failure for the given provider, preserving the
    /// validation classification.
    pub(crate) fn from_provider(provider: ProviderKind, err: ProviderError) -> Self {
        if err.is_validation() {
            Self::Validation(err.to_string())
        } else {
            Self::ProviderRequest {
                provider,
                message: err.to_string(),
            }
        }
    }
}
