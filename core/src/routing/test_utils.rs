//! Routing Test Utilities
//!
//! Mock provider infrastructure for exercising routing behavior without
//! real LLM backends: scripted per-attempt outcomes, simulated latency,
//! request history tracking, and health toggling for fallback tests.
//!
//! # Usage
//!
//! ```ignore
//! use quill_core::routing::test_utils::{MockOutcome, MockProvider};
//!
//! let flaky = MockProvider::new(ProviderKind::Ollama)
//!     .with_script(vec![MockOutcome::fail("connection refused")])
//!     .succeeding("recovered");
//!
//! // After the test, verify what the provider saw
//! assert_eq!(flaky.request_count(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::config::ProviderKind;
use super::strategy::{GenerationRequest, ProjectContext};
use crate::provider::{Provider, ProviderError, ProviderResponse, Usage};

/// Scripted result of one mock attempt.
#[derive(Clone, Debug)]
pub enum MockOutcome {
    /// Resolve successfully with the given content and token count
    Succeed {
        /// Response text
        content: String,
        /// Reported token usage
        tokens: Option<u64>,
    },
    /// Fail with a backend error (fallback continues)
    FailRequest(String),
    /// Fail with a validation-classified error (fallback stops)
    FailValidation(String),
    /// Never settle within any realistic budget (forces a timeout)
    Hang,
}

impl MockOutcome {
    /// Successful outcome with a default token count.
    pub fn ok(content: impl Into<String>) -> Self {
        Self::Succeed {
            content: content.into(),
            tokens: Some(12),
        }
    }

    /// Backend-error outcome.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::FailRequest(message.into())
    }
}

/// Mock [`Provider`] with scripted outcomes.
///
/// Outcomes are consumed front-to-back from the script; once the script is
/// exhausted the repeating outcome (set by [`succeeding`](Self::succeeding)
/// or [`failing`](Self::failing), default: succeed) applies to every
/// further attempt.
pub struct MockProvider {
    kind: ProviderKind,
    model: String,
    script: Mutex<VecDeque<MockOutcome>>,
    repeat: Mutex<MockOutcome>,
    delay: Mutex<Option<Duration>>,
    healthy: AtomicBool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockProvider {
    /// Create a healthy mock that succeeds with a canned response.
    #[must_use]
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: format!("mock-{kind}"),
            script: Mutex::new(VecDeque::new()),
            repeat: Mutex::new(MockOutcome::ok("mock response")),
            delay: Mutex::new(None),
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue outcomes consumed one per attempt before the repeating
    /// outcome applies.
    #[must_use]
    pub fn with_script(self, outcomes: Vec<MockOutcome>) -> Self {
        *self.script.lock() = outcomes.into();
        self
    }

    /// Repeat a successful response once the script is exhausted.
    #[must_use]
    pub fn succeeding(self, content: impl Into<String>) -> Self {
        *self.repeat.lock() = MockOutcome::ok(content);
        self
    }

    /// Repeat a backend failure once the script is exhausted.
    #[must_use]
    pub fn failing(self, message: impl Into<String>) -> Self {
        *self.repeat.lock() = MockOutcome::fail(message);
        self
    }

    /// Hang on every attempt (timeout testing).
    #[must_use]
    pub fn hanging(self) -> Self {
        *self.repeat.lock() = MockOutcome::Hang;
        self
    }

    /// Sleep this long before settling each attempt.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    /// Make the health probe fail.
    #[must_use]
    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::Release);
        self
    }

    /// Number of attempts this provider received.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    /// Prompts received, in arrival order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Whether `shutdown` was invoked.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn next_outcome(&self) -> MockOutcome {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.repeat.lock().clone())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn process_request(
        &self,
        request: &GenerationRequest,
        _context: Option<&ProjectContext>,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        self.prompts.lock().push(request.prompt.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_outcome() {
            MockOutcome::Succeed { content, tokens } => Ok(ProviderResponse {
                content,
                model: self.model.clone(),
                usage: tokens.map(|total_tokens| Usage { total_tokens }),
            }),
            MockOutcome::FailRequest(message) => Err(ProviderError::Api {
                status: 500,
                body: message,
            }),
            MockOutcome::FailValidation(message) => Err(ProviderError::Validation(message)),
            MockOutcome::Hang => {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Err(ProviderError::MalformedResponse("hang elapsed".to_string()))
            }
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.healthy.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ProviderError::Api {
                status: 503,
                body: "mock unhealthy".to_string(),
            })
        }
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
