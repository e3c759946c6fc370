//! Fallback Executor
//!
//! Walks a request through an ordered provider chain: each candidate races
//! against the strategy's timeout budget, failures roll over to the next
//! candidate, and the first success wins. Every attempt is recorded into
//! the performance monitor and announced on the event bus regardless of
//! what the caller ultimately sees.
//!
//! # Timeout Semantics
//!
//! An attempt that exceeds its budget is logically abandoned: the caller
//! moves on to the next candidate immediately. Dropping the losing future
//! also aborts the in-flight HTTP call, so no stray background request
//! keeps running — callers must not assume the backend ever observed a
//! cancellation, only that the router stopped waiting.
//!
//! # Error Visibility
//!
//! Per-attempt failures never surface individually. Validation-classified
//! errors stop the chain at once (they are not provider-specific); anything
//! else continues until the chain is exhausted, at which point the caller
//! receives [`RouterError::AllProvidersFailed`] carrying the last
//! candidate's failure text.

use std::sync::Arc;

use super::config::ProviderKind;
use super::error::RouterError;
use super::events::{EventBus, RouterEvent};
use super::registry::ProviderRegistry;
use super::stats::{AttemptMetrics, PerformanceMonitor};
use super::strategy::{ExecutionStrategy, GenerationRequest, ProjectContext};
use crate::provider::ProviderResponse;

/// Executes requests against the provider chain with timeout racing and
/// transparent failover.
pub struct FallbackExecutor {
    registry: Arc<ProviderRegistry>,
    monitor: Arc<PerformanceMonitor>,
    events: Arc<EventBus>,
    fallback_chain: Vec<ProviderKind>,
}

impl FallbackExecutor {
    /// Create an executor over the given registry and configured chain.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        monitor: Arc<PerformanceMonitor>,
        events: Arc<EventBus>,
        fallback_chain: Vec<ProviderKind>,
    ) -> Self {
        Self {
            registry,
            monitor,
            events,
            fallback_chain,
        }
    }

    /// Ordered candidates for one execution: the selected provider first,
    /// then the remaining configured chain in original relative order. With
    /// no selection the configured chain is used as-is. Every configured
    /// kind appears at least once.
    fn candidate_chain(&self, selected: Option<ProviderKind>) -> Vec<ProviderKind> {
        match selected {
            Some(kind) => std::iter::once(kind)
                .chain(self.fallback_chain.iter().copied().filter(|k| *k != kind))
                .collect(),
            None => self.fallback_chain.clone(),
        }
    }

    /// Execute a request under the given strategy.
    pub async fn execute(
        &self,
        request: &GenerationRequest,
        context: Option<&ProjectContext>,
        strategy: &ExecutionStrategy,
    ) -> Result<ProviderResponse, RouterError> {
        let candidates = self.candidate_chain(strategy.provider);
        let timeout_ms = strategy.timeout.as_millis() as u64;

        let mut attempts = 0usize;
        let mut last_failure: Option<(ProviderKind, String)> = None;

        for kind in candidates {
            let Some(provider) = self.registry.get(kind) else {
                tracing::debug!(provider = %kind, "candidate not in registry; skipping");
                continue;
            };
            attempts += 1;

            let mut attempt = AttemptMetrics::begin(kind, provider.model_name());
            self.monitor.attempt_started(&attempt);
            self.events.emit(RouterEvent::RequestStart {
                request_id: request.request_id.clone(),
                provider: kind,
            });

            let outcome =
                match tokio::time::timeout(strategy.timeout, provider.process_request(request, context))
                    .await
                {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(e)) => Err(RouterError::from_provider(kind, e)),
                    Err(_elapsed) => Err(RouterError::Timeout {
                        provider: kind,
                        timeout_ms,
                    }),
                };

            match outcome {
                Ok(response) => {
                    attempt.finish_success(response.usage.map(|u| u.total_tokens));
                    let latency_ms = attempt.latency_ms();
                    self.monitor.record(attempt);
                    self.events.emit(RouterEvent::RequestComplete {
                        request_id: request.request_id.clone(),
                        provider: kind,
                        success: true,
                        error: None,
                    });
                    tracing::info!(
                        request_id = %request.request_id,
                        provider = %kind,
                        latency_ms,
                        "request completed"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    let message = err.to_string();
                    attempt.finish_failure(message.clone());
                    self.monitor.record(attempt);
                    self.events.emit(RouterEvent::RequestComplete {
                        request_id: request.request_id.clone(),
                        provider: kind,
                        success: false,
                        error: Some(message.clone()),
                    });

                    if err.is_validation() {
                        tracing::warn!(
                            request_id = %request.request_id,
                            provider = %kind,
                            error = %message,
                            "validation failure; not retrying"
                        );
                        return Err(err);
                    }

                    tracing::warn!(
                        request_id = %request.request_id,
                        provider = %kind,
                        error = %message,
                        "attempt failed; trying next candidate"
                    );
                    last_failure = Some((kind, message));
                }
            }
        }

        match last_failure {
            Some((last_provider, last_error)) => Err(RouterError::AllProvidersFailed {
                attempts,
                last_provider,
                last_error,
            }),
            // Every candidate was absent from the registry
            None => Err(RouterError::NoProviders),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::routing::config::ExecutionMode;
    use crate::routing::test_utils::{MockOutcome, MockProvider};

    const CHAIN: [ProviderKind; 3] = [
        ProviderKind::Ollama,
        ProviderKind::LmStudio,
        ProviderKind::Hosted,
    ];

    fn executor_with(
        providers: Vec<Arc<MockProvider>>,
    ) -> (FallbackExecutor, Arc<PerformanceMonitor>, Arc<EventBus>) {
        let registry = ProviderRegistry::from_providers(
            providers.into_iter().map(|p| p as Arc<dyn crate::provider::Provider>).collect(),
        )
        .unwrap();
        let monitor = Arc::new(PerformanceMonitor::new());
        let events = Arc::new(EventBus::new());
        let executor = FallbackExecutor::new(
            Arc::new(registry),
            monitor.clone(),
            events.clone(),
            CHAIN.to_vec(),
        );
        (executor, monitor, events)
    }

    fn strategy(provider: Option<ProviderKind>, timeout: Duration) -> ExecutionStrategy {
        ExecutionStrategy {
            mode: ExecutionMode::Balanced,
            provider,
            timeout,
        }
    }

    #[test]
    fn test_candidate_chain_puts_selection_first() {
        let (executor, _, _) = executor_with(vec![Arc::new(MockProvider::new(ProviderKind::Ollama))]);

        let chain = executor.candidate_chain(Some(ProviderKind::LmStudio));
        assert_eq!(
            chain,
            vec![ProviderKind::LmStudio, ProviderKind::Ollama, ProviderKind::Hosted]
        );

        let chain = executor.candidate_chain(None);
        assert_eq!(chain, CHAIN.to_vec());
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let a = Arc::new(MockProvider::new(ProviderKind::Ollama).succeeding("from ollama"));
        let b = Arc::new(MockProvider::new(ProviderKind::LmStudio));
        let (executor, monitor, _) = executor_with(vec![a.clone(), b.clone()]);

        let request = GenerationRequest::new("2+2?");
        let response = executor
            .execute(&request, None, &strategy(Some(ProviderKind::Ollama), Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(response.content, "from ollama");
        assert_eq!(a.request_count(), 1);
        assert_eq!(b.request_count(), 0);
        assert_eq!(monitor.provider_stats()[&ProviderKind::Ollama].samples, 1);
    }

    #[tokio::test]
    async fn test_failure_rolls_over_to_next_candidate() {
        let a = Arc::new(MockProvider::new(ProviderKind::Ollama).failing("connection refused"));
        let b = Arc::new(MockProvider::new(ProviderKind::LmStudio).succeeding("from lm-studio"));
        let c = Arc::new(MockProvider::new(ProviderKind::Hosted));
        let (executor, monitor, _) = executor_with(vec![a.clone(), b.clone(), c.clone()]);

        let request = GenerationRequest::new("2+2?");
        let response = executor
            .execute(&request, None, &strategy(Some(ProviderKind::Ollama), Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(response.content, "from lm-studio");
        assert_eq!(a.request_count(), 1);
        assert_eq!(b.request_count(), 1);
        // B succeeded, so C is never invoked
        assert_eq!(c.request_count(), 0);

        let stats = monitor.provider_stats();
        assert!(stats[&ProviderKind::Ollama].success_rate.abs() < f64::EPSILON);
        assert!((stats[&ProviderKind::LmStudio].success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_validation_failure_stops_immediately() {
        let a = Arc::new(
            MockProvider::new(ProviderKind::Ollama)
                .with_script(vec![MockOutcome::FailValidation("prompt rejected".into())]),
        );
        let b = Arc::new(MockProvider::new(ProviderKind::LmStudio));
        let (executor, _, _) = executor_with(vec![a.clone(), b.clone()]);

        let request = GenerationRequest::new("2+2?");
        let err = executor
            .execute(&request, None, &strategy(Some(ProviderKind::Ollama), Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(b.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_rolls_over_like_a_failure() {
        let a = Arc::new(MockProvider::new(ProviderKind::Ollama).hanging());
        let b = Arc::new(MockProvider::new(ProviderKind::LmStudio).succeeding("rescued"));
        let (executor, monitor, _) = executor_with(vec![a.clone(), b.clone()]);

        let request = GenerationRequest::new("2+2?");
        let response = executor
            .execute(
                &request,
                None,
                &strategy(Some(ProviderKind::Ollama), Duration::from_millis(500)),
            )
            .await
            .unwrap();

        assert_eq!(response.content, "rescued");
        let stats = monitor.provider_stats();
        assert_eq!(stats[&ProviderKind::Ollama].samples, 1);
        assert!(stats[&ProviderKind::Ollama].success_rate.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_last_error() {
        let a = Arc::new(MockProvider::new(ProviderKind::Ollama).failing("ollama down"));
        let b = Arc::new(MockProvider::new(ProviderKind::LmStudio).failing("lm-studio down"));
        let c = Arc::new(MockProvider::new(ProviderKind::Hosted).failing("hosted down"));
        let (executor, _, _) = executor_with(vec![a, b, c]);

        let request = GenerationRequest::new("2+2?");
        let err = executor
            .execute(&request, None, &strategy(None, Duration::from_secs(5)))
            .await
            .unwrap_err();

        match err {
            RouterError::AllProvidersFailed {
                attempts,
                last_provider,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_provider, ProviderKind::Hosted);
                assert!(last_error.contains("hosted down"));
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unregistered_candidate_is_skipped() {
        // Chain names all three kinds but only lm-studio is registered
        let b = Arc::new(MockProvider::new(ProviderKind::LmStudio).succeeding("only one here"));
        let (executor, _, _) = executor_with(vec![b.clone()]);

        let request = GenerationRequest::new("2+2?");
        let response = executor
            .execute(&request, None, &strategy(None, Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(response.content, "only one here");
        assert_eq!(b.request_count(), 1);
    }

    #[tokio::test]
    async fn test_events_trace_every_attempt() {
        let a = Arc::new(MockProvider::new(ProviderKind::Ollama).failing("nope"));
        let b = Arc::new(MockProvider::new(ProviderKind::LmStudio).succeeding("yes"));
        let (executor, _, events) = executor_with(vec![a, b]);
        let mut rx = events.subscribe();

        let request = GenerationRequest::new("2+2?");
        executor
            .execute(&request, None, &strategy(Some(ProviderKind::Ollama), Duration::from_secs(5)))
            .await
            .unwrap();

        let expect_id = request.request_id.clone();
        match rx.recv().await.unwrap() {
            RouterEvent::RequestStart { request_id, provider } => {
                assert_eq!(request_id, expect_id);
                assert_eq!(provider, ProviderKind::Ollama);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            RouterEvent::RequestComplete { provider: ProviderKind::Ollama, success: false, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            RouterEvent::RequestStart { provider: ProviderKind::LmStudio, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            RouterEvent::RequestComplete { provider: ProviderKind::LmStudio, success: true, .. }
        ));
    }
}
