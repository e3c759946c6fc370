//! Provider Router
//!
//! The main entry point for routing generation requests to providers.
//! Assembles the security gate, strategy selector, fallback executor,
//! performance monitor, and request queue behind one public surface.
//!
//! # Usage
//!
//! ```ignore
//! let router = ProviderRouter::initialize(config)?;
//!
//! let response = router.process_request(GenerationRequest::new("2+2?"), None).await?;
//!
//! router.shutdown().await;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::config::{ProviderKind, RouterConfig};
use super::error::RouterError;
use super::events::{EventBus, RouterEvent};
use super::executor::FallbackExecutor;
use super::queue::{Dispatch, RequestQueue};
use super::registry::ProviderRegistry;
use super::stats::{PerformanceMonitor, RouterSummary};
use super::strategy::{GenerationRequest, ProjectContext, StrategySelector};
use crate::provider::ProviderResponse;
use crate::security::{InputValidator, SecurityConfig, ValidationResult};

/// Interval at which the shutdown drain polls for quiescence.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Dispatch Pipeline
// ============================================================================

/// The per-request pipeline: security gate, then strategy selection, then
/// the fallback executor. Shared between direct dispatch and the queue.
struct Pipeline {
    gate: InputValidator,
    selector: StrategySelector,
    executor: FallbackExecutor,
    monitor: Arc<PerformanceMonitor>,
    shutting_down: AtomicBool,
}

#[async_trait]
impl Dispatch for Pipeline {
    async fn dispatch(
        &self,
        request: GenerationRequest,
        context: Option<ProjectContext>,
    ) -> Result<ProviderResponse, RouterError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(RouterError::ShuttingDown);
        }

        if let ValidationResult::Invalid(reason) = self.gate.validate_prompt(&request.prompt) {
            tracing::warn!(request_id = %request.request_id, %reason, "input rejected");
            return Err(RouterError::Validation(reason));
        }

        let strategy = self
            .selector
            .select(&request, context.as_ref(), &self.monitor.provider_stats());

        self.executor
            .execute(&request, context.as_ref(), &strategy)
            .await
    }
}

// ============================================================================
// Provider Router
// ============================================================================

/// The provider-orchestration router.
pub struct ProviderRouter {
    config: RouterConfig,
    registry: Arc<ProviderRegistry>,
    monitor: Arc<PerformanceMonitor>,
    events: Arc<EventBus>,
    pipeline: Arc<Pipeline>,
    queue: Arc<RequestQueue>,
}

impl ProviderRouter {
    /// Initialize the router from configuration: construct the registry
    /// (excluding providers that fail, fatal only when none survive) and
    /// wire up the pipeline.
    pub fn initialize(config: RouterConfig) -> Result<Self, RouterError> {
        config.validate().map_err(RouterError::Validation)?;
        let registry = Arc::new(ProviderRegistry::initialize(&config.providers)?);
        Ok(Self::assemble(config, registry, SecurityConfig::default()))
    }

    /// Initialize with explicit security limits.
    pub fn initialize_with_security(
        config: RouterConfig,
        security: SecurityConfig,
    ) -> Result<Self, RouterError> {
        config.validate().map_err(RouterError::Validation)?;
        let registry = Arc::new(ProviderRegistry::initialize(&config.providers)?);
        Ok(Self::assemble(config, registry, security))
    }

    /// Build a router over an existing registry. The seam used by tests
    /// and embedders that construct their own adapters.
    #[must_use]
    pub fn with_registry(config: RouterConfig, registry: ProviderRegistry) -> Self {
        Self::assemble(config, Arc::new(registry), SecurityConfig::default())
    }

    fn assemble(
        config: RouterConfig,
        registry: Arc<ProviderRegistry>,
        security: SecurityConfig,
    ) -> Self {
        let monitor = Arc::new(PerformanceMonitor::new());
        let events = Arc::new(EventBus::new());

        let executor = FallbackExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&monitor),
            Arc::clone(&events),
            config.fallback_chain.clone(),
        );
        let selector = StrategySelector::new(config.fallback_chain.clone(), config.default_timeout());
        let pipeline = Arc::new(Pipeline {
            gate: InputValidator::new(security),
            selector,
            executor,
            monitor: Arc::clone(&monitor),
            shutting_down: AtomicBool::new(false),
        });
        let queue = RequestQueue::new(
            Arc::clone(&pipeline) as Arc<dyn Dispatch>,
            Arc::clone(&monitor),
            config.max_concurrent_requests,
            config.max_queue_depth,
        );

        tracing::info!(
            providers = registry.len(),
            max_concurrent = config.max_concurrent_requests,
            "provider router ready"
        );

        Self {
            config,
            registry,
            monitor,
            events,
            pipeline,
            queue,
        }
    }

    /// Route one request: gate, strategy, fallback chain. Not admission
    /// controlled; use [`queue_request`](Self::queue_request) to respect
    /// the concurrency bound.
    pub async fn process_request(
        &self,
        request: GenerationRequest,
        context: Option<ProjectContext>,
    ) -> Result<ProviderResponse, RouterError> {
        self.pipeline.dispatch(request, context).await
    }

    /// Route one request under admission control: dispatches immediately
    /// while capacity remains, otherwise waits in the FIFO queue.
    pub async fn queue_request(
        &self,
        request: GenerationRequest,
        context: Option<ProjectContext>,
    ) -> Result<ProviderResponse, RouterError> {
        Arc::clone(&self.queue).submit(request, context).await
    }

    /// Probe every provider. Individual probe failures map to `false`.
    pub async fn health_check(&self) -> HashMap<ProviderKind, bool> {
        self.registry.health_check().await
    }

    /// Diagnostic snapshot: per-provider aggregates, active attempts, and
    /// queue depth.
    #[must_use]
    pub fn metrics(&self) -> RouterSummary {
        self.monitor.summary()
    }

    /// Subscribe to per-attempt lifecycle events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RouterEvent> {
        self.events.subscribe()
    }

    /// Shut down: refuse new work, give in-flight requests a bounded drain
    /// window, then close every provider regardless of stragglers.
    pub async fn shutdown(&self) {
        self.pipeline.shutting_down.store(true, Ordering::Release);

        let drained = tokio::time::timeout(self.config.drain_timeout(), async {
            let mut tick = tokio::time::interval(DRAIN_POLL_INTERVAL);
            loop {
                tick.tick().await;
                if self.monitor.active_requests() == 0 && self.queue.in_flight() == 0 {
                    break;
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                active = self.monitor.active_requests(),
                "drain window expired with requests outstanding; closing providers anyway"
            );
        }

        self.registry.shutdown().await;
        tracing::info!("provider router shut down");
    }
}
