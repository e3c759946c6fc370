//! Rolling Provider Statistics
//!
//! Per-provider latency and success aggregates that drive strategy
//! selection, plus the active-attempt map used for diagnostics and
//! shutdown draining.
//!
//! Aggregates use a simple running mean over every recorded sample (not an
//! exponential moving average): with a handful of providers and
//! process-lifetime stats there is no window to age out, and the running
//! mean keeps `success_rate == successes / samples` exactly.
//!
//! # Lifetimes
//!
//! An [`AttemptMetrics`] record is opened when the executor starts an
//! attempt, lives in the active map while the attempt is outstanding, and
//! is folded into the [`ProviderStats`] aggregate and discarded when the
//! attempt finishes. Aggregates live for the process lifetime; nothing is
//! persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
// tokio's Instant (a thin wrapper over std's) so attempt latency follows
// the virtual clock under `start_paused` tests
use tokio::time::Instant;

use super::config::ProviderKind;

// ============================================================================
// Attempt Metrics
// ============================================================================

/// Measurements for a single attempt against a single provider.
#[derive(Clone, Debug)]
pub struct AttemptMetrics {
    /// Unique attempt identifier (distinct from the request id; one request
    /// may produce several attempts)
    pub attempt_id: String,
    /// Provider the attempt ran against
    pub provider: ProviderKind,
    /// Model the provider was asked for
    pub model: String,
    /// When the attempt started
    pub started: Instant,
    /// When the attempt finished; `None` while outstanding
    pub finished: Option<Instant>,
    /// Tokens reported by the backend, if any
    pub token_count: Option<u64>,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Failure detail when `success` is false
    pub error: Option<String>,
}

impl AttemptMetrics {
    /// Open a metrics record for an attempt that is starting now.
    pub fn begin(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            attempt_id: uuid::Uuid::new_v4().to_string(),
            provider,
            model: model.into(),
            started: Instant::now(),
            finished: None,
            token_count: None,
            success: false,
            error: None,
        }
    }

    /// Close the record as successful.
    pub fn finish_success(&mut self, token_count: Option<u64>) {
        self.finished = Some(Instant::now());
        self.token_count = token_count;
        self.success = true;
    }

    /// Close the record as failed.
    pub fn finish_failure(&mut self, error: impl Into<String>) {
        self.finished = Some(Instant::now());
        self.success = false;
        self.error = Some(error.into());
    }

    /// Wall-clock latency of the attempt in milliseconds. For an
    /// unfinished attempt this is the elapsed time so far.
    #[must_use]
    pub fn latency_ms(&self) -> u64 {
        let end = self.finished.unwrap_or_else(Instant::now);
        end.duration_since(self.started).as_millis() as u64
    }
}

// ============================================================================
// Provider Aggregates
// ============================================================================

/// Rolling aggregate for one provider. Mutated only by
/// [`PerformanceMonitor::record`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProviderStats {
    /// Running mean attempt latency in milliseconds
    pub average_latency_ms: f64,
    /// Fraction of recorded attempts that succeeded
    pub success_rate: f64,
    /// Number of recorded attempts
    pub samples: u64,
}

impl ProviderStats {
    fn fold(&mut self, latency_ms: u64, success: bool) {
        let prior = self.samples as f64;
        let successes = self.success_rate * prior + if success { 1.0 } else { 0.0 };

        self.samples += 1;
        let n = self.samples as f64;
        self.average_latency_ms = (self.average_latency_ms * prior + latency_ms as f64) / n;
        self.success_rate = successes / n;
    }
}

// ============================================================================
// Performance Monitor
// ============================================================================

/// Summary snapshot returned by [`PerformanceMonitor::summary`].
#[derive(Clone, Debug)]
pub struct RouterSummary {
    /// Per-provider aggregates
    pub providers: HashMap<ProviderKind, ProviderStats>,
    /// Attempts currently outstanding
    pub active_requests: usize,
    /// Entries waiting in the overflow queue
    pub queue_depth: usize,
}

/// Tracks rolling per-provider statistics and outstanding attempts.
#[derive(Default)]
pub struct PerformanceMonitor {
    stats: DashMap<ProviderKind, ProviderStats>,
    active: DashMap<String, ProviderKind>,
    queue_depth: AtomicUsize,
}

impl PerformanceMonitor {
    /// Create an empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attempt as outstanding.
    pub fn attempt_started(&self, metrics: &AttemptMetrics) {
        self.active
            .insert(metrics.attempt_id.clone(), metrics.provider);
    }

    /// Fold a finished attempt into its provider's aggregate and drop it
    /// from the active map. The per-attempt record is not retained.
    pub fn record(&self, metrics: AttemptMetrics) {
        self.active.remove(&metrics.attempt_id);
        self.stats
            .entry(metrics.provider)
            .or_default()
            .fold(metrics.latency_ms(), metrics.success);
    }

    /// Immutable snapshot of all provider aggregates.
    #[must_use]
    pub fn provider_stats(&self) -> HashMap<ProviderKind, ProviderStats> {
        self.stats
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Number of attempts currently outstanding.
    #[must_use]
    pub fn active_requests(&self) -> usize {
        self.active.len()
    }

    /// Mirror of the queue depth, maintained by the request queue.
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Release);
    }

    /// Diagnostic snapshot: aggregates plus active count and queue depth.
    #[must_use]
    pub fn summary(&self) -> RouterSummary {
        RouterSummary {
            providers: self.provider_stats(),
            active_requests: self.active_requests(),
            queue_depth: self.queue_depth.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_attempt(provider: ProviderKind, success: bool) -> AttemptMetrics {
        let mut attempt = AttemptMetrics::begin(provider, "test-model");
        if success {
            attempt.finish_success(Some(42));
        } else {
            attempt.finish_failure("backend error");
        }
        attempt
    }

    #[test]
    fn test_success_rate_is_exact_ratio() {
        let monitor = PerformanceMonitor::new();

        // 3 successes, 1 failure
        for _ in 0..3 {
            monitor.record(finished_attempt(ProviderKind::Ollama, true));
        }
        monitor.record(finished_attempt(ProviderKind::Ollama, false));

        let stats = monitor.provider_stats()[&ProviderKind::Ollama];
        assert_eq!(stats.samples, 4);
        assert!((stats.success_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_running_mean_latency() {
        let mut stats = ProviderStats::default();
        stats.fold(100, true);
        stats.fold(300, true);
        stats.fold(200, false);

        assert!((stats.average_latency_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(stats.samples, 3);
    }

    #[test]
    fn test_stats_are_per_provider() {
        let monitor = PerformanceMonitor::new();
        monitor.record(finished_attempt(ProviderKind::Ollama, true));
        monitor.record(finished_attempt(ProviderKind::LmStudio, false));

        let stats = monitor.provider_stats();
        assert!((stats[&ProviderKind::Ollama].success_rate - 1.0).abs() < f64::EPSILON);
        assert!(stats[&ProviderKind::LmStudio].success_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_active_attempts_tracked_until_recorded() {
        let monitor = PerformanceMonitor::new();
        let mut attempt = AttemptMetrics::begin(ProviderKind::Hosted, "sonnet");
        monitor.attempt_started(&attempt);
        assert_eq!(monitor.active_requests(), 1);

        attempt.finish_success(None);
        monitor.record(attempt);
        assert_eq!(monitor.active_requests(), 0);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let monitor = PerformanceMonitor::new();
        monitor.record(finished_attempt(ProviderKind::Ollama, true));

        let snapshot = monitor.provider_stats();
        monitor.record(finished_attempt(ProviderKind::Ollama, false));

        // The earlier snapshot is unaffected by later recording
        assert_eq!(snapshot[&ProviderKind::Ollama].samples, 1);
        assert_eq!(monitor.provider_stats()[&ProviderKind::Ollama].samples, 2);
    }

    #[test]
    fn test_summary_reports_queue_depth() {
        let monitor = PerformanceMonitor::new();
        monitor.set_queue_depth(7);

        let summary = monitor.summary();
        assert_eq!(summary.queue_depth, 7);
        assert_eq!(summary.active_requests, 0);
    }
}
