//! Execution Strategy Selection
//!
//! Decides how a request runs: the execution mode, the preferred provider,
//! and the per-attempt timeout budget.
//!
//! # Decision Flow
//!
//! ```text
//! 1. Resolve mode (explicit mode honored; auto classifies by request shape)
//! 2. Derive the timeout budget from the mode and the configured default
//! 3. Pick a provider from the current stats snapshot
//!    (cold start: first entry of the configured fallback chain)
//! ```

use std::collections::HashMap;
use std::time::Duration;

use super::config::{
    ExecutionMode, ProviderKind, BALANCED_LATENCY_HORIZON_MS, FAST_PROMPT_CHARS, FAST_TIMEOUT_CAP,
    THOROUGH_CONTEXT_FILES, THOROUGH_PROMPT_CHARS, THOROUGH_TIMEOUT_FLOOR,
};
use super::stats::ProviderStats;

// ============================================================================
// Request Types
// ============================================================================

/// A single generation request. Created per call and discarded after
/// completion.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Unique request identifier (uuid v4, unique per process)
    pub request_id: String,

    /// The prompt text
    pub prompt: String,

    /// Requested execution mode
    pub mode: ExecutionMode,
}

impl GenerationRequest {
    /// Create a request with a fresh id and `Auto` mode.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            mode: ExecutionMode::Auto,
        }
    }

    /// Set an explicit execution mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Project files accompanying a request.
#[derive(Clone, Debug, Default)]
pub struct ProjectContext {
    /// Paths of the files in scope
    pub files: Vec<String>,
    /// Combined size of the files in bytes
    pub total_bytes: u64,
}

impl ProjectContext {
    /// Create a context from a file list and combined size.
    #[must_use]
    pub fn new(files: Vec<String>, total_bytes: u64) -> Self {
        Self { files, total_bytes }
    }
}

/// Resolved strategy for one request. Derived, never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionStrategy {
    /// Resolved mode (never `Auto`)
    pub mode: ExecutionMode,
    /// Preferred provider; `None` leaves the executor on the full chain
    pub provider: Option<ProviderKind>,
    /// Per-attempt timeout budget
    pub timeout: Duration,
}

// ============================================================================
// Strategy Selector
// ============================================================================

/// Computes an [`ExecutionStrategy`] from a request and the current stats
/// snapshot.
pub struct StrategySelector {
    fallback_chain: Vec<ProviderKind>,
    default_timeout: Duration,
}

impl StrategySelector {
    /// Create a selector over the configured fallback chain and default
    /// timeout budget.
    #[must_use]
    pub fn new(fallback_chain: Vec<ProviderKind>, default_timeout: Duration) -> Self {
        Self {
            fallback_chain,
            default_timeout,
        }
    }

    /// Compute the strategy for a request.
    pub fn select(
        &self,
        request: &GenerationRequest,
        context: Option<&ProjectContext>,
        stats: &HashMap<ProviderKind, ProviderStats>,
    ) -> ExecutionStrategy {
        let mode = self.resolve_mode(request, context);
        let timeout = self.timeout_for(mode);
        let provider = self.pick_provider(mode, stats);

        tracing::debug!(
            request_id = %request.request_id,
            %mode,
            provider = ?provider,
            timeout_ms = timeout.as_millis() as u64,
            "resolved execution strategy"
        );

        ExecutionStrategy {
            mode,
            provider,
            timeout,
        }
    }

    /// Honor an explicit mode; classify `Auto` from the request shape.
    fn resolve_mode(&self, request: &GenerationRequest, context: Option<&ProjectContext>) -> ExecutionMode {
        if request.mode != ExecutionMode::Auto {
            return request.mode;
        }

        let prompt_chars = request.prompt.chars().count();
        let context_files = context.map_or(0, |c| c.files.len());

        if prompt_chars < FAST_PROMPT_CHARS && context.is_none() {
            ExecutionMode::Fast
        } else if prompt_chars > THOROUGH_PROMPT_CHARS
            || (context.is_some() && context_files > THOROUGH_CONTEXT_FILES)
        {
            ExecutionMode::Thorough
        } else {
            ExecutionMode::Balanced
        }
    }

    /// Timeout budget: fast is capped, thorough is floored, balanced uses
    /// the configured default unchanged.
    fn timeout_for(&self, mode: ExecutionMode) -> Duration {
        match mode {
            ExecutionMode::Fast => self.default_timeout.min(FAST_TIMEOUT_CAP),
            ExecutionMode::Thorough => self.default_timeout.max(THOROUGH_TIMEOUT_FLOOR),
            ExecutionMode::Balanced | ExecutionMode::Auto => self.default_timeout,
        }
    }

    /// Pick the preferred provider from the stats snapshot. An empty
    /// snapshot is the cold start: fall back to the first configured chain
    /// entry.
    fn pick_provider(
        &self,
        mode: ExecutionMode,
        stats: &HashMap<ProviderKind, ProviderStats>,
    ) -> Option<ProviderKind> {
        if stats.is_empty() {
            return self.fallback_chain.first().copied();
        }

        let best = match mode {
            ExecutionMode::Fast => stats.iter().min_by(|a, b| {
                a.1.average_latency_ms
                    .partial_cmp(&b.1.average_latency_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            ExecutionMode::Thorough => stats.iter().max_by(|a, b| {
                a.1.success_rate
                    .partial_cmp(&b.1.success_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            ExecutionMode::Balanced | ExecutionMode::Auto => stats.iter().max_by(|a, b| {
                balanced_score(a.1)
                    .partial_cmp(&balanced_score(b.1))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        };

        best.map(|(kind, _)| *kind)
    }
}

/// Balanced-mode score. The latency term goes negative for providers
/// averaging above the 30 s horizon; intentionally left unclamped.
fn balanced_score(stats: &ProviderStats) -> f64 {
    0.6 * stats.success_rate + 0.4 * (1.0 - stats.average_latency_ms / BALANCED_LATENCY_HORIZON_MS)
}
