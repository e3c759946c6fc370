//! Routing Configuration
//!
//! Configuration types for provider routing: the closed provider
//! enumeration, per-provider descriptors, execution modes, and the full
//! router configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Kinds
// ============================================================================

/// Closed enumeration of supported provider backends.
///
/// Adapter construction dispatches on this enum at registry initialization,
/// so an unknown provider is a deserialization error rather than a runtime
/// string-lookup failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Local Ollama inference server
    Ollama,
    /// Local LM Studio server (OpenAI-compatible API)
    LmStudio,
    /// Remote hosted OpenAI-compatible provider
    Hosted,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::LmStudio => write!(f, "lm-studio"),
            Self::Hosted => write!(f, "hosted"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ollama" => Ok(Self::Ollama),
            "lm-studio" | "lmstudio" => Ok(Self::LmStudio),
            "hosted" => Ok(Self::Hosted),
            other => Err(format!("unknown provider kind: {other}")),
        }
    }
}

// ============================================================================
// Execution Modes
// ============================================================================

/// Execution mode governing provider choice and timeout budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Minimal latency: short prompts, no project context
    Fast,
    /// Default tradeoff between latency and reliability
    Balanced,
    /// Reliability over speed: long prompts or large project context
    Thorough,
    /// Resolve to one of the above from the request shape
    Auto,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Balanced => write!(f, "balanced"),
            Self::Thorough => write!(f, "thorough"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "thorough" => Ok(Self::Thorough),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

// ============================================================================
// Mode Resolution Thresholds
// ============================================================================

/// Prompt length below which an uncontextualized request resolves to fast.
pub const FAST_PROMPT_CHARS: usize = 500;

/// Prompt length above which a request resolves to thorough.
pub const THOROUGH_PROMPT_CHARS: usize = 5_000;

/// Context file count above which a request resolves to thorough.
pub const THOROUGH_CONTEXT_FILES: usize = 10;

/// Upper bound on the fast-mode timeout budget.
pub const FAST_TIMEOUT_CAP: Duration = Duration::from_millis(10_000);

/// Lower bound on the thorough-mode timeout budget.
pub const THOROUGH_TIMEOUT_FLOOR: Duration = Duration::from_millis(60_000);

/// Latency horizon used by balanced-mode scoring. Providers averaging above
/// this produce a negative latency term; carried over unclamped.
pub const BALANCED_LATENCY_HORIZON_MS: f64 = 30_000.0;

// ============================================================================
// Provider Descriptors
// ============================================================================

/// Static description of one configured provider backend.
///
/// Immutable after registry initialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Which backend this entry configures
    pub kind: ProviderKind,

    /// Base URL of the backend (e.g. `http://localhost:11434`)
    pub base_url: String,

    /// Model identifier to request from this backend
    pub model: String,

    /// Environment variable holding the API key (remote providers only)
    pub api_key_env: Option<String>,

    /// Per-provider HTTP client timeout override
    pub request_timeout_ms: Option<u64>,
}

impl ProviderDescriptor {
    /// Create a descriptor with the given kind, endpoint, and model.
    pub fn new(kind: ProviderKind, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            model: model.into(),
            api_key_env: None,
            request_timeout_ms: None,
        }
    }

    /// Set the environment variable the API key is read from.
    #[must_use]
    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    /// Override the HTTP client timeout for this provider.
    #[must_use]
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }
}

// ============================================================================
// Full Router Configuration
// ============================================================================

/// Complete router configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Configured provider backends
    pub providers: Vec<ProviderDescriptor>,

    /// Ordered fallback chain tried when attempts fail
    pub fallback_chain: Vec<ProviderKind>,

    /// Default per-attempt timeout budget (balanced mode uses this unchanged)
    pub default_timeout_ms: u64,

    /// Maximum concurrently in-flight requests
    pub max_concurrent_requests: usize,

    /// Maximum entries held in the overflow queue
    pub max_queue_depth: usize,

    /// Window given to in-flight requests during shutdown before providers
    /// are closed regardless
    pub drain_timeout_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderDescriptor::new(ProviderKind::Ollama, "http://localhost:11434", "qwen2.5-coder"),
                ProviderDescriptor::new(ProviderKind::LmStudio, "http://localhost:1234", "qwen2.5-coder"),
            ],
            fallback_chain: vec![ProviderKind::Ollama, ProviderKind::LmStudio],
            default_timeout_ms: 30_000,
            max_concurrent_requests: 4,
            max_queue_depth: 256,
            drain_timeout_ms: 10_000,
        }
    }
}

impl RouterConfig {
    /// Default per-attempt timeout as a [`Duration`].
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Shutdown drain window as a [`Duration`].
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Check structural validity: a non-empty chain whose every entry has a
    /// matching descriptor, and a positive concurrency bound.
    pub fn validate(&self) -> Result<(), String> {
        if self.providers.is_empty() {
            return Err("no providers configured".to_string());
        }
        if self.fallback_chain.is_empty() {
            return Err("fallback chain is empty".to_string());
        }
        if self.max_concurrent_requests == 0 {
            return Err("max_concurrent_requests must be at least 1".to_string());
        }
        for kind in &self.fallback_chain {
            if !self.providers.iter().any(|p| p.kind == *kind) {
                return Err(format!("fallback chain names unconfigured provider: {kind}"));
            }
        }
        Ok(())
    }
}
