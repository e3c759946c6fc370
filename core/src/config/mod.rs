//! TOML Configuration File Support
//!
//! Centralized configuration loading for quill, backed by a TOML file at
//! `~/.config/quill/quill.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. Environment variables
//! 2. TOML configuration file
//! 3. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows the XDG Base Directory specification:
//! `$XDG_CONFIG_HOME/quill/quill.toml` (typically `~/.config/quill/quill.toml`).
//!
//! # Example Configuration
//!
//! ```toml
//! [[providers]]
//! kind = "ollama"
//! base_url = "http://localhost:11434"
//! model = "qwen2.5-coder"
//!
//! [[providers]]
//! kind = "lm-studio"
//! base_url = "http://localhost:1234"
//! model = "qwen2.5-coder"
//!
//! [[providers]]
//! kind = "hosted"
//! base_url = "https://api.example.com"
//! model = "sonnet"
//! api_key_env = "QUILL_API_KEY"
//!
//! [routing]
//! fallback_chain = ["ollama", "lm-studio", "hosted"]
//! default_timeout_ms = 30000
//! max_concurrent_requests = 4
//!
//! [security]
//! max_prompt_chars = 32768
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::{ProviderDescriptor, ProviderKind, RouterConfig};
use crate::security::SecurityConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("failed to read config file at {path}: {source}")]
    Read {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Structurally invalid configuration
    #[error("invalid configuration: {0}")]
    Validation(String),
}

// =============================================================================
// TOML Structures
// =============================================================================

/// Routing section of the TOML configuration. Every field is optional;
/// missing fields fall back to [`RouterConfig`] defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingToml {
    /// Ordered provider fallback chain
    pub fallback_chain: Option<Vec<ProviderKind>>,
    /// Default per-attempt timeout budget in milliseconds
    pub default_timeout_ms: Option<u64>,
    /// Maximum concurrently in-flight requests
    pub max_concurrent_requests: Option<usize>,
    /// Maximum overflow queue depth
    pub max_queue_depth: Option<usize>,
    /// Shutdown drain window in milliseconds
    pub drain_timeout_ms: Option<u64>,
}

/// Security section of the TOML configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityToml {
    /// Maximum prompt length in characters
    pub max_prompt_chars: Option<usize>,
}

/// Root TOML document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillToml {
    /// Provider descriptor entries
    pub providers: Vec<ProviderDescriptor>,
    /// Routing section
    pub routing: RoutingToml,
    /// Security section
    pub security: SecurityToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration: router plus security limits.
#[derive(Clone, Debug)]
pub struct QuillConfig {
    /// Router configuration
    pub router: RouterConfig,
    /// Security gate limits
    pub security: SecurityConfig,
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl QuillConfig {
    /// Merge a parsed TOML document over the defaults.
    fn from_toml(doc: QuillToml) -> Self {
        let defaults = RouterConfig::default();
        let router = RouterConfig {
            providers: if doc.providers.is_empty() {
                defaults.providers
            } else {
                doc.providers
            },
            fallback_chain: doc.routing.fallback_chain.unwrap_or(defaults.fallback_chain),
            default_timeout_ms: doc
                .routing
                .default_timeout_ms
                .unwrap_or(defaults.default_timeout_ms),
            max_concurrent_requests: doc
                .routing
                .max_concurrent_requests
                .unwrap_or(defaults.max_concurrent_requests),
            max_queue_depth: doc.routing.max_queue_depth.unwrap_or(defaults.max_queue_depth),
            drain_timeout_ms: doc.routing.drain_timeout_ms.unwrap_or(defaults.drain_timeout_ms),
        };
        let security = SecurityConfig {
            max_prompt_chars: doc
                .security
                .max_prompt_chars
                .unwrap_or_else(|| SecurityConfig::default().max_prompt_chars),
        };
        Self { router, security }
    }

    /// Apply environment-variable overrides (highest priority).
    fn apply_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("QUILL_DEFAULT_TIMEOUT_MS") {
            self.router.default_timeout_ms = v;
        }
        if let Some(v) = env_parse("QUILL_MAX_CONCURRENT_REQUESTS") {
            self.router.max_concurrent_requests = v;
        }
        if let Some(v) = env_parse("QUILL_MAX_QUEUE_DEPTH") {
            self.router.max_queue_depth = v;
        }
        if let Some(v) = env_parse("QUILL_DRAIN_TIMEOUT_MS") {
            self.router.drain_timeout_ms = v;
        }
        if let Some(v) = env_parse("QUILL_MAX_PROMPT_CHARS") {
            self.security.max_prompt_chars = v;
        }
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.router.validate().map_err(ConfigError::Validation)?;
        Ok(self)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

// =============================================================================
// Loading
// =============================================================================

/// Default configuration file path:
/// `$XDG_CONFIG_HOME/quill/quill.toml`, falling back to the platform
/// config directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(dirs::config_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("quill").join("quill.toml")
}

/// Load configuration from the default path. A missing file is not an
/// error: defaults (plus env overrides) apply.
pub fn load_config() -> Result<QuillConfig, ConfigError> {
    let path = default_config_path();
    if path.exists() {
        load_config_from_path(&path)
    } else {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        QuillConfig::default().apply_env_overrides().validated()
    }
}

/// Load configuration from an explicit path.
pub fn load_config_from_path(path: &Path) -> Result<QuillConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: QuillToml = toml::from_str(&raw)?;
    tracing::info!(path = %path.display(), "loaded configuration");
    QuillConfig::from_toml(doc).apply_env_overrides().validated()
}
