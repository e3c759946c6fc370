//! Quill Core - Provider Routing for the Quill Coding Assistant
//!
//! This crate provides the request routing and provider-orchestration layer
//! for quill, completely independent of any user interface. It can drive the
//! CLI, an editor integration, or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       quill CLI                           │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │
//! ┌───────────────────────────┼──────────────────────────────┐
//! │                      QUILL CORE                           │
//! │   ┌───────────┐   ┌───────▼────────┐   ┌─────────────┐   │
//! │   │ Security  │──▶│ ProviderRouter │──▶│  Provider   │   │
//! │   │   Gate    │   │ (strategy +    │   │  Registry   │   │
//! │   └───────────┘   │  queue +       │   │ ollama /    │   │
//! │                   │  fallback)     │   │ lm-studio / │   │
//! │                   └────────────────┘   │ hosted      │   │
//! │                                        └─────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ProviderRouter`]: the main orchestration struct
//! - [`GenerationRequest`] / [`ProjectContext`]: per-call inputs
//! - [`RouterConfig`] / [`ProviderDescriptor`]: static configuration
//! - [`RouterEvent`]: per-attempt lifecycle notifications
//! - [`RouterSummary`]: diagnostic metrics snapshot
//!
//! # Quick Start
//!
//! ```ignore
//! use quill_core::{GenerationRequest, ProviderRouter, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = ProviderRouter::initialize(RouterConfig::default())?;
//!
//!     let response = router
//!         .queue_request(GenerationRequest::new("Write a hello world in Rust"), None)
//!         .await?;
//!     println!("{}", response.content);
//!
//!     router.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`routing`]: strategy selection, fallback execution, statistics,
//!   admission control — the core
//! - [`provider`]: adapter implementations for the supported backends
//! - [`security`]: input validation gate
//! - [`config`]: TOML configuration file loading
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on clap or any terminal handling.
//! It's pure orchestration logic that can be embedded anywhere.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod provider;
pub mod routing;
pub mod security;

// Re-exports for convenience
pub use config::{default_config_path, load_config, load_config_from_path, ConfigError, QuillConfig};
pub use provider::{Provider, ProviderError, ProviderResponse, Usage};
pub use routing::{
    ExecutionMode, ExecutionStrategy, GenerationRequest, PerformanceMonitor, ProjectContext,
    ProviderDescriptor, ProviderKind, ProviderRegistry, ProviderRouter, RouterConfig, RouterError,
    RouterEvent, RouterSummary,
};
pub use security::{InputValidator, SecurityConfig, ValidationResult};
