//! LLM Provider Adapters
//!
//! Abstracted access to the supported LLM backends through a common trait
//! interface.
//!
//! # Available Providers
//!
//! - **Ollama**: local inference server (native API)
//! - **LM Studio**: local server speaking the OpenAI-compatible protocol
//! - **Hosted**: remote OpenAI-compatible endpoint with Bearer auth
//!
//! # Usage
//!
//! ```ignore
//! use quill_core::provider::{OllamaProvider, Provider};
//! use quill_core::routing::{GenerationRequest, ProviderDescriptor, ProviderKind};
//!
//! let descriptor = ProviderDescriptor::new(ProviderKind::Ollama, "http://localhost:11434", "llama3.2");
//! let provider = OllamaProvider::from_descriptor(&descriptor)?;
//! let response = provider.process_request(&GenerationRequest::new("hello"), None).await?;
//! ```

mod hosted;
mod lm_studio;
mod ollama;
mod traits;

pub use hosted::{HostedProvider, DEFAULT_API_KEY_ENV};
pub use lm_studio::LmStudioProvider;
pub use ollama::OllamaProvider;
pub use traits::{Provider, ProviderError, ProviderResponse, Usage};
