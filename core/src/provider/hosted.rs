//! Hosted Provider
//!
//! Adapter for a remote hosted OpenAI-compatible endpoint. Unlike the local
//! adapters this one authenticates with a Bearer token read from the
//! environment at construction time; a missing key fails construction, and
//! the registry excludes the provider rather than aborting startup.

use std::time::Duration;

use async_trait::async_trait;

use super::lm_studio::{chat_request_body, parse_chat_response};
use super::traits::{Provider, ProviderError, ProviderResponse};
use crate::routing::{GenerationRequest, ProjectContext, ProviderDescriptor, ProviderKind};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variable consulted when the descriptor names none.
pub const DEFAULT_API_KEY_ENV: &str = "QUILL_API_KEY";

/// Adapter for a remote hosted OpenAI-compatible provider.
#[derive(Debug)]
pub struct HostedProvider {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl HostedProvider {
    /// Construct from a registry descriptor, reading the API key from the
    /// configured environment variable.
    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Result<Self, ProviderError> {
        let key_env = descriptor
            .api_key_env
            .as_deref()
            .unwrap_or(DEFAULT_API_KEY_ENV);
        let api_key = std::env::var(key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey(key_env.to_string()))?;

        let timeout = descriptor
            .request_timeout_ms
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_millis);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: descriptor.base_url.trim_end_matches('/').to_string(),
            model: descriptor.model.clone(),
            api_key,
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url)
    }
}

#[async_trait]
impl Provider for HostedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Hosted
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn process_request(
        &self,
        request: &GenerationRequest,
        context: Option<&ProjectContext>,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = chat_request_body(&self.model, request, context);
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        parse_chat_response(response, &self.model).await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.models_url())
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Api {
                status: response.status().as_u16(),
                body: String::new(),
            })
        }
    }
}
