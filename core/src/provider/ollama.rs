//! Ollama Provider
//!
//! Adapter for a local Ollama inference server.
//!
//! # Ollama API
//!
//! - `POST /api/generate` — completions (`stream: false` here)
//! - `GET /api/tags` — list installed models, used as the health probe
//!
//! Token accounting comes from the `eval_count` field of the generate
//! response.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{render_prompt, Provider, ProviderError, ProviderResponse, Usage};
use crate::routing::{GenerationRequest, ProjectContext, ProviderDescriptor, ProviderKind};

/// Client timeout applied when the descriptor does not override it.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter for a local Ollama server.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    eval_count: Option<u64>,
    prompt_eval_count: Option<u64>,
}

impl OllamaProvider {
    /// Construct from a registry descriptor.
    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Result<Self, ProviderError> {
        let timeout = descriptor
            .request_timeout_ms
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_millis);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: descriptor.base_url.trim_end_matches('/').to_string(),
            model: descriptor.model.clone(),
            client,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn process_request(
        &self,
        request: &GenerationRequest,
        context: Option<&ProjectContext>,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": render_prompt(request, context),
            "stream": false,
        });

        let response = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::BAD_REQUEST {
                return Err(ProviderError::Validation(body));
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let usage = generated.eval_count.map(|eval| Usage {
            total_tokens: eval + generated.prompt_eval_count.unwrap_or(0),
        });

        Ok(ProviderResponse {
            content: generated.response,
            model: self.model.clone(),
            usage,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.tags_url())
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
