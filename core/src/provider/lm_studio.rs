//! LM Studio Provider
//!
//! Adapter for a local LM Studio server, which exposes an OpenAI-compatible
//! API:
//!
//! - `POST /v1/chat/completions` — chat completions
//! - `GET /v1/models` — loaded models, used as the health probe
//!
//! The chat wire types are shared with [`HostedProvider`](super::hosted),
//! which speaks the same protocol against a remote endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{render_prompt, Provider, ProviderError, ProviderResponse, Usage};
use crate::routing::{GenerationRequest, ProjectContext, ProviderDescriptor, ProviderKind};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ============================================================================
// OpenAI-Compatible Wire Types
// ============================================================================

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub(crate) choices: Vec<ChatChoice>,
    pub(crate) usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub(crate) message: ChatMessage,
}

#[derive(Deserialize)]
pub(crate) struct ChatMessage {
    pub(crate) content: String,
}

#[derive(Deserialize)]
pub(crate) struct ChatUsage {
    pub(crate) total_tokens: u64,
}

/// Build the JSON body for an OpenAI-compatible chat completion.
pub(crate) fn chat_request_body(
    model: &str,
    request: &GenerationRequest,
    context: Option<&ProjectContext>,
) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{ "role": "user", "content": render_prompt(request, context) }],
        "stream": false,
    })
}

/// Translate an OpenAI-compatible HTTP response into a [`ProviderResponse`].
pub(crate) async fn parse_chat_response(
    response: reqwest::Response,
    model: &str,
) -> Result<ProviderResponse, ProviderError> {
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

    let completion: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ProviderError::MalformedResponse("response has no choices".to_string()))?;

    Ok(ProviderResponse {
        content,
        model: model.to_string(),
        usage: completion.usage.map(|u| Usage {
            total_tokens: u.total_tokens,
        }),
    })
}

// ============================================================================
// LM Studio Adapter
// ============================================================================

/// Adapter for a local LM Studio server.
pub struct LmStudioProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LmStudioProvider {
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

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url)
    }
}

#[async_trait]
impl Provider for LmStudioProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LmStudio
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
            .json(&body)
            .send()
            .await?;

        parse_chat_response(response, &self.model).await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.models_url())
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
