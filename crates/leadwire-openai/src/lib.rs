// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider adapter for the Leadwire pipeline.
//!
//! This crate implements [`ProviderAdapter`] over the chat completions API,
//! including the JSON-object response constraint the classification stages
//! rely on.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use leadwire_config::model::OpenAiConfig;
use leadwire_core::error::LeadwireError;
use leadwire_core::traits::{PluginAdapter, ProviderAdapter};
use leadwire_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderResponse, ResponseFormat, TokenUsage,
};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatMessage, ChatRequest, ResponseFormatSpec};

/// Chat completions provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var.
pub struct OpenAiProvider {
    client: OpenAiClient,
    default_model: String,
}

impl OpenAiProvider {
    /// Creates a provider from configuration.
    ///
    /// Returns `Ok(None)` when no API key is available, which leaves the
    /// language service unavailable rather than failing startup.
    pub fn from_config(config: &OpenAiConfig) -> Result<Option<Self>, LeadwireError> {
        let Some(api_key) = resolve_api_key(&config.api_key) else {
            return Ok(None);
        };
        let client = OpenAiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
            config.max_retries,
        )?;
        info!(model = %config.model, base_url = %config.base_url, "OpenAI provider initialized");
        Ok(Some(Self {
            client,
            default_model: config.model.clone(),
        }))
    }

    /// Creates a provider with an existing client.
    pub fn with_client(client: OpenAiClient, default_model: impl Into<String>) -> Self {
        Self {
            client,
            default_model: default_model.into(),
        }
    }

    /// Converts a [`ProviderRequest`] into a chat completions request.
    fn to_chat_request(&self, request: &ProviderRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: request.system_prompt.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        }));

        ChatRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: match request.response_format {
                ResponseFormat::JsonObject => Some(ResponseFormatSpec::json_object()),
                ResponseFormat::Text => None,
            },
        }
    }
}

/// Resolve the API key from config or the `OPENAI_API_KEY` environment variable.
fn resolve_api_key(configured: &Option<String>) -> Option<String> {
    configured
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|k| !k.trim().is_empty())
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, LeadwireError> {
        // Avoid spending tokens on health checks.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LeadwireError> {
        debug!("OpenAI provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, LeadwireError> {
        let chat_request = self.to_chat_request(&request);
        let response = self.client.complete(&chat_request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LeadwireError::CapabilityUnavailable {
                message: "language service returned no content".to_string(),
            })?;

        let usage = response.usage.unwrap_or_default();
        Ok(ProviderResponse {
            id: response.id,
            content,
            model: response.model,
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}
