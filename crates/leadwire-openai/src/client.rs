// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the chat completions API.
//!
//! One [`OpenAiClient`] per process. Requests carry a bearer token and are
//! retried after [`RETRY_DELAY`] when the service answers 429 or a 5xx, or
//! when the connection fails before any answer.

use std::time::Duration;

use leadwire_core::LeadwireError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatRequest, ChatResponse};

/// Pause between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Chat completions over HTTPS.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

/// Result of one HTTP round trip.
enum Attempt {
    Done(Result<ChatResponse, LeadwireError>),
    /// Worth another try; carries the error to report if none is left.
    Transient(LeadwireError),
}

fn provider_error(message: String, source: impl std::error::Error + Send + Sync + 'static) -> LeadwireError {
    LeadwireError::Provider {
        message,
        source: Some(Box::new(source)),
    }
}

impl OpenAiClient {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(
        api_key: &str,
        base_url: &str,
        request_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, LeadwireError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| LeadwireError::Config(format!("API key is not a valid header value: {e}")))?;
        let headers = HeaderMap::from_iter([
            (AUTHORIZATION, bearer),
            (CONTENT_TYPE, HeaderValue::from_static("application/json")),
        ]);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| provider_error(format!("failed to build HTTP client: {e}"), e))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            max_retries,
        })
    }

    /// Post `request`, retrying transient failures up to `max_retries` times.
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LeadwireError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Attempt::Done(result) => return result,
                Attempt::Transient(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, max_retries = self.max_retries, "completion failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Attempt::Transient(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, request: &ChatRequest) -> Attempt {
        let response = match self.client.post(&self.endpoint).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                let retryable = e.is_timeout() || e.is_connect();
                let error = provider_error(format!("HTTP request failed: {e}"), e);
                return if retryable {
                    Attempt::Transient(error)
                } else {
                    Attempt::Done(Err(error))
                };
            }
        };

        let status = response.status();
        debug!(status = %status, "completion response received");
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Attempt::Done(Err(provider_error(
                    format!("failed to read response body: {e}"),
                    e,
                )));
            }
        };

        if status.is_success() {
            return Attempt::Done(
                serde_json::from_str::<ChatResponse>(&body)
                    .map_err(|e| provider_error(format!("unexpected response shape: {e}"), e)),
            );
        }

        let error = LeadwireError::Provider {
            message: describe_failure(status, &body),
            source: None,
        };
        if is_transient(status) {
            Attempt::Transient(error)
        } else {
            Attempt::Done(Err(error))
        }
    }
}

/// Prefer the API's own error type and message over the raw body.
fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(envelope) => format!(
            "API returned {status} ({}): {}",
            envelope.error.type_.as_deref().unwrap_or("unknown"),
            envelope.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
