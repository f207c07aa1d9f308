// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for calling the language-capable service.
//!
//! Every call goes through [`complete_within`], which bounds the wait and maps
//! a missing provider to [`LeadwireError::CapabilityUnavailable`]. Structured
//! answers are never trusted: [`parse_json_reply`] yields [`Parsed::Invalid`]
//! with the raw text whenever deserialization fails.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LeadwireError;
use crate::traits::ProviderAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Outcome of shape-checking a language-service answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Valid(T),
    Invalid(String),
}

impl<T> Parsed<T> {
    /// Convert to a result, turning `Invalid` into `MalformedCapabilityResponse`.
    pub fn into_result(self) -> Result<T, LeadwireError> {
        match self {
            Parsed::Valid(v) => Ok(v),
            Parsed::Invalid(raw) => Err(LeadwireError::MalformedCapabilityResponse { raw }),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Parsed::Valid(_))
    }
}

/// Send `request` to `provider`, waiting at most `timeout`.
pub async fn complete_within(
    provider: Option<&(dyn ProviderAdapter + Send + Sync)>,
    request: ProviderRequest,
    timeout: Duration,
) -> Result<ProviderResponse, LeadwireError> {
    let provider = provider.ok_or_else(|| LeadwireError::CapabilityUnavailable {
        message: "no language service configured".to_string(),
    })?;

    let feature = request.feature;
    match tokio::time::timeout(timeout, provider.complete(request)).await {
        Ok(Ok(response)) => {
            debug!(
                feature = %feature,
                model = response.model.as_str(),
                output_tokens = response.usage.output_tokens,
                "language service call completed"
            );
            Ok(response)
        }
        Ok(Err(e)) => Err(e),
        Err(_elapsed) => Err(LeadwireError::Timeout { duration: timeout }),
    }
}

/// Deserialize the JSON object embedded in a language-service answer.
///
/// Tolerates surrounding prose and markdown code fences by taking the span
/// from the first `{` to the last `}`.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Parsed<T> {
    let body = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => return Parsed::Invalid(raw.to_string()),
    };
    match serde_json::from_str::<T>(body) {
        Ok(value) => Parsed::Valid(value),
        Err(e) => {
            debug!(error = %e, "language service answer failed shape validation");
            Parsed::Invalid(raw.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::traits::PluginAdapter;
    use crate::types::{
        AdapterType, Feature, HealthStatus, ResponseFormat, TokenUsage,
    };

    #[derive(Debug, Deserialize, PartialEq)]
    struct Shape {
        intent: String,
        confidence: f32,
    }

    struct SlowProvider;

    #[async_trait]
    impl PluginAdapter for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Provider
        }
        async fn health_check(&self) -> Result<HealthStatus, LeadwireError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), LeadwireError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ProviderAdapter for SlowProvider {
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, LeadwireError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(ProviderResponse {
                id: "late".into(),
                content: "{}".into(),
                model: "slow".into(),
                usage: TokenUsage::default(),
            })
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            feature: Feature::Intent,
            model: None,
            system_prompt: "classify".into(),
            messages: vec![],
            response_format: ResponseFormat::JsonObject,
            temperature: 0.0,
            max_tokens: 64,
        }
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"intent\":\"order\",\"confidence\":0.9}\n```";
        let parsed: Parsed<Shape> = parse_json_reply(raw);
        assert_eq!(
            parsed,
            Parsed::Valid(Shape {
                intent: "order".into(),
                confidence: 0.9
            })
        );
    }

    #[test]
    fn wrong_shape_is_invalid_with_raw_text() {
        let raw = "{\"intent\": 3}";
        let parsed: Parsed<Shape> = parse_json_reply(raw);
        assert_eq!(parsed, Parsed::Invalid(raw.to_string()));
    }

    #[test]
    #[tracing_test::traced_test]
    fn shape_failure_is_logged() {
        let _: Parsed<Shape> = parse_json_reply("{\"confidence\": \"high\"}");
        assert!(logs_contain("failed shape validation"));
    }

    #[test]
    fn prose_without_object_is_invalid() {
        let parsed: Parsed<Shape> = parse_json_reply("I think it's an order");
        assert!(!parsed.is_valid());
        assert!(matches!(
            parsed.into_result(),
            Err(LeadwireError::MalformedCapabilityResponse { .. })
        ));
    }

    #[tokio::test]
    async fn missing_provider_is_capability_unavailable() {
        let err = complete_within(None, request(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadwireError::CapabilityUnavailable { .. }));
        assert!(err.is_capability_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let provider = SlowProvider;
        let err = complete_within(Some(&provider), request(), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadwireError::Timeout { .. }));
    }
}
