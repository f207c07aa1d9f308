// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock language-service adapter for deterministic testing.
//!
//! Answers are scripted per [`Feature`] because the pipeline stages call the
//! service concurrently; a single FIFO would hand answers to the wrong stage.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use leadwire_core::types::{
    AdapterType, Feature, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage,
};
use leadwire_core::{LeadwireError, PluginAdapter, ProviderAdapter};

enum Scripted {
    Reply(String),
    Failure,
    Panic,
}

/// A mock provider that returns pre-configured answers.
///
/// Each feature has its own queue. An empty queue answers with
/// [`LeadwireError::CapabilityUnavailable`], like an unconfigured service.
#[derive(Default)]
pub struct MockProvider {
    scripts: Mutex<HashMap<Feature, VecDeque<Scripted>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer for the next `feature` request.
    pub fn push_reply(&self, feature: Feature, text: impl Into<String>) {
        self.push(feature, Scripted::Reply(text.into()));
    }

    /// Queue a provider error for the next `feature` request.
    pub fn push_failure(&self, feature: Feature) {
        self.push(feature, Scripted::Failure);
    }

    /// Panic while answering the next `feature` request, as a buggy stage would.
    pub fn push_panic(&self, feature: Feature) {
        self.push(feature, Scripted::Panic);
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().expect("mock provider lock").clone()
    }

    pub fn requests_for(&self, feature: Feature) -> Vec<ProviderRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.feature == feature)
            .collect()
    }

    fn push(&self, feature: Feature, scripted: Scripted) {
        self.scripts
            .lock()
            .expect("mock provider lock")
            .entry(feature)
            .or_default()
            .push_back(scripted);
    }

    fn next(&self, feature: Feature) -> Option<Scripted> {
        self.scripts
            .lock()
            .expect("mock provider lock")
            .get_mut(&feature)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
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
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, LeadwireError> {
        let feature = request.feature;
        let model = request.model.clone().unwrap_or_else(|| "mock-model".to_string());
        self.requests
            .lock()
            .expect("mock provider lock")
            .push(request);

        match self.next(feature) {
            Some(Scripted::Reply(content)) => Ok(ProviderResponse {
                id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
                content,
                model,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 20,
                },
            }),
            Some(Scripted::Failure) => Err(LeadwireError::Provider {
                message: "mock provider failure".to_string(),
                source: None,
            }),
            Some(Scripted::Panic) => panic!("mock provider panicked answering {feature}"),
            None => Err(LeadwireError::CapabilityUnavailable {
                message: format!("no scripted answer for {feature}"),
            }),
        }
    }
}
