// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification of the latest customer message.
//!
//! The primary path asks the language service for a JSON classification
//! constrained to the fixed taxonomy; any failure (unconfigured service,
//! timeout, unknown label, wrong shape) falls back to
//! [`classify_keywords`](crate::keywords::classify_keywords). Either way the
//! caller gets a label from the same twelve-value set.

use std::sync::Arc;
use std::time::Duration;

use leadwire_core::capability::{Parsed, complete_within, parse_json_reply};
use leadwire_core::types::{
    Contact, Feature, Intent, IntentResult, Level, Message, ProviderMessage, ProviderRequest,
    ResponseFormat, SenderType,
};
use leadwire_core::{LeadwireError, ProviderAdapter, StorageAdapter};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::keywords::{classify_keywords, defaults_for};
use crate::mapping::policy_for;

const SYSTEM_PROMPT: &str = "\
Sos un clasificador de mensajes de clientes de un comercio mayorista que atiende por WhatsApp.
Clasificá el ÚLTIMO mensaje del cliente en exactamente una de estas intenciones:
greeting, price_inquiry, stock_inquiry, order, incomplete_order, general_inquiry, complaint,
price_list_request, after_hours, confirmation, farewell, other.
- order: pide productos indicando cantidades.
- incomplete_order: quiere pedir pero falta producto o cantidad.
- price_list_request: pide la lista de precios completa o el catálogo.
Usá los mensajes previos solo para desambiguar referencias como \"cuáles tenés?\".
Respondé solo con un objeto JSON:
{\"intent\": string, \"confidence\": number entre 0 y 1, \"mentioned_entities\": [string],
\"priority\": \"high\"|\"medium\"|\"low\", \"follow_up_required\": boolean}";

/// Shape of the language-service answer.
#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    mentioned_entities: Vec<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    follow_up_required: Option<bool>,
}

impl RawClassification {
    fn into_result(self) -> Option<IntentResult> {
        let intent = Intent::parse_label(&self.intent)?;
        let (default_priority, default_follow_up) = defaults_for(intent);
        Some(IntentResult {
            intent,
            confidence: self.confidence.unwrap_or(0.8).clamp(0.0, 1.0),
            mentioned_entities: self
                .mentioned_entities
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            priority: self
                .priority
                .and_then(|p| p.parse::<Level>().ok())
                .unwrap_or(default_priority),
            follow_up_required: self.follow_up_required.unwrap_or(default_follow_up),
        })
    }
}

/// Validate a raw classification answer against the taxonomy.
pub fn parse_classification(raw: &str) -> Parsed<IntentResult> {
    match parse_json_reply::<RawClassification>(raw) {
        Parsed::Valid(c) => match c.into_result() {
            Some(result) => Parsed::Valid(result),
            None => Parsed::Invalid(raw.to_string()),
        },
        Parsed::Invalid(raw) => Parsed::Invalid(raw),
    }
}

/// Classifies messages and applies the intent policy to the contact.
pub struct IntentClassifier {
    provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    model: Option<String>,
    timeout: Duration,
    context_turns: usize,
}

impl IntentClassifier {
    pub fn new(
        provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        timeout: Duration,
        context_turns: usize,
    ) -> Self {
        Self {
            provider,
            storage,
            model: None,
            timeout,
            context_turns,
        }
    }

    /// Use a specific model instead of the provider default.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Classify `text`, using up to `context_turns` of `prior` (oldest first)
    /// for disambiguation. Never fails.
    pub async fn classify(&self, text: &str, prior: &[Message]) -> IntentResult {
        match self.classify_remote(text, prior).await {
            Ok(result) => {
                debug!(intent = %result.intent, confidence = result.confidence, "intent classified");
                result
            }
            Err(e) => {
                let result = classify_keywords(text);
                warn!(
                    error = %e,
                    class = e.class(),
                    intent = %result.intent,
                    "intent classification fell back to keyword patterns"
                );
                result
            }
        }
    }

    async fn classify_remote(
        &self,
        text: &str,
        prior: &[Message],
    ) -> Result<IntentResult, LeadwireError> {
        let request = ProviderRequest {
            feature: Feature::Intent,
            model: self.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            messages: vec![ProviderMessage::user(self.user_prompt(text, prior))],
            response_format: ResponseFormat::JsonObject,
            temperature: 0.0,
            max_tokens: 200,
        };
        let response = complete_within(self.provider.as_deref(), request, self.timeout).await?;
        parse_classification(&response.content).into_result()
    }

    fn user_prompt(&self, text: &str, prior: &[Message]) -> String {
        let start = prior.len().saturating_sub(self.context_turns);
        let context = &prior[start..];
        if context.is_empty() {
            return format!("Mensaje a clasificar: {text}");
        }
        let mut prompt = String::from("Mensajes previos:\n");
        for m in context {
            let who = match m.sender_type {
                SenderType::Contact => "cliente",
                SenderType::Agent => "comercio",
            };
            prompt.push_str(&format!("- {who}: {}\n", m.content));
        }
        prompt.push_str(&format!("\nMensaje a clasificar: {text}"));
        prompt
    }

    /// Apply the intent's tag, score delta and status floor to the contact,
    /// read-modify-write against the latest persisted row.
    pub async fn apply(
        &self,
        contact_id: &str,
        result: &IntentResult,
    ) -> Result<Contact, LeadwireError> {
        let update = policy_for(result.intent).to_update();
        let contact = self.storage.update_contact(contact_id, &update).await?;
        debug!(
            contact_id,
            intent = %result.intent,
            score = contact.score,
            status = %contact.funnel_status,
            "intent policy applied"
        );
        Ok(contact)
    }
}
