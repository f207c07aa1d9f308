// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Specialist routing.
//!
//! Intents that need business data (prices, stock, order taking, complaints)
//! are answered by a specialist profile loaded from storage, called as a
//! single stateless turn. The answer becomes grounding for the reply. The
//! ordering specialist answers with JSON; a complete order is recorded
//! through the order service, an incomplete one turns into a question for
//! exactly the missing fields.

use std::sync::Arc;
use std::time::Duration;

use leadwire_core::capability::{complete_within, parse_json_reply};
use leadwire_core::types::{
    Feature, Intent, OrderItem, ProviderMessage, ProviderRequest, ResponseFormat,
    SpecialistProfile, Specialty,
};
use leadwire_core::{LeadwireError, OrderService, ProviderAdapter, StorageAdapter};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::mapping::specialty_for;

/// Appended to the ordering specialist's instructions so its answer parses.
const ORDER_FORMAT: &str = "\n\nRespondé solo con un objeto JSON: \
{\"valid\": boolean, \"items\": [{\"product\": string, \"quantity\": number, \"unit\": string|null}], \
\"summary\": string, \"missing\": [string]}. \
Usá valid=false y listá en \"missing\" los datos que el cliente no indicó; nunca inventes cantidades ni productos.";

/// Everything the router needs about the message being answered.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub intent: Intent,
    pub text: &'a str,
    pub contact_id: &'a str,
    pub conversation_id: &'a str,
}

/// Answer of the ordering specialist.
#[derive(Debug, Deserialize)]
struct OrderDraft {
    valid: bool,
    #[serde(default)]
    items: Vec<OrderItem>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    missing: Vec<String>,
}

pub struct SpecialistRouter {
    provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    orders: Arc<dyn OrderService + Send + Sync>,
    timeout: Duration,
}

impl SpecialistRouter {
    pub fn new(
        provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        orders: Arc<dyn OrderService + Send + Sync>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            storage,
            orders,
            timeout,
        }
    }

    /// Grounding text for the reply, or `None` when the intent needs no
    /// specialist or the specialist could not answer.
    pub async fn route(&self, request: RouteRequest<'_>) -> Option<String> {
        let specialty = specialty_for(request.intent)?;
        match self.consult(specialty, request).await {
            Ok(grounding) => grounding,
            Err(e) => {
                warn!(
                    error = %e,
                    class = e.class(),
                    specialty = %specialty,
                    conversation_id = request.conversation_id,
                    "specialist unavailable, replying without grounding"
                );
                None
            }
        }
    }

    async fn consult(
        &self,
        specialty: Specialty,
        request: RouteRequest<'_>,
    ) -> Result<Option<String>, LeadwireError> {
        let Some(profile) = self.storage.get_specialist(specialty).await? else {
            debug!(specialty = %specialty, "no specialist profile configured");
            return Ok(None);
        };

        let answer = self.ask(&profile, request.text).await?;
        if specialty == Specialty::Ordering {
            return self.take_order(&answer, request).await.map(Some);
        }

        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        debug!(specialist = profile.name.as_str(), "specialist answered");
        Ok(Some(answer.to_string()))
    }

    async fn ask(&self, profile: &SpecialistProfile, text: &str) -> Result<String, LeadwireError> {
        let ordering = profile.specialty == Specialty::Ordering;
        let system_prompt = if ordering {
            format!("{}{ORDER_FORMAT}", profile.instructions)
        } else {
            profile.instructions.clone()
        };
        let request = ProviderRequest {
            feature: Feature::Specialist,
            model: profile.model.clone(),
            system_prompt,
            messages: vec![ProviderMessage::user(text)],
            response_format: if ordering {
                ResponseFormat::JsonObject
            } else {
                ResponseFormat::Text
            },
            temperature: if ordering { 0.0 } else { 0.3 },
            max_tokens: 500,
        };
        let response = complete_within(self.provider.as_deref(), request, self.timeout).await?;
        Ok(response.content)
    }

    async fn take_order(
        &self,
        answer: &str,
        request: RouteRequest<'_>,
    ) -> Result<String, LeadwireError> {
        let draft: OrderDraft = parse_json_reply(answer).into_result()?;
        let items: Vec<OrderItem> = draft
            .items
            .into_iter()
            .filter(|i| !i.product.trim().is_empty() && i.quantity > 0.0)
            .collect();

        if !draft.valid || items.is_empty() {
            let missing: Vec<String> = draft
                .missing
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            debug!(missing = ?missing, "order incomplete");
            return Ok(missing_fields_question(&missing));
        }

        let summary = draft.summary.filter(|s| !s.trim().is_empty());
        let order = self
            .orders
            .create_from_conversation(
                request.contact_id,
                request.conversation_id,
                &items,
                summary.as_deref(),
            )
            .await?;
        info!(
            reference = order.reference.as_str(),
            conversation_id = request.conversation_id,
            "order taken from conversation"
        );
        Ok(order_confirmation(&order.reference, summary.as_deref(), &items))
    }
}

/// Join with commas and a final "y": `a, b y c`.
fn join_spanish(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} y {last}", init.join(", ")),
    }
}

fn missing_fields_question(missing: &[String]) -> String {
    if missing.is_empty() {
        return "Para tomar tu pedido necesitamos que nos indiques los productos y las cantidades. ¿Nos los pasás?"
            .to_string();
    }
    format!(
        "Para completar tu pedido solo nos falta: {}. ¿Nos lo indicás?",
        join_spanish(missing)
    )
}

fn order_confirmation(reference: &str, summary: Option<&str>, items: &[OrderItem]) -> String {
    let detail = match summary {
        Some(summary) => summary.trim().to_string(),
        None => {
            let lines: Vec<String> = items.iter().map(describe_item).collect();
            join_spanish(&lines)
        }
    };
    format!("Pedido registrado con el número {reference}: {detail}. Te avisamos cuando esté listo.")
}

fn describe_item(item: &OrderItem) -> String {
    let quantity = if item.quantity.fract() == 0.0 {
        format!("{}", item.quantity as i64)
    } else {
        format!("{}", item.quantity)
    };
    match item.unit.as_deref() {
        Some(unit) if !unit.trim().is_empty() => format!("{quantity} {unit} de {}", item.product),
        _ => format!("{quantity} {}", item.product),
    }
}
