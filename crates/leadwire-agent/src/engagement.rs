// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement analysis over the recent conversation window.
//!
//! The language service judges sentiment, coarse intent, urgency and a
//! suggested score/status; this module owns the contract around that call.
//! Any failure yields [`EngagementResult::neutral_default`] and leaves the
//! contact untouched.

use std::sync::Arc;
use std::time::Duration;

use leadwire_core::capability::{Parsed, complete_within, parse_json_reply};
use leadwire_core::scoring::clamp_score;
use leadwire_core::types::{
    Contact, ContactUpdate, EngagementIntent, EngagementResult, Feature, FunnelStatus, Level,
    Message, ProviderMessage, ProviderRequest, ResponseFormat, ScoreUpdate, SenderType,
    Sentiment,
};
use leadwire_core::{LeadwireError, ProviderAdapter, StorageAdapter};
use serde::Deserialize;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "\
Sos un analista comercial. Analizá la conversación de WhatsApp entre un cliente y un comercio mayorista.
Respondé solo con un objeto JSON con estas claves:
- sentiment: \"positive\" | \"neutral\" | \"negative\"
- intent: \"information\" | \"purchase\" | \"complaint\" | \"other\"
- urgency: \"high\" | \"medium\" | \"low\"
- suggested_score: entero de 0 a 100 según la probabilidad de compra
- suggested_status: \"NEW\" | \"CONTACTED\" | \"QUALIFIED\" | \"PROPOSAL\" | \"NEGOTIATION\" | \"WON\"
- summary: resumen de una oración
- suggested_reply: respuesta breve y cordial para el cliente, o null si no corresponde responder";

/// Shape of the language-service answer. `suggested_status` is typed so an
/// unknown label (or `LOST`) fails validation.
#[derive(Debug, Deserialize)]
struct RawEngagement {
    sentiment: Sentiment,
    intent: EngagementIntent,
    urgency: Level,
    suggested_score: f64,
    suggested_status: FunnelStatus,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    suggested_reply: Option<String>,
}

/// Validate an engagement answer.
pub fn parse_engagement(raw: &str) -> Parsed<EngagementResult> {
    let parsed = match parse_json_reply::<RawEngagement>(raw) {
        Parsed::Valid(p) => p,
        Parsed::Invalid(raw) => return Parsed::Invalid(raw),
    };
    if parsed.suggested_status == FunnelStatus::Lost || !parsed.suggested_score.is_finite() {
        return Parsed::Invalid(raw.to_string());
    }
    Parsed::Valid(EngagementResult {
        sentiment: parsed.sentiment,
        intent: parsed.intent,
        urgency: parsed.urgency,
        suggested_score: clamp_score(parsed.suggested_score.round() as i64),
        suggested_status: parsed.suggested_status,
        summary: parsed.summary.trim().to_string(),
        suggested_reply: parsed
            .suggested_reply
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    })
}

pub struct EngagementAnalyzer {
    provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    model: Option<String>,
    timeout: Duration,
}

impl EngagementAnalyzer {
    pub fn new(
        provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            storage,
            model: None,
            timeout,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Analyze `window` (oldest first) and, on success, raise the contact's
    /// score and advance its status. Never fails.
    pub async fn evaluate(&self, contact: &Contact, window: &[Message]) -> EngagementResult {
        let result = match self.analyze(contact, window).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    error = %e,
                    class = e.class(),
                    contact_id = contact.id.as_str(),
                    "engagement analysis failed, using neutral default"
                );
                return EngagementResult::neutral_default();
            }
        };

        let update = ContactUpdate {
            add_tags: Vec::new(),
            score: ScoreUpdate::AtLeast(i32::from(result.suggested_score)),
            suggested_status: Some(result.suggested_status),
        };
        match self.storage.update_contact(&contact.id, &update).await {
            Ok(updated) => debug!(
                contact_id = contact.id.as_str(),
                sentiment = %result.sentiment,
                score = updated.score,
                status = %updated.funnel_status,
                "engagement applied"
            ),
            Err(e) => warn!(
                error = %e,
                contact_id = contact.id.as_str(),
                "failed to apply engagement result"
            ),
        }
        result
    }

    /// The fallible analysis call, without side effects.
    pub async fn analyze(
        &self,
        contact: &Contact,
        window: &[Message],
    ) -> Result<EngagementResult, LeadwireError> {
        let request = ProviderRequest {
            feature: Feature::Engagement,
            model: self.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            messages: vec![ProviderMessage::user(transcript(contact, window))],
            response_format: ResponseFormat::JsonObject,
            temperature: 0.2,
            max_tokens: 400,
        };
        let response = complete_within(self.provider.as_deref(), request, self.timeout).await?;
        parse_engagement(&response.content).into_result()
    }
}

fn transcript(contact: &Contact, window: &[Message]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Cliente: {} ({})\nEstado actual: {}\nPuntaje actual: {}\n",
        contact.name.as_deref().unwrap_or("sin nombre"),
        contact.phone,
        contact.funnel_status,
        contact.score
    ));
    if !contact.tags.is_empty() {
        let tags: Vec<&str> = contact.tags.iter().map(String::as_str).collect();
        out.push_str(&format!("Etiquetas: {}\n", tags.join(", ")));
    }
    out.push_str("\nConversación:\n");
    for m in window {
        let who = match m.sender_type {
            SenderType::Contact => "cliente",
            SenderType::Agent => "comercio",
        };
        out.push_str(&format!("[{}] {who}: {}\n", m.sent_at, m.content));
    }
    out
}

#[cfg(test)]
mod tests {
    use leadwire_config::model::StorageConfig;
    use leadwire_core::types::NewContact;
    use leadwire_storage::SqliteStorage;
    use leadwire_test_utils::MockProvider;

    use super::*;

    const GOOD: &str = r#"{"sentiment":"positive","intent":"purchase","urgency":"high","suggested_score":72.4,"suggested_status":"QUALIFIED","summary":"Quiere comprar gaseosas","suggested_reply":"¡Hola! Sí, tenemos."}"#;

    async fn setup() -> (Arc<SqliteStorage>, Contact, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        }));
        storage.initialize().await.unwrap();
        let contact = storage
            .create_contact(&NewContact {
                phone: "5491100000000".into(),
                name: Some("Marta".into()),
                remote_address: None,
                assigned_agent_id: None,
            })
            .await
            .unwrap();
        (storage, contact, dir)
    }

    #[test]
    fn parses_and_rounds_score() {
        let Parsed::Valid(result) = parse_engagement(GOOD) else {
            panic!("expected valid");
        };
        assert_eq!(result.suggested_score, 72);
        assert_eq!(result.suggested_status, FunnelStatus::Qualified);
        assert_eq!(result.suggested_reply.as_deref(), Some("¡Hola! Sí, tenemos."));
    }

    #[test]
    fn out_of_range_score_is_clamped() {
        let raw = GOOD.replace("72.4", "180");
        let Parsed::Valid(result) = parse_engagement(&raw) else {
            panic!("expected valid");
        };
        assert_eq!(result.suggested_score, 100);
    }

    #[test]
    fn unknown_enum_values_are_invalid() {
        assert!(!parse_engagement(&GOOD.replace("positive", "ecstatic")).is_valid());
        assert!(!parse_engagement(&GOOD.replace("QUALIFIED", "LOST")).is_valid());
        assert!(!parse_engagement("no JSON here").is_valid());
    }

    #[tokio::test]
    async fn success_raises_score_and_status() {
        let (storage, contact, _dir) = setup().await;
        let provider = Arc::new(MockProvider::new());
        provider.push_reply(Feature::Engagement, GOOD);
        let analyzer =
            EngagementAnalyzer::new(Some(provider.clone()), storage.clone(), Duration::from_secs(5));

        let result = analyzer.evaluate(&contact, &[]).await;
        assert_eq!(result.sentiment, Sentiment::Positive);

        let updated = storage.get_contact(&contact.id).await.unwrap().unwrap();
        assert_eq!(updated.score, 72);
        assert_eq!(updated.funnel_status, FunnelStatus::Qualified);

        let prompt = &provider.requests_for(Feature::Engagement)[0].messages[0].content;
        assert!(prompt.contains("Cliente: Marta (5491100000000)"));
    }

    #[tokio::test]
    async fn lower_suggestion_never_lowers_score() {
        let (storage, contact, _dir) = setup().await;
        storage
            .update_contact(
                &contact.id,
                &ContactUpdate {
                    score: ScoreUpdate::AtLeast(90),
                    suggested_status: Some(FunnelStatus::Negotiation),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let provider = Arc::new(MockProvider::new());
        provider.push_reply(Feature::Engagement, GOOD);
        let analyzer =
            EngagementAnalyzer::new(Some(provider), storage.clone(), Duration::from_secs(5));
        analyzer.evaluate(&contact, &[]).await;

        let updated = storage.get_contact(&contact.id).await.unwrap().unwrap();
        assert_eq!(updated.score, 90);
        assert_eq!(updated.funnel_status, FunnelStatus::Negotiation);
    }

    #[tokio::test]
    async fn failure_returns_default_and_writes_nothing() {
        let (storage, contact, _dir) = setup().await;
        let provider = Arc::new(MockProvider::new());
        provider.push_reply(Feature::Engagement, "{\"sentiment\": \"neutral\"}");
        let analyzer =
            EngagementAnalyzer::new(Some(provider), storage.clone(), Duration::from_secs(5));

        let result = analyzer.evaluate(&contact, &[]).await;
        assert_eq!(result, EngagementResult::neutral_default());

        let unchanged = storage.get_contact(&contact.id).await.unwrap().unwrap();
        assert_eq!(unchanged.score, 0);
        assert_eq!(unchanged.funnel_status, FunnelStatus::New);
    }

    #[tokio::test]
    async fn missing_service_returns_default() {
        let (storage, contact, _dir) = setup().await;
        let analyzer = EngagementAnalyzer::new(None, storage, Duration::from_secs(5));
        let result = analyzer.evaluate(&contact, &[]).await;
        assert_eq!(result.suggested_score, 50);
        assert_eq!(result.suggested_status, FunnelStatus::Contacted);
    }
}
