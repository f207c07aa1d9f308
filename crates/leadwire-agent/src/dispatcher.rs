// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automatic replies.
//!
//! Decision order: specialist grounding first (always replied, rephrased by
//! the language service when possible), then the analyzer's suggested reply
//! when automatic replies are enabled, otherwise nothing. Sends go through
//! the [`Messenger`]; a missing link drops the reply.

use std::sync::Arc;
use std::time::Duration;

use leadwire_core::capability::complete_within;
use leadwire_core::types::{
    Contact, EngagementResult, Feature, Message, MessageMetadata, NewMessage, ProviderMessage,
    ProviderRequest, ResponseFormat, SendTarget, SenderType,
};
use leadwire_core::{LeadwireError, MessageId, Messenger, ProviderAdapter, StorageAdapter};
use tracing::{debug, info, warn};

const REPLY_PROMPT: &str = "\
Sos el asistente de ventas por WhatsApp de un comercio mayorista. Respondé en español rioplatense,
en tono cordial y breve (máximo tres oraciones).
Te damos INFORMACIÓN INTERNA verificada: usala tal cual, textual, sin cambiar precios, cantidades,
números de pedido ni condiciones, y sin agregar datos que no estén ahí.
Nunca menciones que existen especialistas, áreas internas, sistemas ni otros asistentes:
respondé como una sola persona.";

/// Where the reply text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// Grounding rephrased by the language service.
    Grounded,
    /// Grounding sent as-is because rephrasing failed.
    GroundingVerbatim,
    /// The analyzer's suggested reply.
    Suggested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        text: String,
        message_id: MessageId,
        source: ReplySource,
    },
    /// Nothing worth sending.
    Skipped,
    /// A reply was ready but could not be delivered; it is not retried.
    Dropped { text: String, reason: String },
}

/// Inputs for one reply decision.
#[derive(Debug, Clone, Copy)]
pub struct ReplyContext<'a> {
    pub contact: &'a Contact,
    pub conversation_id: &'a str,
    /// The customer message being answered.
    pub message: &'a Message,
    /// Conversation window, oldest first. Only rows before `message` are history.
    pub window: &'a [Message],
    pub grounding: Option<&'a str>,
    pub engagement: &'a EngagementResult,
}

pub struct ReplyDispatcher {
    provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
    messenger: Arc<dyn Messenger + Send + Sync>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    auto_reply: bool,
    model: Option<String>,
    timeout: Duration,
}

impl ReplyDispatcher {
    pub fn new(
        provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
        messenger: Arc<dyn Messenger + Send + Sync>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        auto_reply: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            messenger,
            storage,
            auto_reply,
            model: None,
            timeout,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Decide, generate and send the reply for one customer message.
    pub async fn dispatch(&self, ctx: ReplyContext<'_>) -> DispatchOutcome {
        let (text, source) = match ctx.grounding.map(str::trim).filter(|g| !g.is_empty()) {
            Some(grounding) => match self.generate(ctx, grounding).await {
                Ok(text) => (text, ReplySource::Grounded),
                Err(e) => {
                    warn!(
                        error = %e,
                        class = e.class(),
                        conversation_id = ctx.conversation_id,
                        "reply generation failed, sending grounding as-is"
                    );
                    (grounding.to_string(), ReplySource::GroundingVerbatim)
                }
            },
            None => match ctx.engagement.suggested_reply.as_deref() {
                Some(reply) if self.auto_reply && !reply.trim().is_empty() => {
                    (reply.trim().to_string(), ReplySource::Suggested)
                }
                _ => {
                    debug!(conversation_id = ctx.conversation_id, "no automatic reply");
                    return DispatchOutcome::Skipped;
                }
            },
        };

        let message_id = match self
            .messenger
            .send(SendTarget::Contact(ctx.contact.id.clone()), &text)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                if e.is_transport_unavailable() {
                    info!(
                        contact_id = ctx.contact.id.as_str(),
                        class = e.class(),
                        "not connected, automatic reply dropped"
                    );
                } else {
                    warn!(
                        error = %e,
                        contact_id = ctx.contact.id.as_str(),
                        "automatic reply failed, dropped"
                    );
                }
                return DispatchOutcome::Dropped {
                    text,
                    reason: e.to_string(),
                };
            }
        };

        self.record(ctx.conversation_id, &text, &message_id).await;
        info!(
            contact_id = ctx.contact.id.as_str(),
            conversation_id = ctx.conversation_id,
            source = ?source,
            "automatic reply sent"
        );
        DispatchOutcome::Sent {
            text,
            message_id,
            source,
        }
    }

    async fn generate(&self, ctx: ReplyContext<'_>, grounding: &str) -> Result<String, LeadwireError> {
        let latest = ctx.message.content.as_str();
        let history = match ctx.window.iter().rposition(|m| m.id == ctx.message.id) {
            Some(at) => &ctx.window[..at],
            None => ctx.window,
        };

        let mut messages: Vec<ProviderMessage> = history
            .iter()
            .map(|m| match m.sender_type {
                SenderType::Contact => ProviderMessage::user(m.content.clone()),
                SenderType::Agent => ProviderMessage::assistant(m.content.clone()),
            })
            .collect();
        messages.push(ProviderMessage::user(format!(
            "INFORMACIÓN INTERNA:\n{grounding}\n\nMENSAJE DEL CLIENTE:\n{latest}"
        )));

        let request = ProviderRequest {
            feature: Feature::Reply,
            model: self.model.clone(),
            system_prompt: REPLY_PROMPT.to_string(),
            messages,
            response_format: ResponseFormat::Text,
            temperature: 0.4,
            max_tokens: 300,
        };
        let response = complete_within(self.provider.as_deref(), request, self.timeout).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(LeadwireError::MalformedCapabilityResponse {
                raw: response.content,
            });
        }
        Ok(text.to_string())
    }

    /// Keep the sent reply in the transcript. Best-effort.
    async fn record(&self, conversation_id: &str, text: &str, message_id: &MessageId) {
        let message = NewMessage {
            conversation_id: conversation_id.to_string(),
            sender_type: SenderType::Agent,
            content: text.to_string(),
            sent_at: leadwire_core::now_timestamp(),
            metadata: Some(MessageMetadata {
                external_id: Some(message_id.0.clone()),
                transport_timestamp: None,
                automatic: true,
            }),
        };
        if let Err(e) = self.storage.insert_message(&message).await {
            warn!(error = %e, conversation_id, "failed to record automatic reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use leadwire_config::model::StorageConfig;
    use leadwire_core::types::{ConnectionState, ConnectionStatus, NewContact};
    use leadwire_storage::SqliteStorage;
    use leadwire_test_utils::MockProvider;

    use super::*;

    /// Messenger that records sends, or fails them when offline.
    struct RecordingMessenger {
        online: bool,
        sent: Mutex<Vec<(SendTarget, String)>>,
    }

    impl RecordingMessenger {
        fn new(online: bool) -> Arc<Self> {
            Arc::new(Self {
                online,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<(SendTarget, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        fn status(&self) -> ConnectionStatus {
            let state = if self.online {
                ConnectionState::Connected
            } else {
                ConnectionState::Idle
            };
            ConnectionStatus {
                state,
                connected: self.online,
                qr_payload: None,
                account_id: None,
            }
        }

        async fn send(&self, target: SendTarget, text: &str) -> Result<MessageId, LeadwireError> {
            if !self.online {
                return Err(LeadwireError::TransportUnavailable);
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push((target, text.to_string()));
            Ok(MessageId(format!("out-{}", sent.len())))
        }
    }

    struct Fixture {
        storage: Arc<SqliteStorage>,
        contact: Contact,
        conversation_id: String,
        window: Vec<Message>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        }));
        storage.initialize().await.unwrap();
        let contact = storage
            .create_contact(&NewContact {
                phone: "5491100000000".into(),
                name: None,
                remote_address: Some("5491100000000@s.whatsapp.net".into()),
                assigned_agent_id: None,
            })
            .await
            .unwrap();
        let (conversation, _) = storage
            .resolve_active_conversation(&contact.id, "whatsapp")
            .await
            .unwrap();
        let inbound = storage
            .insert_message(&NewMessage {
                conversation_id: conversation.id.clone(),
                sender_type: SenderType::Contact,
                content: "tienes coca?".into(),
                sent_at: leadwire_core::now_timestamp(),
                metadata: None,
            })
            .await
            .unwrap();
        Fixture {
            storage,
            contact,
            conversation_id: conversation.id,
            window: vec![inbound.message().clone()],
            _dir: dir,
        }
    }

    impl Fixture {
        fn ctx<'a>(
            &'a self,
            grounding: Option<&'a str>,
            engagement: &'a EngagementResult,
        ) -> ReplyContext<'a> {
            ReplyContext {
                contact: &self.contact,
                conversation_id: &self.conversation_id,
                message: &self.window[0],
                window: &self.window,
                grounding,
                engagement,
            }
        }
    }

    fn with_suggestion(reply: &str) -> EngagementResult {
        EngagementResult {
            suggested_reply: Some(reply.to_string()),
            ..EngagementResult::neutral_default()
        }
    }

    #[tokio::test]
    async fn grounded_reply_is_generated_and_recorded() {
        let f = fixture().await;
        let provider = Arc::new(MockProvider::new());
        provider.push_reply(Feature::Reply, "¡Sí! La Coca-Cola 2.25L está a $2.500.");
        let messenger = RecordingMessenger::new(true);
        let dispatcher = ReplyDispatcher::new(
            Some(provider.clone()),
            messenger.clone(),
            f.storage.clone(),
            true,
            Duration::from_secs(5),
        );

        let engagement = EngagementResult::neutral_default();
        let outcome = dispatcher
            .dispatch(f.ctx(Some("Coca-Cola 2.25L: $2.500"), &engagement))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Sent {
                source: ReplySource::Grounded,
                ..
            }
        ));
        assert_eq!(
            messenger.sent(),
            vec![(
                SendTarget::Contact(f.contact.id.clone()),
                "¡Sí! La Coca-Cola 2.25L está a $2.500.".to_string()
            )]
        );

        let request = &provider.requests_for(Feature::Reply)[0];
        assert!(request.system_prompt.contains("Nunca menciones que existen especialistas"));
        let last = request.messages.last().unwrap();
        assert!(last.content.contains("Coca-Cola 2.25L: $2.500"));
        assert!(last.content.contains("tienes coca?"));

        let transcript = f.storage.recent_messages(&f.conversation_id, 10).await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].sender_type, SenderType::Agent);
        assert!(transcript[1].metadata.as_ref().is_some_and(|m| m.automatic));
    }

    #[tokio::test]
    async fn reply_answers_the_given_message_not_the_newest_row() {
        let mut f = fixture().await;
        let later = f
            .storage
            .insert_message(&NewMessage {
                conversation_id: f.conversation_id.clone(),
                sender_type: SenderType::Contact,
                content: "y tienen fanta?".into(),
                sent_at: leadwire_core::now_timestamp(),
                metadata: None,
            })
            .await
            .unwrap();
        f.window.push(later.message().clone());

        let provider = Arc::new(MockProvider::new());
        provider.push_reply(Feature::Reply, "La Coca-Cola 2.25L está a $2.500.");
        let dispatcher = ReplyDispatcher::new(
            Some(provider.clone()),
            RecordingMessenger::new(true),
            f.storage.clone(),
            true,
            Duration::from_secs(5),
        );
        let engagement = EngagementResult::neutral_default();
        dispatcher
            .dispatch(f.ctx(Some("Coca-Cola 2.25L: $2.500"), &engagement))
            .await;

        let request = &provider.requests_for(Feature::Reply)[0];
        assert_eq!(request.messages.len(), 1);
        let last = request.messages.last().unwrap();
        assert!(last.content.contains("tienes coca?"));
        assert!(!last.content.contains("fanta"));
    }

    #[tokio::test]
    async fn generation_failure_sends_grounding_verbatim() {
        let f = fixture().await;
        let messenger = RecordingMessenger::new(true);
        let dispatcher = ReplyDispatcher::new(
            None,
            messenger.clone(),
            f.storage.clone(),
            false,
            Duration::from_secs(5),
        );
        let engagement = EngagementResult::neutral_default();
        let outcome = dispatcher
            .dispatch(f.ctx(Some("Coca-Cola 2.25L: $2.500"), &engagement))
            .await;
        let DispatchOutcome::Sent { text, source, .. } = outcome else {
            panic!("expected a sent reply");
        };
        assert_eq!(source, ReplySource::GroundingVerbatim);
        assert_eq!(text, "Coca-Cola 2.25L: $2.500");
    }

    #[tokio::test]
    async fn suggested_reply_respects_auto_reply_switch() {
        let f = fixture().await;
        let engagement = with_suggestion("¡Hola! ¿En qué te ayudo?");

        let messenger = RecordingMessenger::new(true);
        let enabled = ReplyDispatcher::new(
            None,
            messenger.clone(),
            f.storage.clone(),
            true,
            Duration::from_secs(5),
        );
        assert!(matches!(
            enabled.dispatch(f.ctx(None, &engagement)).await,
            DispatchOutcome::Sent {
                source: ReplySource::Suggested,
                ..
            }
        ));

        let messenger = RecordingMessenger::new(true);
        let disabled = ReplyDispatcher::new(
            None,
            messenger.clone(),
            f.storage.clone(),
            false,
            Duration::from_secs(5),
        );
        assert_eq!(
            disabled.dispatch(f.ctx(None, &engagement)).await,
            DispatchOutcome::Skipped
        );
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn nothing_to_say_is_skipped() {
        let f = fixture().await;
        let dispatcher = ReplyDispatcher::new(
            None,
            RecordingMessenger::new(true),
            f.storage.clone(),
            true,
            Duration::from_secs(5),
        );
        let engagement = EngagementResult::neutral_default();
        assert_eq!(
            dispatcher.dispatch(f.ctx(None, &engagement)).await,
            DispatchOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn offline_reply_is_dropped_not_recorded() {
        let f = fixture().await;
        let dispatcher = ReplyDispatcher::new(
            None,
            RecordingMessenger::new(false),
            f.storage.clone(),
            true,
            Duration::from_secs(5),
        );
        let engagement = with_suggestion("¡Hola!");
        let outcome = dispatcher.dispatch(f.ctx(None, &engagement)).await;
        assert!(matches!(outcome, DispatchOutcome::Dropped { .. }));

        let transcript = f.storage.recent_messages(&f.conversation_id, 10).await.unwrap();
        assert_eq!(transcript.len(), 1);
    }
}
