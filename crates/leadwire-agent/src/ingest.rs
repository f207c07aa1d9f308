// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message ingestion: raw transport event → durable (contact, conversation, message).
//!
//! Storage errors propagate; everything else here is local computation.

use std::sync::Arc;

use leadwire_core::address::{is_group_or_broadcast, sender_phone};
use leadwire_core::types::{
    Contact, Conversation, InboundContent, InboundEvent, InsertOutcome, MediaKind, Message,
    MessageMetadata, NewContact, NewMessage, SenderType,
};
use leadwire_core::{LeadwireError, StorageAdapter};
use tracing::{debug, info};

/// Why an event produced no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Echo of our own outbound message.
    FromSelf,
    GroupOrBroadcast,
    /// No text, caption or recognizable media.
    NoText,
    /// No phone number could be derived from the sender address.
    UnknownSender,
}

/// The persisted triple produced by one inbound event.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub contact: Contact,
    pub conversation: Conversation,
    pub message: Message,
    pub new_contact: bool,
    pub new_conversation: bool,
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Skipped(SkipReason),
    /// First delivery: the message was persisted.
    Stored(Ingested),
    /// Redelivery of an already persisted message; nothing was written.
    Redelivered(Ingested),
}

/// Text to persist for an inbound message.
///
/// Plain text first, then text with previews, then a media caption, then a
/// placeholder naming the media kind.
pub fn extract_text(content: &InboundContent) -> Option<String> {
    let non_empty = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };

    non_empty(&content.text)
        .or_else(|| non_empty(&content.extended_text))
        .or_else(|| {
            let media = content.media.as_ref()?;
            non_empty(&media.caption).or_else(|| Some(media_placeholder(media.kind).to_string()))
        })
}

fn media_placeholder(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "[imagen]",
        MediaKind::Video => "[video]",
        MediaKind::Document => "[documento]",
        MediaKind::Audio => "[audio]",
        MediaKind::Sticker => "[sticker]",
    }
}

pub struct MessageIngestor {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    channel: String,
}

impl MessageIngestor {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>, channel: impl Into<String>) -> Self {
        Self {
            storage,
            channel: channel.into(),
        }
    }

    /// Persist `event`, resolving or creating its contact and active conversation.
    pub async fn ingest(&self, event: &InboundEvent) -> Result<IngestOutcome, LeadwireError> {
        if event.from_me {
            return Ok(IngestOutcome::Skipped(SkipReason::FromSelf));
        }
        if is_group_or_broadcast(&event.remote_address) {
            return Ok(IngestOutcome::Skipped(SkipReason::GroupOrBroadcast));
        }
        let Some(text) = extract_text(&event.content) else {
            return Ok(IngestOutcome::Skipped(SkipReason::NoText));
        };
        let Some(phone) = sender_phone(&event.remote_address, event.sender_phone.as_deref()) else {
            return Ok(IngestOutcome::Skipped(SkipReason::UnknownSender));
        };

        let (contact, new_contact) = self.resolve_contact(&phone, event).await?;
        let (conversation, new_conversation) = self
            .storage
            .resolve_active_conversation(&contact.id, &self.channel)
            .await?;

        let outcome = self
            .storage
            .insert_message(&NewMessage {
                conversation_id: conversation.id.clone(),
                sender_type: SenderType::Contact,
                content: text,
                sent_at: leadwire_core::now_timestamp(),
                metadata: Some(MessageMetadata {
                    external_id: Some(event.message_id.clone()),
                    transport_timestamp: event.timestamp,
                    automatic: false,
                }),
            })
            .await?;

        let redelivered = matches!(outcome, InsertOutcome::Duplicate(_));
        let message = match outcome {
            InsertOutcome::Inserted(m) | InsertOutcome::Duplicate(m) => m,
        };
        let ingested = Ingested {
            contact,
            conversation,
            message,
            new_contact,
            new_conversation,
        };

        if redelivered {
            debug!(
                message_id = ingested.message.id.as_str(),
                external_id = event.message_id.as_str(),
                "redelivered message ignored"
            );
            return Ok(IngestOutcome::Redelivered(ingested));
        }

        debug!(
            contact_id = ingested.contact.id.as_str(),
            conversation_id = ingested.conversation.id.as_str(),
            message_id = ingested.message.id.as_str(),
            "inbound message stored"
        );
        Ok(IngestOutcome::Stored(ingested))
    }

    async fn resolve_contact(
        &self,
        phone: &str,
        event: &InboundEvent,
    ) -> Result<(Contact, bool), LeadwireError> {
        if let Some(mut contact) = self.storage.find_contact_by_phone(phone).await? {
            if contact.remote_address.is_none() {
                self.storage
                    .set_contact_address(&contact.id, &event.remote_address)
                    .await?;
                debug!(contact_id = contact.id.as_str(), "transport address backfilled");
                contact.remote_address = Some(event.remote_address.clone());
            }
            return Ok((contact, false));
        }

        let assignee = self.storage.first_active_staff().await?;
        let contact = self
            .storage
            .create_contact(&NewContact {
                phone: phone.to_string(),
                name: event
                    .push_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
                remote_address: Some(event.remote_address.clone()),
                assigned_agent_id: assignee.as_ref().map(|s| s.id.clone()),
            })
            .await?;
        info!(
            contact_id = contact.id.as_str(),
            assigned_agent_id = contact.assigned_agent_id.as_deref().unwrap_or("none"),
            "new contact from inbound message"
        );
        Ok((contact, true))
    }
}
