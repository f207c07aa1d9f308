// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and pipeline stages.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Transport-level identifier of a sent or received message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Provider,
    Storage,
}

// --- CRM entities ---

/// Ordered sales-pipeline stage of a contact.
///
/// `Lost` sits outside the forward order and is only set by a human.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunnelStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl FunnelStatus {
    /// Position along `NEW → … → WON`; `None` for `LOST`.
    pub fn rank(self) -> Option<u8> {
        match self {
            FunnelStatus::New => Some(0),
            FunnelStatus::Contacted => Some(1),
            FunnelStatus::Qualified => Some(2),
            FunnelStatus::Proposal => Some(3),
            FunnelStatus::Negotiation => Some(4),
            FunnelStatus::Won => Some(5),
            FunnelStatus::Lost => None,
        }
    }
}

/// A lead, identified by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub phone: String,
    pub name: Option<String>,
    /// Transport address used for replies (e.g. `5491122334455@s.whatsapp.net`).
    pub remote_address: Option<String>,
    pub tags: BTreeSet<String>,
    /// 0–100.
    pub score: u8,
    pub funnel_status: FunnelStatus,
    pub assigned_agent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a contact created on first contact.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub phone: String,
    pub name: Option<String>,
    pub remote_address: Option<String>,
    pub assigned_agent_id: Option<String>,
}

/// Atomic read-modify-write applied against the latest persisted contact row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactUpdate {
    /// Tags unioned into the existing set.
    pub add_tags: Vec<String>,
    pub score: ScoreUpdate,
    /// Suggested status; applied only if strictly further along the funnel.
    pub suggested_status: Option<FunnelStatus>,
}

/// How an automated stage moves the score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoreUpdate {
    #[default]
    Keep,
    /// Add a delta (negative deltas are ignored) and clamp to 0..=100.
    Add(i32),
    /// Raise to at least the given value, clamped to 0..=100.
    AtLeast(i32),
}

/// A staff member eligible for lead assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub created_at: String,
}

/// Lifecycle of a conversation. `Open` and `Pending` count as active.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Pending,
    Closed,
}

impl ConversationStatus {
    pub fn is_active(self) -> bool {
        matches!(self, ConversationStatus::Open | ConversationStatus::Pending)
    }
}

/// Groups messages for one contact on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub contact_id: String,
    pub channel: String,
    pub status: ConversationStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Who authored a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Contact,
    Agent,
}

/// Transport metadata stamped on a persisted message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Transport message id, used to dedup redelivered events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Transport timestamp (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_timestamp: Option<i64>,
    /// Set on replies sent by the automatic dispatcher.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub automatic: bool,
}

/// An immutable, persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub content: String,
    pub sent_at: String,
    pub metadata: Option<MessageMetadata>,
}

/// A message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub content: String,
    pub sent_at: String,
    pub metadata: Option<MessageMetadata>,
}

/// Result of inserting a message that may be a redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Message),
    /// A message with the same transport id already exists in the conversation.
    Duplicate(Message),
}

impl InsertOutcome {
    pub fn message(&self) -> &Message {
        match self {
            InsertOutcome::Inserted(m) | InsertOutcome::Duplicate(m) => m,
        }
    }
}

/// Domain of a specialist profile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Specialty {
    Pricing,
    Stock,
    Ordering,
    Complaints,
    General,
}

/// A named, stateless responder grounded in business data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistProfile {
    pub name: String,
    pub specialty: Specialty,
    pub instructions: String,
    pub model: Option<String>,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: String,
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

/// An order synthesized from a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Human-readable reference, e.g. `PED-000042`.
    pub reference: String,
    pub contact_id: String,
    pub conversation_id: String,
    pub items: Vec<OrderItem>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: String,
}

// --- Transport ---

/// Connection Manager states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Initializing,
    AwaitingScan,
    Connected,
    Reconnecting,
    LoggedOut,
}

/// Persisted snapshot of the chat session (one per transport account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub state: ConnectionState,
    pub qr_payload: Option<String>,
    pub account_id: Option<String>,
    pub reconnect_attempts: u32,
    pub connected_at: Option<String>,
    pub updated_at: String,
}

/// Answer to the `status()` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub connected: bool,
    pub qr_payload: Option<String>,
    pub account_id: Option<String>,
}

/// Why the transport link closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum CloseReason {
    /// The account was unlinked from the phone; credentials are void.
    LoggedOut,
    /// Any other close (network drop, server restart, replaced session).
    Other(String),
}

/// Media attached to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Audio,
    Sticker,
}

/// A media part with its optional caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPart {
    pub kind: MediaKind,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Raw content fields of an inbound message, richest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundContent {
    /// Plain conversation text.
    #[serde(default)]
    pub text: Option<String>,
    /// Text with link previews / quoted replies.
    #[serde(default)]
    pub extended_text: Option<String>,
    #[serde(default)]
    pub media: Option<MediaPart>,
}

/// A raw inbound message event as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Transport message id.
    pub message_id: String,
    /// Chat address the message came from.
    pub remote_address: String,
    /// Phone-number address of the sender when the chat address is opaque.
    #[serde(default)]
    pub sender_phone: Option<String>,
    /// Echo of our own outbound message.
    #[serde(default)]
    pub from_me: bool,
    /// Display name set by the sender.
    #[serde(default)]
    pub push_name: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub content: InboundContent,
}

/// Events emitted by a transport link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Credential challenge: a QR payload to scan.
    Qr(String),
    /// Link established for the given account (phone).
    Open { account_id: String },
    Closed { reason: CloseReason },
    Message(InboundEvent),
}

/// Destination of an outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    /// A known contact; its recorded transport address is preferred.
    Contact(String),
    /// A raw transport address or phone number.
    Address(String),
}

// --- Classification results ---

/// Fixed intent taxonomy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    PriceInquiry,
    StockInquiry,
    Order,
    IncompleteOrder,
    GeneralInquiry,
    Complaint,
    PriceListRequest,
    AfterHours,
    Confirmation,
    Farewell,
    Other,
}

impl Intent {
    pub const ALL: [Intent; 12] = [
        Intent::Greeting,
        Intent::PriceInquiry,
        Intent::StockInquiry,
        Intent::Order,
        Intent::IncompleteOrder,
        Intent::GeneralInquiry,
        Intent::Complaint,
        Intent::PriceListRequest,
        Intent::AfterHours,
        Intent::Confirmation,
        Intent::Farewell,
        Intent::Other,
    ];

    /// Parse a label, accepting `price-inquiry` as well as `price_inquiry`.
    pub fn parse_label(label: &str) -> Option<Intent> {
        label.trim().replace('-', "_").parse().ok()
    }
}

/// Three-level scale used for urgency and priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Coarse intent reported by the engagement analysis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum EngagementIntent {
    Information,
    Purchase,
    Complaint,
    Other,
}

/// Classification of the latest message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
    pub mentioned_entities: Vec<String>,
    pub priority: Level,
    pub follow_up_required: bool,
}

/// Sentiment/qualification scoring over the recent window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementResult {
    pub sentiment: Sentiment,
    pub intent: EngagementIntent,
    pub urgency: Level,
    pub suggested_score: u8,
    pub suggested_status: FunnelStatus,
    pub summary: String,
    pub suggested_reply: Option<String>,
}

impl EngagementResult {
    /// Safe result used whenever analysis fails.
    pub fn neutral_default() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            intent: EngagementIntent::Information,
            urgency: Level::Medium,
            suggested_score: 50,
            suggested_status: FunnelStatus::Contacted,
            summary: String::new(),
            suggested_reply: None,
        }
    }
}

// --- Language service ---

/// Pipeline stage a language-service request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Feature {
    Engagement,
    Intent,
    Specialist,
    Reply,
}

/// Response-shape constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

/// A single chat turn sent to the language service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

impl ProviderMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A request to the language-capable service.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub feature: Feature,
    /// Model override; `None` uses the provider default.
    pub model: Option<String>,
    pub system_prompt: String,
    pub messages: Vec<ProviderMessage>,
    pub response_format: ResponseFormat,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A response from the language-capable service.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub id: String,
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_labels_round_trip_through_display() {
        for intent in Intent::ALL {
            let label = intent.to_string();
            assert_eq!(Intent::parse_label(&label), Some(intent));
        }
    }

    #[test]
    fn intent_accepts_kebab_labels() {
        assert_eq!(Intent::parse_label("price-inquiry"), Some(Intent::PriceInquiry));
        assert_eq!(Intent::parse_label("Price_List_Request"), Some(Intent::PriceListRequest));
        assert_eq!(Intent::parse_label("shopping"), None);
    }

    #[test]
    fn funnel_status_parses_case_insensitively() {
        assert_eq!("qualified".parse::<FunnelStatus>().unwrap(), FunnelStatus::Qualified);
        assert_eq!("WON".parse::<FunnelStatus>().unwrap(), FunnelStatus::Won);
        assert_eq!(FunnelStatus::Negotiation.to_string(), "NEGOTIATION");
    }

    #[test]
    fn lost_has_no_rank() {
        assert_eq!(FunnelStatus::Lost.rank(), None);
        assert_eq!(FunnelStatus::New.rank(), Some(0));
        assert_eq!(FunnelStatus::Won.rank(), Some(5));
    }

    #[test]
    fn neutral_default_matches_documented_values() {
        let d = EngagementResult::neutral_default();
        assert_eq!(d.sentiment, Sentiment::Neutral);
        assert_eq!(d.intent, EngagementIntent::Information);
        assert_eq!(d.urgency, Level::Medium);
        assert_eq!(d.suggested_score, 50);
        assert_eq!(d.suggested_status, FunnelStatus::Contacted);
        assert!(d.suggested_reply.is_none());
    }

    #[test]
    fn inbound_event_deserializes_with_defaults() {
        let json = r#"{"message_id":"ABC","remote_address":"5491100000000@s.whatsapp.net"}"#;
        let ev: InboundEvent = serde_json::from_str(json).unwrap();
        assert!(!ev.from_me);
        assert_eq!(ev.content, InboundContent::default());
    }

    #[test]
    fn message_metadata_skips_empty_fields() {
        let meta = MessageMetadata {
            external_id: Some("X1".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"external_id":"X1"}"#);
    }
}
