// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inbound pipeline end to end: ingestion, analysis, classification,
//! routing and reply, over temp storage and a scripted link.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leadwire_agent::{Collaborators, DispatchOutcome, Pipeline, ReplySource, build_pipeline};
use leadwire_config::model::{LeadwireConfig, StorageConfig};
use leadwire_core::types::{
    EngagementResult, FunnelStatus, Feature, InboundContent, Intent, MediaKind, MediaPart, SenderType,
    ConnectionState, ConnectionStatus, MessageId, SendTarget, TransportEvent,
};
use leadwire_core::{LeadwireError, Messenger, StorageAdapter};
use leadwire_storage::SqliteStorage;
use leadwire_test_utils::{TestHarness, text_event};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PHONE: &str = "5491100000001";
const ADDRESS: &str = "5491100000001@s.whatsapp.net";

const ENGAGED: &str = r#"{"sentiment":"positive","intent":"information","urgency":"low","suggested_score":35,"suggested_status":"CONTACTED","summary":"Saluda","suggested_reply":"¡Hola! ¿En qué te podemos ayudar?"}"#;

async fn connected() -> TestHarness {
    let harness = TestHarness::builder()
        .with_default_specialists()
        .with_staff("Ana")
        .build()
        .await
        .unwrap();
    harness.connect().await;
    harness
}

#[tokio::test]
async fn price_inquiry_gets_a_grounded_reply() {
    let harness = connected().await;
    harness
        .provider
        .push_reply(Feature::Specialist, "Coca-Cola 2,25L: $1.500 por unidad.");
    harness.provider.push_reply(
        Feature::Reply,
        "¡Hola! La Coca-Cola 2,25L sale $1.500 por unidad.",
    );

    let report = harness
        .deliver(text_event("m1", PHONE, "tienes coca?"))
        .await
        .unwrap()
        .unwrap();

    // No intent answer was scripted, so the keyword fallback decided.
    assert_eq!(report.intent.intent, Intent::PriceInquiry);
    assert_eq!(report.grounding.as_deref(), Some("Coca-Cola 2,25L: $1.500 por unidad."));
    let DispatchOutcome::Sent { text, source, .. } = &report.reply else {
        panic!("expected a sent reply, got {:?}", report.reply);
    };
    assert_eq!(*source, ReplySource::Grounded);
    assert_eq!(
        harness.link.sent(),
        vec![(ADDRESS.to_string(), text.clone())]
    );

    let reply_request = &harness.provider.requests_for(Feature::Reply)[0];
    let last = reply_request.messages.last().unwrap();
    assert!(last.content.contains("$1.500 por unidad"));
    assert!(last.content.contains("tienes coca?"));

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    assert!(contact.tags.contains("consulta-precios"));
    assert_eq!(contact.score, 15);
    assert_eq!(contact.funnel_status, FunnelStatus::Qualified);
    assert_eq!(contact.assigned_agent_id.as_deref(), Some(harness.staff[0].id.as_str()));
    assert_eq!(contact.name.as_deref(), Some("Cliente"));

    let conversation = &harness.storage.list_conversations(&contact.id).await.unwrap()[0];
    let transcript = harness.storage.recent_messages(&conversation.id, 10).await.unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].sender_type, SenderType::Contact);
    assert_eq!(transcript[1].sender_type, SenderType::Agent);
    let metadata = transcript[1].metadata.as_ref().unwrap();
    assert!(metadata.automatic);
    assert_eq!(metadata.external_id.as_deref(), Some("mock-out-1"));
}

#[tokio::test]
async fn incomplete_order_asks_only_for_what_is_missing() {
    let harness = connected().await;
    harness.provider.push_reply(
        Feature::Specialist,
        r#"{"valid":false,"items":[{"product":"Coca-Cola 2,25L","quantity":0}],"missing":["cantidad"]}"#,
    );
    harness.provider.push_failure(Feature::Reply);

    let report = harness
        .deliver(text_event("m1", PHONE, "quiero pedir coca"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.intent.intent, Intent::IncompleteOrder);
    let question = "Para completar tu pedido solo nos falta: cantidad. ¿Nos lo indicás?";
    assert_eq!(
        report.reply,
        DispatchOutcome::Sent {
            text: question.to_string(),
            message_id: leadwire_core::MessageId("mock-out-1".into()),
            source: ReplySource::GroundingVerbatim,
        }
    );

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    let conversation = &harness.storage.list_conversations(&contact.id).await.unwrap()[0];
    let orders = harness
        .storage
        .orders_for_conversation(&conversation.id)
        .await
        .unwrap();
    assert!(orders.is_empty());
    assert!(contact.tags.contains("pedido-incompleto"));
}

#[tokio::test]
async fn complete_order_is_registered_and_confirmed() {
    let harness = connected().await;
    harness.provider.push_reply(
        Feature::Intent,
        r#"{"intent":"order","confidence":0.95,"mentioned_entities":["Coca-Cola 2,25L"]}"#,
    );
    harness.provider.push_reply(
        Feature::Specialist,
        r#"{"valid":true,"items":[{"product":"Coca-Cola 2,25L","quantity":10}],"summary":"10 Coca-Cola 2,25L","missing":[]}"#,
    );

    let report = harness
        .deliver(text_event("m1", PHONE, "mandame 10 coca de 2,25"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.intent.intent, Intent::Order);
    let expected =
        "Pedido registrado con el número PED-000001: 10 Coca-Cola 2,25L. Te avisamos cuando esté listo.";
    assert_eq!(report.grounding.as_deref(), Some(expected));
    // Reply generation is unscripted, so the confirmation goes out verbatim.
    assert_eq!(harness.link.sent()[0].1, expected);

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    let conversation = &harness.storage.list_conversations(&contact.id).await.unwrap()[0];
    let orders = harness
        .storage
        .orders_for_conversation(&conversation.id)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].reference, "PED-000001");
    assert_eq!(orders[0].items[0].quantity, 10.0);
    assert_eq!(contact.score, 30);
}

#[tokio::test]
async fn unavailable_service_still_persists_and_uses_defaults() {
    let harness = TestHarness::builder()
        .without_provider()
        .with_default_specialists()
        .build()
        .await
        .unwrap();
    harness.connect().await;

    let report = harness
        .deliver(text_event("m1", PHONE, "hola"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.intent.intent, Intent::Greeting);
    assert!((report.intent.confidence - 0.6).abs() < f32::EPSILON);
    assert_eq!(report.engagement.suggested_score, 50);
    assert_eq!(report.engagement.suggested_status, FunnelStatus::Contacted);
    assert_eq!(report.reply, DispatchOutcome::Skipped);
    assert!(harness.link.sent().is_empty());

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    assert!(contact.tags.contains("saludo"));
    assert_eq!(contact.score, 5);
    assert_eq!(contact.funnel_status, FunnelStatus::Contacted);
    let conversation = &harness.storage.list_conversations(&contact.id).await.unwrap()[0];
    let transcript = harness.storage.recent_messages(&conversation.id, 10).await.unwrap();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].content, "hola");
}

#[tokio::test]
async fn specialist_failure_falls_back_to_suggested_reply() {
    let harness = connected().await;
    harness.provider.push_failure(Feature::Specialist);
    harness.provider.push_reply(Feature::Engagement, ENGAGED);

    let report = harness
        .deliver(text_event("m1", PHONE, "cuanto sale la coca?"))
        .await
        .unwrap()
        .unwrap();

    assert!(report.grounding.is_none());
    let DispatchOutcome::Sent { text, source, .. } = &report.reply else {
        panic!("expected a sent reply, got {:?}", report.reply);
    };
    assert_eq!(*source, ReplySource::Suggested);
    assert_eq!(text, "¡Hola! ¿En qué te podemos ayudar?");
}

#[tokio::test]
async fn analyzer_panic_uses_neutral_default_and_keeps_the_rest() {
    let harness = connected().await;
    harness.provider.push_panic(Feature::Engagement);
    harness
        .provider
        .push_reply(Feature::Specialist, "Coca-Cola 2,25L: $1.500 por unidad.");
    harness
        .provider
        .push_reply(Feature::Reply, "La Coca-Cola 2,25L sale $1.500.");

    let report = harness
        .deliver(text_event("m1", PHONE, "tienes coca?"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.engagement, EngagementResult::neutral_default());
    assert_eq!(report.intent.intent, Intent::PriceInquiry);
    assert!(report.grounding.is_some());
    assert!(matches!(
        report.reply,
        DispatchOutcome::Sent {
            source: ReplySource::Grounded,
            ..
        }
    ));
    assert_eq!(harness.link.sent().len(), 1);

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    assert!(contact.tags.contains("consulta-precios"));
    assert_eq!(contact.score, 15);
}

#[tokio::test]
async fn classifier_panic_falls_back_to_keywords_and_still_replies() {
    let harness = connected().await;
    harness.provider.push_panic(Feature::Intent);
    harness.provider.push_reply(Feature::Engagement, ENGAGED);

    let report = harness
        .deliver(text_event("m1", PHONE, "hola"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.intent.intent, Intent::Greeting);
    assert!((report.intent.confidence - 0.6).abs() < f32::EPSILON);
    assert_eq!(report.engagement.suggested_score, 35);
    let DispatchOutcome::Sent { text, source, .. } = &report.reply else {
        panic!("expected a sent reply, got {:?}", report.reply);
    };
    assert_eq!(*source, ReplySource::Suggested);
    assert_eq!(text, "¡Hola! ¿En qué te podemos ayudar?");

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    assert!(contact.score >= 35);
}

#[tokio::test]
async fn suggested_reply_needs_auto_reply_enabled() {
    let harness = TestHarness::builder()
        .with_auto_reply(false)
        .build()
        .await
        .unwrap();
    harness.connect().await;
    harness.provider.push_reply(Feature::Engagement, ENGAGED);

    let report = harness
        .deliver(text_event("m1", PHONE, "hola"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.engagement.suggested_score, 35);
    assert_eq!(report.reply, DispatchOutcome::Skipped);
    assert!(harness.link.sent().is_empty());

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    // The analyzer raises the floor to 35; the greeting adds 5 before or after.
    assert!(contact.score >= 35);
}

#[tokio::test]
async fn reply_is_dropped_while_disconnected() {
    let harness = TestHarness::builder()
        .with_default_specialists()
        .build()
        .await
        .unwrap();
    harness
        .provider
        .push_reply(Feature::Specialist, "Coca-Cola 2,25L: $1.500 por unidad.");

    let report = harness
        .deliver(text_event("m1", PHONE, "tienes coca?"))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(report.reply, DispatchOutcome::Dropped { .. }));
    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    let conversation = &harness.storage.list_conversations(&contact.id).await.unwrap()[0];
    let transcript = harness.storage.recent_messages(&conversation.id, 10).await.unwrap();
    assert_eq!(transcript.len(), 1);
}

#[tokio::test]
async fn redelivery_runs_nothing_twice() {
    let harness = connected().await;
    let first = harness.deliver(text_event("m1", PHONE, "hola")).await.unwrap();
    assert!(first.is_some());
    let again = harness.deliver(text_event("m1", PHONE, "hola")).await.unwrap();
    assert!(again.is_none());

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    assert_eq!(contact.score, 5);
    let conversation = &harness.storage.list_conversations(&contact.id).await.unwrap()[0];
    assert_eq!(
        harness.storage.recent_messages(&conversation.id, 10).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn echoes_and_group_messages_are_ignored() {
    let harness = connected().await;

    let mut echo = text_event("m1", PHONE, "hola");
    echo.from_me = true;
    assert!(harness.deliver(echo).await.unwrap().is_none());

    let mut group = text_event("m2", PHONE, "hola");
    group.remote_address = "120363000000000000@g.us".into();
    assert!(harness.deliver(group).await.unwrap().is_none());

    let mut empty = text_event("m3", PHONE, "");
    empty.content = InboundContent::default();
    assert!(harness.deliver(empty).await.unwrap().is_none());

    assert!(harness.storage.find_contact_by_phone(PHONE).await.unwrap().is_none());
    assert!(harness.provider.requests().is_empty());
}

#[tokio::test]
async fn media_caption_becomes_the_message_text() {
    let harness = connected().await;
    let mut photo = text_event("m1", PHONE, "");
    photo.content = InboundContent {
        media: Some(MediaPart {
            kind: MediaKind::Image,
            caption: Some("tienen este modelo?".into()),
        }),
        ..InboundContent::default()
    };

    let report = harness.deliver(photo).await.unwrap().unwrap();
    assert_eq!(report.intent.intent, Intent::PriceInquiry);

    let contact = harness.storage.find_contact_by_phone(PHONE).await.unwrap().unwrap();
    let conversation = &harness.storage.list_conversations(&contact.id).await.unwrap()[0];
    let transcript = harness.storage.recent_messages(&conversation.id, 10).await.unwrap();
    assert_eq!(transcript[0].content, "tienen este modelo?");
}

#[tokio::test]
async fn run_loop_consumes_the_inbound_queue_until_cancelled() {
    let mut harness = connected().await;
    harness
        .provider
        .push_reply(Feature::Specialist, "Coca-Cola 2,25L: $1.500 por unidad.");
    let inbound = harness.take_inbound().unwrap();

    let cancel = CancellationToken::new();
    let pipeline = harness.pipeline.clone();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { pipeline.run(inbound, cancel).await }
    });

    harness
        .link
        .emit(TransportEvent::Message(text_event("m1", PHONE, "tienes coca?")))
        .await;

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        while harness.link.sent().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(delivered.is_ok(), "reply was never sent");
    assert_eq!(harness.link.sent()[0].1, "Coca-Cola 2,25L: $1.500 por unidad.");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

/// A messenger with no link behind it.
struct Offline;

#[async_trait]
impl Messenger for Offline {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: ConnectionState::Idle,
            connected: false,
            qr_payload: None,
            account_id: None,
        }
    }

    async fn send(&self, _target: SendTarget, _text: &str) -> Result<MessageId, LeadwireError> {
        Err(LeadwireError::TransportUnavailable)
    }
}

/// A pipeline over storage that stays unusable until `initialize()` is called.
fn pipeline_over_uninitialized_storage(dir: &tempfile::TempDir) -> (Pipeline, Arc<SqliteStorage>) {
    let storage = Arc::new(SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
        wal_mode: true,
    }));
    let pipeline = build_pipeline(
        &LeadwireConfig::default(),
        Collaborators {
            provider: None,
            storage: storage.clone(),
            orders: storage.clone(),
            messenger: Arc::new(Offline),
        },
    );
    (pipeline, storage)
}

#[tokio::test]
async fn ingestion_storage_failure_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _storage) = pipeline_over_uninitialized_storage(&dir);

    let err = pipeline
        .submit(text_event("m1", PHONE, "hola"))
        .await
        .unwrap_err();
    assert!(matches!(err, LeadwireError::Persistence { .. }));
    assert_eq!(err.class(), "persistence");
}

#[tokio::test]
async fn run_loop_survives_an_ingestion_failure() {
    const OTHER: &str = "5491100000002";
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, storage) = pipeline_over_uninitialized_storage(&dir);
    let pipeline = Arc::new(pipeline);

    // Capacity 1: each send returns only once the previous event was taken.
    let (tx, rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let pipeline = pipeline.clone();
        let cancel = cancel.clone();
        async move { pipeline.run(rx, cancel).await }
    });

    let echo = |id: &str| {
        let mut event = text_event(id, PHONE, "eco");
        event.from_me = true;
        event
    };
    tx.send(text_event("m1", PHONE, "hola")).await.unwrap();
    tx.send(echo("e1")).await.unwrap();
    // `e1` was taken, so `m1` has finished failing.
    tx.send(echo("e2")).await.unwrap();

    storage.initialize().await.unwrap();
    tx.send(text_event("m2", OTHER, "hola")).await.unwrap();

    let stored = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(contact) = storage.find_contact_by_phone(OTHER).await.unwrap() {
                return contact;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(stored.is_ok(), "event after the failure was never ingested");
    assert!(storage.find_contact_by_phone(PHONE).await.unwrap().is_none());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
