// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inbound pipeline loop.
//!
//! Events are ingested one at a time, in arrival order. Each stored message
//! then gets its own background task running the post-ingestion stages:
//!
//! ```text
//!            ┌─ engagement analyzer ─────────────────┐
//! window ────┤                                       ├─► reply dispatcher
//!            └─ intent classifier ─► specialist router ┘
//! ```
//!
//! The analyzer and classifier run as separate tasks, so a panic in one
//! leaves the other intact; each falls back to its documented default.

use std::sync::Arc;
use std::time::Duration;

use leadwire_config::model::PipelineConfig;
use leadwire_core::types::{EngagementResult, InboundEvent, IntentResult, Message};
use leadwire_core::{LeadwireError, StorageAdapter};
use leadwire_router::keywords::classify_keywords;
use leadwire_router::{IntentClassifier, RouteRequest, SpecialistRouter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatchOutcome, ReplyContext, ReplyDispatcher};
use crate::engagement::EngagementAnalyzer;
use crate::ingest::{IngestOutcome, Ingested, MessageIngestor};

/// Tunables of the post-ingestion stages.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Messages of history handed to the analyzer.
    pub history_window: usize,
    /// Prior turns handed to the classifier.
    pub intent_context_turns: usize,
    /// How long shutdown waits for in-flight stage tasks.
    pub drain_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            history_window: config.history_window,
            intent_context_turns: config.intent_context_turns,
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// What the post-ingestion stages produced for one message.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub intent: IntentResult,
    pub engagement: EngagementResult,
    pub grounding: Option<String>,
    pub reply: DispatchOutcome,
}

/// The stage components, shared by every message task.
pub struct Stages {
    pub analyzer: EngagementAnalyzer,
    pub classifier: IntentClassifier,
    pub router: SpecialistRouter,
    pub dispatcher: ReplyDispatcher,
}

pub struct Pipeline {
    ingestor: MessageIngestor,
    stages: Arc<Stages>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    settings: PipelineSettings,
    tracker: TaskTracker,
}

impl Pipeline {
    pub fn new(
        ingestor: MessageIngestor,
        stages: Stages,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            ingestor,
            stages: Arc::new(stages),
            storage,
            settings,
            tracker: TaskTracker::new(),
        }
    }

    /// Consume `inbound` until it closes or `cancel` fires, then drain.
    pub async fn run(
        &self,
        mut inbound: mpsc::Receiver<InboundEvent>,
        cancel: CancellationToken,
    ) -> Result<(), LeadwireError> {
        info!("pipeline running");
        loop {
            tokio::select! {
                event = inbound.recv() => {
                    let Some(event) = event else {
                        info!("inbound queue closed, stopping pipeline");
                        break;
                    };
                    if let Err(e) = self.submit(event).await {
                        error!(error = %e, class = e.class(), "failed to ingest inbound message");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping pipeline");
                    break;
                }
            }
        }
        self.drain().await;
        Ok(())
    }

    /// Ingest one event and, if it was stored, start its stages in the background.
    ///
    /// Returns the stage task so callers can await the outcome. Ingestion
    /// errors are returned; stage errors never are.
    pub async fn submit(
        &self,
        event: InboundEvent,
    ) -> Result<Option<JoinHandle<StageReport>>, LeadwireError> {
        match self.ingestor.ingest(&event).await? {
            IngestOutcome::Stored(ingested) => {
                let stages = Arc::clone(&self.stages);
                let storage = Arc::clone(&self.storage);
                let settings = self.settings;
                Ok(Some(self.tracker.spawn(async move {
                    run_stages(stages, storage, settings, ingested).await
                })))
            }
            IngestOutcome::Redelivered(_) => Ok(None),
            IngestOutcome::Skipped(reason) => {
                debug!(reason = ?reason, message_id = event.message_id.as_str(), "inbound event skipped");
                Ok(None)
            }
        }
    }

    /// Stop accepting stage tasks and wait for in-flight ones, up to the drain timeout.
    pub async fn drain(&self) {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight == 0 {
            return;
        }
        info!(in_flight, "waiting for in-flight message stages");
        if tokio::time::timeout(self.settings.drain_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.tracker.len(),
                "drain timeout reached, abandoning in-flight stages"
            );
        }
    }
}

async fn run_stages(
    stages: Arc<Stages>,
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    settings: PipelineSettings,
    ingested: Ingested,
) -> StageReport {
    let Ingested {
        contact,
        conversation,
        message,
        ..
    } = ingested;

    let window = match storage
        .recent_messages(&conversation.id, settings.history_window.max(1))
        .await
    {
        Ok(window) if !window.is_empty() => window,
        Ok(_) => vec![message.clone()],
        Err(e) => {
            warn!(error = %e, conversation_id = conversation.id.as_str(), "failed to load history");
            vec![message.clone()]
        }
    };
    let window = Arc::new(window);

    let analyzer = {
        let stages = Arc::clone(&stages);
        let contact = contact.clone();
        let window = Arc::clone(&window);
        tokio::spawn(async move { stages.analyzer.evaluate(&contact, &window).await })
    };

    let classifier = {
        let stages = Arc::clone(&stages);
        let window = Arc::clone(&window);
        let contact_id = contact.id.clone();
        let message = message.clone();
        let turns = settings.intent_context_turns;
        tokio::spawn(async move {
            let prior = prior_turns(&window, &message, turns);
            let result = stages.classifier.classify(&message.content, prior).await;
            if let Err(e) = stages.classifier.apply(&contact_id, &result).await {
                warn!(error = %e, contact_id = contact_id.as_str(), "failed to apply intent policy");
            }
            result
        })
    };

    let intent = classifier.await.unwrap_or_else(|e| {
        error!(error = %e, "intent classifier task failed");
        classify_keywords(&message.content)
    });

    let grounding = stages
        .router
        .route(RouteRequest {
            intent: intent.intent,
            text: &message.content,
            contact_id: &contact.id,
            conversation_id: &conversation.id,
        })
        .await;

    let engagement = analyzer.await.unwrap_or_else(|e| {
        error!(error = %e, "engagement analyzer task failed");
        EngagementResult::neutral_default()
    });

    let reply = stages
        .dispatcher
        .dispatch(ReplyContext {
            contact: &contact,
            conversation_id: &conversation.id,
            message: &message,
            window: &window,
            grounding: grounding.as_deref(),
            engagement: &engagement,
        })
        .await;

    debug!(
        contact_id = contact.id.as_str(),
        conversation_id = conversation.id.as_str(),
        intent = %intent.intent,
        grounded = grounding.is_some(),
        "message stages finished"
    );
    StageReport {
        intent,
        engagement,
        grounding,
        reply,
    }
}

/// Up to `turns` messages preceding `latest` in `window`.
fn prior_turns<'a>(window: &'a [Message], latest: &Message, turns: usize) -> &'a [Message] {
    let end = window
        .iter()
        .rposition(|m| m.id == latest.id)
        .unwrap_or(window.len());
    &window[end.saturating_sub(turns)..end]
}
