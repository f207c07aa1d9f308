// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message pipeline for the Leadwire lead-engagement CRM.
//!
//! The [`Pipeline`] is the consuming end of the connection manager's inbound
//! queue. For every message it:
//! - Persists contact, conversation and message ([`ingest`])
//! - Scores engagement and classifies intent concurrently
//! - Consults a specialist when the intent needs business data
//! - Sends an automatic reply through the managed link ([`dispatcher`])
//!
//! Only ingestion failures surface; every later stage degrades to its default.

pub mod dispatcher;
pub mod engagement;
pub mod ingest;
pub mod pipeline;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use leadwire_config::model::LeadwireConfig;
use leadwire_core::{Messenger, OrderService, ProviderAdapter, StorageAdapter};
use leadwire_router::{IntentClassifier, SpecialistRouter};

pub use dispatcher::{DispatchOutcome, ReplyDispatcher, ReplySource};
pub use engagement::EngagementAnalyzer;
pub use ingest::{IngestOutcome, MessageIngestor, SkipReason};
pub use pipeline::{Pipeline, PipelineSettings, StageReport, Stages};

/// External collaborators the pipeline is wired to.
#[derive(Clone)]
pub struct Collaborators {
    /// `None` when no language service is configured.
    pub provider: Option<Arc<dyn ProviderAdapter + Send + Sync>>,
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    pub orders: Arc<dyn OrderService + Send + Sync>,
    pub messenger: Arc<dyn Messenger + Send + Sync>,
}

/// Build the full pipeline from configuration.
pub fn build_pipeline(config: &LeadwireConfig, deps: Collaborators) -> Pipeline {
    let timeout = Duration::from_secs(config.pipeline.stage_timeout_secs);
    let stages = Stages {
        analyzer: EngagementAnalyzer::new(deps.provider.clone(), deps.storage.clone(), timeout),
        classifier: IntentClassifier::new(
            deps.provider.clone(),
            deps.storage.clone(),
            timeout,
            config.pipeline.intent_context_turns,
        ),
        router: SpecialistRouter::new(
            deps.provider.clone(),
            deps.storage.clone(),
            deps.orders,
            timeout,
        ),
        dispatcher: ReplyDispatcher::new(
            deps.provider,
            deps.messenger,
            deps.storage.clone(),
            config.pipeline.auto_reply,
            timeout,
        )
        .with_model(config.pipeline.reply_model.clone()),
    };
    Pipeline::new(
        MessageIngestor::new(deps.storage.clone(), config.whatsapp.channel.clone()),
        stages,
        deps.storage,
        PipelineSettings::from_config(&config.pipeline),
    )
}
