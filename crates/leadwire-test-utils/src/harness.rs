// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full inbound stack with mock adapters: a temp
//! SQLite database, a [`MockLink`] behind a real [`ConnectionManager`], a
//! [`MockProvider`] and the pipeline built exactly as `serve` builds it.
//! `deliver()` drives one inbound event through ingestion and every stage.

use std::sync::Arc;
use std::time::Duration;

use leadwire_agent::{Collaborators, Pipeline, StageReport, build_pipeline};
use leadwire_config::model::{LeadwireConfig, PipelineConfig, StorageConfig};
use leadwire_core::address::default_address;
use leadwire_core::types::{
    InboundContent, InboundEvent, SpecialistProfile, Specialty, StaffMember,
};
use leadwire_core::{LeadwireError, ProviderAdapter, StorageAdapter};
use leadwire_storage::SqliteStorage;
use leadwire_whatsapp::{ConnectionEvent, ConnectionManager, ReconnectPolicy};
use tokio::sync::{broadcast, mpsc};

use crate::mock_link::MockLink;
use crate::mock_provider::MockProvider;

/// Account the default mock link reports on open.
pub const ACCOUNT_ID: &str = "5491199999999";

/// How long harness helpers wait for an asynchronous outcome.
const WAIT: Duration = Duration::from_secs(5);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    with_provider: bool,
    auto_reply: bool,
    policy: ReconnectPolicy,
    link: Option<MockLink>,
    specialists: Vec<SpecialistProfile>,
    staff: Vec<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            with_provider: true,
            auto_reply: true,
            policy: ReconnectPolicy {
                auto_reconnect: true,
                base: Duration::from_millis(10),
                cap: Duration::from_millis(40),
                max_attempts: 5,
            },
            link: None,
            specialists: Vec::new(),
            staff: Vec::new(),
        }
    }

    /// Run the pipeline with no language service configured.
    pub fn without_provider(mut self) -> Self {
        self.with_provider = false;
        self
    }

    pub fn with_auto_reply(mut self, enabled: bool) -> Self {
        self.auto_reply = enabled;
        self
    }

    /// Override the fast default backoff (10ms base, 40ms cap, 5 attempts).
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a pre-scripted link instead of one that connects on every open.
    pub fn with_link(mut self, link: MockLink) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_specialist(mut self, profile: SpecialistProfile) -> Self {
        self.specialists.push(profile);
        self
    }

    /// Seed one specialist per routed specialty.
    pub fn with_default_specialists(mut self) -> Self {
        for (name, specialty) in [
            ("precios", Specialty::Pricing),
            ("stock", Specialty::Stock),
            ("pedidos", Specialty::Ordering),
            ("reclamos", Specialty::Complaints),
        ] {
            self.specialists.push(SpecialistProfile {
                name: name.to_string(),
                specialty,
                instructions: format!("Respondé consultas de {name} del comercio."),
                model: None,
            });
        }
        self
    }

    /// Create an active staff member; new contacts are assigned to the first one.
    pub fn with_staff(mut self, name: &str) -> Self {
        self.staff.push(name.to_string());
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, LeadwireError> {
        let temp_dir = tempfile::TempDir::new().map_err(LeadwireError::persistence)?;
        let db_path = temp_dir.path().join("test.db");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let storage = Arc::new(SqliteStorage::new(storage_config.clone()));
        storage.initialize().await?;

        for profile in &self.specialists {
            storage.upsert_specialist(profile).await?;
        }
        let mut staff = Vec::with_capacity(self.staff.len());
        for name in &self.staff {
            staff.push(storage.create_staff(name).await?);
        }

        let config = LeadwireConfig {
            storage: storage_config,
            pipeline: PipelineConfig {
                auto_reply: self.auto_reply,
                stage_timeout_secs: 5,
                drain_timeout_secs: 5,
                ..PipelineConfig::default()
            },
            ..LeadwireConfig::default()
        };

        let link = Arc::new(
            self.link
                .unwrap_or_else(|| MockLink::auto_connect(ACCOUNT_ID)),
        );
        let (manager, inbound) = ConnectionManager::new(
            link.clone(),
            storage.clone(),
            self.policy,
            config.whatsapp.inbound_queue_capacity,
        );

        let mock_provider = Arc::new(MockProvider::new());
        let provider = self
            .with_provider
            .then(|| mock_provider.clone() as Arc<dyn ProviderAdapter + Send + Sync>);

        let pipeline = build_pipeline(
            &config,
            Collaborators {
                provider,
                storage: storage.clone(),
                orders: storage.clone(),
                messenger: Arc::new(manager.clone()),
            },
        );

        Ok(TestHarness {
            provider: mock_provider,
            link,
            storage,
            manager,
            pipeline: Arc::new(pipeline),
            staff,
            config,
            inbound: Some(inbound),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// The mock language service. Unused when built `without_provider()`.
    pub provider: Arc<MockProvider>,
    /// The mock transport link behind the manager.
    pub link: Arc<MockLink>,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    pub manager: ConnectionManager,
    pub pipeline: Arc<Pipeline>,
    /// Staff members created by the builder, in creation order.
    pub staff: Vec<StaffMember>,
    pub config: LeadwireConfig,
    inbound: Option<mpsc::Receiver<InboundEvent>>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Initialize the manager and wait until the link reports `Connected`.
    ///
    /// # Panics
    ///
    /// Panics if the manager does not connect within five seconds.
    pub async fn connect(&self) {
        let mut events = self.manager.subscribe();
        self.manager
            .initialize()
            .await
            .expect("initialize never fails");
        wait_for_event(&mut events, |e| {
            matches!(e, ConnectionEvent::Connected { .. })
        })
        .await;
    }

    /// Ingest `event` and wait for its stages to finish.
    ///
    /// Returns `None` when the event was skipped or already stored.
    pub async fn deliver(&self, event: InboundEvent) -> Result<Option<StageReport>, LeadwireError> {
        let Some(stages) = self.pipeline.submit(event).await? else {
            return Ok(None);
        };
        let report = tokio::time::timeout(WAIT, stages)
            .await
            .map_err(|_| LeadwireError::Timeout { duration: WAIT })?
            .map_err(|e| LeadwireError::Internal(format!("stage task failed: {e}")))?;
        Ok(Some(report))
    }

    /// The inbound queue fed by the manager. Can be taken once.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<InboundEvent>> {
        self.inbound.take()
    }
}

/// A plain-text inbound event from `phone`.
pub fn text_event(message_id: &str, phone: &str, text: &str) -> InboundEvent {
    InboundEvent {
        message_id: message_id.to_string(),
        remote_address: default_address(phone),
        sender_phone: None,
        from_me: false,
        push_name: Some("Cliente".to_string()),
        timestamp: Some(1_767_225_600),
        content: InboundContent {
            text: Some(text.to_string()),
            ..InboundContent::default()
        },
    }
}

/// Wait for the first broadcast event matching `matches`, skipping the rest.
///
/// # Panics
///
/// Panics if no matching event arrives within five seconds.
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<ConnectionEvent>,
    matches: impl Fn(&ConnectionEvent) -> bool,
) -> ConnectionEvent {
    let found = tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("connection event channel closed")
                }
            }
        }
    })
    .await;
    found.expect("timed out waiting for connection event")
}
