// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadwire serve` command implementation.
//!
//! Wires SQLite storage, the optional language service, the bridge-backed
//! connection manager and the inbound pipeline, then runs until SIGINT or
//! SIGTERM. Shutdown drains in-flight message stages, closes the link
//! without discarding credentials and checkpoints the database.

use std::sync::Arc;

use leadwire_agent::{Collaborators, build_pipeline, shutdown};
use leadwire_config::model::LeadwireConfig;
use leadwire_core::{LeadwireError, ProviderAdapter, StorageAdapter};
use leadwire_openai::OpenAiProvider;
use leadwire_storage::SqliteStorage;
use leadwire_whatsapp::{BridgeLink, ConnectionEvent, ConnectionManager, ReconnectPolicy};
use qrcode::QrCode;
use qrcode::render::unicode;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the `leadwire serve` command.
pub async fn run_serve(config: LeadwireConfig) -> Result<(), LeadwireError> {
    init_tracing(&config.agent.log_level);

    info!(agent = config.agent.name.as_str(), "starting leadwire serve");

    let storage = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };
    seed_specialists(&config, storage.as_ref()).await?;

    let provider: Option<Arc<dyn ProviderAdapter + Send + Sync>> =
        match OpenAiProvider::from_config(&config.openai)? {
            Some(provider) => Some(Arc::new(provider)),
            None => {
                warn!(
                    "no language service configured, using keyword classification and neutral analysis"
                );
                None
            }
        };

    let link = Arc::new(BridgeLink::from_config(&config.whatsapp));
    let (manager, inbound) = ConnectionManager::new(
        link,
        storage.clone(),
        ReconnectPolicy::from_config(&config.whatsapp),
        config.whatsapp.inbound_queue_capacity,
    );

    let pipeline = build_pipeline(
        &config,
        Collaborators {
            provider,
            storage: storage.clone(),
            orders: storage.clone(),
            messenger: Arc::new(manager.clone()),
        },
    );

    let cancel = shutdown::install_signal_handler();
    tokio::spawn(report_connection_events(manager.subscribe(), cancel.clone()));

    manager.initialize().await?;
    pipeline.run(inbound, cancel).await?;

    if let Err(e) = manager.shutdown().await {
        warn!(error = %e, "transport link did not close cleanly");
    }
    storage.close().await?;

    info!("leadwire serve shutdown complete");
    Ok(())
}

/// Upsert the configured specialist profiles; the router reads them from storage.
async fn seed_specialists(
    config: &LeadwireConfig,
    storage: &dyn StorageAdapter,
) -> Result<(), LeadwireError> {
    for specialist in &config.specialists {
        storage.upsert_specialist(&specialist.to_profile()).await?;
    }
    if config.specialists.is_empty() {
        warn!("no specialists configured, replies will not be grounded");
    } else {
        info!(count = config.specialists.len(), "specialist profiles seeded");
    }
    Ok(())
}

/// Surface connection lifecycle events to the operator.
async fn report_connection_events(
    mut events: broadcast::Receiver<ConnectionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = cancel.cancelled() => break,
        };
        match event {
            Ok(ConnectionEvent::Qr(payload)) => match render_qr(&payload) {
                Some(rendered) => {
                    eprintln!("Scan this code with WhatsApp > Linked devices:\n{rendered}")
                }
                None => warn!("QR payload could not be rendered"),
            },
            Ok(ConnectionEvent::LoggedOut) => {
                error!("WhatsApp account logged out, restart leadwire to link it again");
            }
            Ok(ConnectionEvent::ManualRetryRequired { attempts }) => {
                error!(attempts, "WhatsApp link is down, restart leadwire to retry");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "connection event reporter lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Render a QR payload as terminal block characters.
fn render_qr(payload: &str) -> Option<String> {
    let code = QrCode::new(payload.as_bytes()).ok()?;
    Some(
        code.render::<unicode::Dense1x2>()
            .quiet_zone(true)
            .build(),
    )
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("leadwire={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use leadwire_config::model::{SpecialistConfig, StorageConfig};
    use leadwire_core::types::Specialty;

    use super::*;

    #[test]
    fn qr_payload_renders_as_blocks() {
        let rendered = render_qr("2@AbCdEf,GhIjKl,MnOpQr").unwrap();
        assert!(rendered.lines().count() > 10);
        assert!(rendered.contains('█') || rendered.contains('▀') || rendered.contains('▄'));
    }

    #[tokio::test]
    async fn configured_specialists_are_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("serve.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();

        let config = LeadwireConfig {
            specialists: vec![SpecialistConfig {
                name: "precios".into(),
                specialty: Specialty::Pricing,
                model: None,
                instructions: "Lista de precios: Coca-Cola 2,25L $1.500".into(),
            }],
            ..LeadwireConfig::default()
        };
        seed_specialists(&config, &storage).await.unwrap();

        let profile = storage.get_specialist(Specialty::Pricing).await.unwrap().unwrap();
        assert_eq!(profile.name, "precios");
        assert!(storage.get_specialist(Specialty::Stock).await.unwrap().is_none());
    }
}
