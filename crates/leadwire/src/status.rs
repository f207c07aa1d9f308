// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadwire status` command implementation.
//!
//! Reads the chat session the connection manager persists on every
//! transition, so it works whether or not `serve` is running.

use std::path::Path;

use leadwire_config::model::LeadwireConfig;
use leadwire_core::types::{ChatSession, ConnectionState};
use leadwire_core::{LeadwireError, StorageAdapter};
use leadwire_storage::SqliteStorage;
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: ConnectionState,
    pub connected: bool,
    pub account_id: Option<String>,
    pub awaiting_scan: bool,
    pub reconnect_attempts: u32,
    pub connected_at: Option<String>,
    pub updated_at: Option<String>,
}

impl StatusResponse {
    fn from_session(session: Option<ChatSession>) -> Self {
        match session {
            Some(session) => Self {
                state: session.state,
                connected: session.state == ConnectionState::Connected,
                account_id: session.account_id,
                awaiting_scan: session.qr_payload.is_some(),
                reconnect_attempts: session.reconnect_attempts,
                connected_at: session.connected_at,
                updated_at: Some(session.updated_at),
            },
            None => Self {
                state: ConnectionState::Idle,
                connected: false,
                account_id: None,
                awaiting_scan: false,
                reconnect_attempts: 0,
                connected_at: None,
                updated_at: None,
            },
        }
    }
}

/// Run the `leadwire status` command.
pub async fn run_status(config: &LeadwireConfig, json: bool) -> Result<(), LeadwireError> {
    let session = if Path::new(&config.storage.database_path).exists() {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        storage.load_chat_session().await?
    } else {
        None
    };
    let status = StatusResponse::from_session(session);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print!("{}", format_status(&status));
    }
    Ok(())
}

fn format_status(status: &StatusResponse) -> String {
    let mut out = format!("whatsapp: {}\n", status.state);
    if let Some(account) = &status.account_id {
        out.push_str(&format!("  account: {account}\n"));
    }
    if let Some(since) = &status.connected_at {
        out.push_str(&format!("  connected since: {since}\n"));
    }
    if status.awaiting_scan {
        out.push_str("  waiting for the QR code to be scanned (see the serve output)\n");
    }
    if status.reconnect_attempts > 0 {
        out.push_str(&format!(
            "  reconnect attempts: {}\n",
            status.reconnect_attempts
        ));
    }
    if status.updated_at.is_none() {
        out.push_str("  no session recorded yet, run `leadwire serve`\n");
    }
    out
}
