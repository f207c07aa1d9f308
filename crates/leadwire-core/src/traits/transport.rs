// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport link trait: the seam to the chat-transport SDK.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::LeadwireError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, TransportEvent};

/// A chat-transport link, treated as an event source and a send sink.
///
/// Only the connection manager drives a link. `open` must return promptly;
/// lifecycle and message events are delivered through `events` afterwards.
#[async_trait]
pub trait TransportLink: PluginAdapter {
    /// Open the link using persisted credentials if present.
    async fn open(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), LeadwireError>;

    /// Send a text message to a transport address.
    async fn send_text(&self, address: &str, text: &str) -> Result<MessageId, LeadwireError>;

    /// Close the link, keeping credentials.
    async fn close(&self) -> Result<(), LeadwireError>;

    /// Wipe locally persisted session credentials.
    async fn clear_session(&self) -> Result<(), LeadwireError>;
}
