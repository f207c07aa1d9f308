// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging surface of the managed transport link.

use async_trait::async_trait;

use crate::error::LeadwireError;
use crate::types::{ConnectionStatus, MessageId, SendTarget};

/// Sends text through the single managed link.
///
/// Implemented by the connection manager; consumed by the reply dispatcher
/// and by any other producer that pushes messages to contacts.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Current connection snapshot.
    fn status(&self) -> ConnectionStatus;

    /// Send `text` to `target`.
    ///
    /// Fails with [`LeadwireError::TransportUnavailable`] unless connected.
    async fn send(&self, target: SendTarget, text: &str) -> Result<MessageId, LeadwireError>;
}
