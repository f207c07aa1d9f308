// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order subsystem seam.

use async_trait::async_trait;

use crate::error::LeadwireError;
use crate::types::{Order, OrderItem};

/// Creates orders from a conversation.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Create an order and assign it a human-readable reference.
    async fn create_from_conversation(
        &self,
        contact_id: &str,
        conversation_id: &str,
        items: &[OrderItem],
        notes: Option<&str>,
    ) -> Result<Order, LeadwireError>;
}
