// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for the language-capable service.

use async_trait::async_trait;

use crate::error::LeadwireError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for a language-capable completion service.
///
/// Takes system instructions, a message list, a response-shape constraint,
/// a sampling temperature and a token budget, and returns text (or JSON
/// text when constrained). Callers must treat every error as recoverable.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, LeadwireError>;
}
