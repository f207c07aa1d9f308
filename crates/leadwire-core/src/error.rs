// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Leadwire pipeline.

use thiserror::Error;

/// The primary error type used across all Leadwire adapter traits and pipeline stages.
#[derive(Debug, Error)]
pub enum LeadwireError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// No active transport link: the connection manager is not `Connected`.
    #[error("transport unavailable: not connected")]
    TransportUnavailable,

    /// The transport account was logged out; a new QR scan is required.
    #[error("transport authentication expired: logged out")]
    TransportAuthExpired,

    /// Transport adapter errors (bridge unreachable, send rejected).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The language-capable service is not configured, unreachable, or timed out.
    #[error("capability unavailable: {message}")]
    CapabilityUnavailable { message: String },

    /// The language-capable service answered with a shape that failed validation.
    #[error("malformed capability response")]
    MalformedCapabilityResponse { raw: String },

    /// Language service HTTP/API errors.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("persistence error: {source}")]
    Persistence {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LeadwireError {
    /// Shorthand for wrapping any storage-layer error.
    pub fn persistence(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        LeadwireError::Persistence {
            source: source.into(),
        }
    }

    /// True for errors meaning "no usable link right now".
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(
            self,
            LeadwireError::TransportUnavailable | LeadwireError::TransportAuthExpired
        )
    }

    /// True for every failure class a post-ingestion stage replaces with its default.
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            LeadwireError::CapabilityUnavailable { .. }
                | LeadwireError::MalformedCapabilityResponse { .. }
                | LeadwireError::Provider { .. }
                | LeadwireError::Timeout { .. }
        )
    }

    /// Short, stable label used as a structured logging field.
    pub fn class(&self) -> &'static str {
        match self {
            LeadwireError::Config(_) => "config",
            LeadwireError::TransportUnavailable => "transport_unavailable",
            LeadwireError::TransportAuthExpired => "transport_auth_expired",
            LeadwireError::Transport { .. } => "transport",
            LeadwireError::CapabilityUnavailable { .. } => "capability_unavailable",
            LeadwireError::MalformedCapabilityResponse { .. } => "malformed_capability_response",
            LeadwireError::Provider { .. } => "provider",
            LeadwireError::Persistence { .. } => "persistence",
            LeadwireError::NotFound { .. } => "not_found",
            LeadwireError::Timeout { .. } => "timeout",
            LeadwireError::Internal(_) => "internal",
        }
    }
}
