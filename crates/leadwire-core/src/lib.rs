// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Leadwire lead-engagement pipeline.
//!
//! This crate provides the error taxonomy, the CRM domain types, the adapter
//! traits every backend implements, and small pure helpers (address
//! normalization, score/funnel arithmetic, bounded language-service calls)
//! shared by the pipeline crates.

pub mod address;
pub mod capability;
pub mod error;
pub mod scoring;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LeadwireError;
pub use types::{AdapterType, HealthStatus, MessageId};

pub use traits::{
    Messenger, OrderService, PluginAdapter, ProviderAdapter, StorageAdapter, TransportLink,
};

/// Current time as an RFC 3339 UTC string with millisecond precision.
///
/// All persisted timestamps use this format so they sort lexically.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
