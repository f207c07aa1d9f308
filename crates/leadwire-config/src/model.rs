// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Leadwire pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use leadwire_core::types::{SpecialistProfile, Specialty};
use serde::{Deserialize, Serialize};

/// Top-level Leadwire configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeadwireConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Chat-transport link settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Language-capable service settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Post-ingestion stage settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Specialist profiles seeded into storage at startup.
    #[serde(default)]
    pub specialists: Vec<SpecialistConfig>,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Name used in logs and the language-service system prompts.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "leadwire".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Chat-transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// WebSocket URL of the transport bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Directory where the bridge keeps session credentials.
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    /// Retry unexpected closes automatically.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// First reconnect delay; doubles on each attempt.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Ceiling of the reconnect delay.
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Attempts before giving up and waiting for a manual retry.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Bound of the queue between the transport and the pipeline.
    #[serde(default = "default_inbound_queue_capacity")]
    pub inbound_queue_capacity: usize,

    /// Channel label stamped on conversations.
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            session_dir: default_session_dir(),
            auto_reconnect: true,
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            inbound_queue_capacity: default_inbound_queue_capacity(),
            channel: default_channel(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:3001".to_string()
}

fn default_session_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("leadwire").join("session"))
        .unwrap_or_else(|| std::path::PathBuf::from("session"))
        .to_string_lossy()
        .into_owned()
}

fn default_true() -> bool {
    true
}

fn default_reconnect_base_ms() -> u64 {
    2_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_inbound_queue_capacity() -> usize {
    256
}

fn default_channel() -> String {
    "whatsapp".to_string()
}

/// OpenAI-compatible chat completions configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. `None` leaves the language service unavailable; stages fall
    /// back to their defaults.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the API.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Default model for every stage.
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries on transient HTTP statuses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout_secs() -> u64 {
    25
}

fn default_max_retries() -> u32 {
    1
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("leadwire").join("leadwire.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("leadwire.db"))
        .to_string_lossy()
        .into_owned()
}

/// Post-ingestion stage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Send analyzer-suggested replies and specialist answers automatically.
    #[serde(default = "default_true")]
    pub auto_reply: bool,

    /// Messages fed to the engagement analysis.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Prior turns fed to the intent classification.
    #[serde(default = "default_intent_context_turns")]
    pub intent_context_turns: usize,

    /// Upper bound on each language-service call.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    /// Grace period for in-flight stages at shutdown.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Model override for reply generation.
    #[serde(default)]
    pub reply_model: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_reply: true,
            history_window: default_history_window(),
            intent_context_turns: default_intent_context_turns(),
            stage_timeout_secs: default_stage_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            reply_model: None,
        }
    }
}

fn default_history_window() -> usize {
    15
}

fn default_intent_context_turns() -> usize {
    3
}

fn default_stage_timeout_secs() -> u64 {
    30
}

fn default_drain_timeout_secs() -> u64 {
    10
}

/// A specialist profile entry in `[[specialists]]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpecialistConfig {
    /// Display name.
    pub name: String,

    /// Domain served (pricing, stock, ordering, complaints, general).
    pub specialty: Specialty,

    /// Model override for this specialist.
    #[serde(default)]
    pub model: Option<String>,

    /// Grounding instructions: catalog, prices, stock, policies.
    pub instructions: String,
}

impl SpecialistConfig {
    pub fn to_profile(&self) -> SpecialistProfile {
        SpecialistProfile {
            name: self.name.clone(),
            specialty: self.specialty,
            instructions: self.instructions.clone(),
            model: self.model.clone(),
        }
    }
}
