// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, ordered backoff bounds, and unique specialties.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::LeadwireConfig;

/// Largest accepted `pipeline.history_window`.
pub const MAX_HISTORY_WINDOW: usize = 50;

/// Largest accepted `pipeline.intent_context_turns`.
pub const MAX_INTENT_CONTEXT_TURNS: usize = 10;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LeadwireConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let wa = &config.whatsapp;
    if wa.reconnect_base_ms == 0 {
        fail("whatsapp.reconnect_base_ms must be greater than 0".to_string());
    }
    if wa.reconnect_max_ms < wa.reconnect_base_ms {
        fail(format!(
            "whatsapp.reconnect_max_ms ({}) must be at least reconnect_base_ms ({})",
            wa.reconnect_max_ms, wa.reconnect_base_ms
        ));
    }
    if wa.max_reconnect_attempts < 1 {
        fail("whatsapp.max_reconnect_attempts must be at least 1".to_string());
    }
    if wa.inbound_queue_capacity < 1 {
        fail("whatsapp.inbound_queue_capacity must be at least 1".to_string());
    }
    if wa.channel.trim().is_empty() {
        fail("whatsapp.channel must not be empty".to_string());
    }

    let pipeline = &config.pipeline;
    if !(1..=MAX_HISTORY_WINDOW).contains(&pipeline.history_window) {
        fail(format!(
            "pipeline.history_window must be between 1 and {MAX_HISTORY_WINDOW}, got {}",
            pipeline.history_window
        ));
    }
    if pipeline.intent_context_turns > MAX_INTENT_CONTEXT_TURNS {
        fail(format!(
            "pipeline.intent_context_turns must be at most {MAX_INTENT_CONTEXT_TURNS}, got {}",
            pipeline.intent_context_turns
        ));
    }
    if pipeline.stage_timeout_secs == 0 {
        fail("pipeline.stage_timeout_secs must be greater than 0".to_string());
    }

    let mut seen = HashSet::new();
    for (i, specialist) in config.specialists.iter().enumerate() {
        if !seen.insert(specialist.specialty) {
            fail(format!(
                "duplicate specialty `{}` in [[specialists]] array",
                specialist.specialty
            ));
        }
        if specialist.name.trim().is_empty() {
            fail(format!("specialists[{i}].name must not be empty"));
        }
        if specialist.instructions.trim().is_empty() {
            fail(format!("specialists[{i}].instructions must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use leadwire_core::types::Specialty;

    use super::*;
    use crate::model::SpecialistConfig;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    fn specialist(specialty: Specialty, instructions: &str) -> SpecialistConfig {
        SpecialistConfig {
            name: specialty.to_string(),
            specialty,
            model: None,
            instructions: instructions.to_string(),
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&LeadwireConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = LeadwireConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn inverted_backoff_bounds_fail_validation() {
        let mut config = LeadwireConfig::default();
        config.whatsapp.reconnect_base_ms = 5_000;
        config.whatsapp.reconnect_max_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "reconnect_max_ms"));
    }

    #[test]
    fn zero_attempts_and_capacity_fail_validation() {
        let mut config = LeadwireConfig::default();
        config.whatsapp.max_reconnect_attempts = 0;
        config.whatsapp.inbound_queue_capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn history_window_out_of_range_fails_validation() {
        let mut config = LeadwireConfig::default();
        config.pipeline.history_window = 0;
        assert!(has_error(&validate_config(&config).unwrap_err(), "history_window"));
        config.pipeline.history_window = 51;
        assert!(has_error(&validate_config(&config).unwrap_err(), "history_window"));
    }

    #[test]
    fn duplicate_specialty_fails_validation() {
        let mut config = LeadwireConfig::default();
        config.specialists = vec![
            specialist(Specialty::Pricing, "list A"),
            specialist(Specialty::Pricing, "list B"),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "duplicate specialty `pricing`"));
    }

    #[test]
    fn blank_instructions_fail_validation() {
        let mut config = LeadwireConfig::default();
        config.specialists = vec![specialist(Specialty::Stock, "  ")];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "specialists[0].instructions"));
    }
}
