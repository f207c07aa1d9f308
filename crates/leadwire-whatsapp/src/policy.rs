// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnection backoff policy.

use std::time::Duration;

use leadwire_config::model::WhatsAppConfig;

/// Bounded exponential backoff for transport reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retry unexpected closes automatically.
    pub auto_reconnect: bool,
    /// Delay before the first retry.
    pub base: Duration,
    /// Ceiling of the delay.
    pub cap: Duration,
    /// Retries before giving up until a manual `initialize()`.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            base: Duration::from_millis(2_000),
            cap: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self {
            auto_reconnect: config.auto_reconnect,
            base: Duration::from_millis(config.reconnect_base_ms),
            cap: Duration::from_millis(config.reconnect_max_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Delay before retry number `attempt` (1-based): `min(base * 2^(attempt-1), cap)`.
    ///
    /// This doubles, unlike a linear `base * attempt` schedule; the two part
    /// ways from the third retry on. With the defaults five retries wait 2, 4,
    /// 8, 16 and 30 seconds.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.cap, |d| d.min(self.cap))
    }

    /// Whether retry number `attempt` is still allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_cap() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=6).map(|a| policy.delay_for(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn huge_attempt_saturates_at_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), policy.cap);
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = ReconnectPolicy::default();
        assert!(policy.allows(1));
        assert!(policy.allows(5));
        assert!(!policy.allows(6));
        assert!(!policy.allows(0));
    }

    #[test]
    fn built_from_config() {
        let config = WhatsAppConfig {
            reconnect_base_ms: 100,
            reconnect_max_ms: 250,
            max_reconnect_attempts: 2,
            auto_reconnect: false,
            ..WhatsAppConfig::default()
        };
        let policy = ReconnectPolicy::from_config(&config);
        assert!(!policy.auto_reconnect);
        assert_eq!(policy.delay_for(3), Duration::from_millis(250));
        assert!(!policy.allows(3));
    }
}
