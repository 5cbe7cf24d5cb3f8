//! Tunable limits and timeouts for a containment runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime tuning knobs.
///
/// Every field carries a production default, so `ContainmentConfig::new()`
/// is a working configuration. Individual knobs are overridden with the
/// `with_*` builders or deserialized from partial documents; fields missing
/// from the document keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainmentConfig {
    /// Trailing window consulted by the violation frequency check.
    pub violation_window: Duration,
    /// Recent violations beyond which the circuit breaker trips.
    pub trip_threshold: usize,
    /// Per-boundary cap on retained ledger entries.
    pub ledger_retention: usize,
    /// Upper bound on waiting for an interactive decision.
    pub decision_timeout: Duration,
    /// Upper bound on waiting for a fallback acknowledgement.
    pub fallback_timeout: Duration,
    /// Capacity of each worker command channel.
    pub channel_capacity: usize,
}

impl ContainmentConfig {
    /// Default trailing window for the frequency check.
    pub const DEFAULT_VIOLATION_WINDOW: Duration = Duration::from_secs(600);
    /// Default circuit breaker threshold.
    pub const DEFAULT_TRIP_THRESHOLD: usize = 5;
    /// Default per-boundary ledger retention.
    pub const DEFAULT_LEDGER_RETENTION: usize = 256;
    /// Default interactive decision deadline.
    pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default fallback acknowledgement deadline.
    pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default command channel capacity.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

    /// Configuration with every knob at its default.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violation_window: Self::DEFAULT_VIOLATION_WINDOW,
            trip_threshold: Self::DEFAULT_TRIP_THRESHOLD,
            ledger_retention: Self::DEFAULT_LEDGER_RETENTION,
            decision_timeout: Self::DEFAULT_DECISION_TIMEOUT,
            fallback_timeout: Self::DEFAULT_FALLBACK_TIMEOUT,
            channel_capacity: Self::DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Override the trailing window for the frequency check.
    #[must_use]
    pub const fn with_violation_window(mut self, window: Duration) -> Self {
        self.violation_window = window;
        self
    }

    /// Override the circuit breaker threshold.
    #[must_use]
    pub const fn with_trip_threshold(mut self, threshold: usize) -> Self {
        self.trip_threshold = threshold;
        self
    }

    /// Override the per-boundary ledger retention cap.
    #[must_use]
    pub const fn with_ledger_retention(mut self, retention: usize) -> Self {
        self.ledger_retention = retention;
        self
    }

    /// Override the interactive decision deadline.
    #[must_use]
    pub const fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }

    /// Override the fallback acknowledgement deadline.
    #[must_use]
    pub const fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }

    /// Override the command channel capacity.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Reject values that would disable the engine outright.
    ///
    /// Zero timeouts are legal; they degrade every interactive decision to
    /// the static suggestion table.
    ///
    /// # Errors
    /// - [`ConfigError::Zero`] when a required limit is zero
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.violation_window.is_zero() {
            return Err(ConfigError::Zero("violation_window"));
        }
        if self.trip_threshold == 0 {
            return Err(ConfigError::Zero("trip_threshold"));
        }
        if self.ledger_retention == 0 {
            return Err(ConfigError::Zero("ledger_retention"));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Zero("channel_capacity"));
        }
        Ok(())
    }
}

impl Default for ContainmentConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from [`ContainmentConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A limit that must be positive was zero.
    #[error("{0} must be non-zero")]
    Zero(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ContainmentConfig::new();
        assert_eq!(config.violation_window, Duration::from_secs(600));
        assert_eq!(config.trip_threshold, 5);
        assert_eq!(config.ledger_retention, 256);
        assert_eq!(config.channel_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders_override_single_knobs() {
        let config = ContainmentConfig::new()
            .with_trip_threshold(2)
            .with_violation_window(Duration::from_secs(60));
        assert_eq!(config.trip_threshold, 2);
        assert_eq!(config.violation_window, Duration::from_secs(60));
        // Untouched knobs keep their defaults.
        assert_eq!(config.ledger_retention, 256);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let zero_window = ContainmentConfig::new().with_violation_window(Duration::ZERO);
        assert_eq!(zero_window.validate(), Err(ConfigError::Zero("violation_window")));

        let zero_threshold = ContainmentConfig::new().with_trip_threshold(0);
        assert_eq!(zero_threshold.validate(), Err(ConfigError::Zero("trip_threshold")));

        let zero_retention = ContainmentConfig::new().with_ledger_retention(0);
        assert_eq!(zero_retention.validate(), Err(ConfigError::Zero("ledger_retention")));

        let zero_capacity = ContainmentConfig::new().with_channel_capacity(0);
        assert_eq!(zero_capacity.validate(), Err(ConfigError::Zero("channel_capacity")));
    }

    #[test]
    fn zero_timeouts_are_legal() {
        let config = ContainmentConfig::new()
            .with_decision_timeout(Duration::ZERO)
            .with_fallback_timeout(Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config: ContainmentConfig = serde_json::from_str(r#"{ "trip_threshold": 3 }"#).unwrap();
        assert_eq!(config.trip_threshold, 3);
        assert_eq!(config.violation_window, ContainmentConfig::DEFAULT_VIOLATION_WINDOW);
        assert_eq!(config.channel_capacity, ContainmentConfig::DEFAULT_CHANNEL_CAPACITY);
    }
}
