//! Reconciler configuration

use crate::error::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing parameters for protection reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Lease length requested per successful protect call, in minutes
    #[serde(default = "default_lease_minutes")]
    pub lease_minutes: u32,

    /// Share of the lease (0-100) that must elapse after protecting before a release is honored
    #[serde(default = "default_maintain_percent")]
    pub maintain_percent: f64,

    /// Share of the lease (0-100) after which a still-wanted lease is renewed
    #[serde(default = "default_refresh_percent")]
    pub refresh_percent: f64,

    /// Reconciliation cadence in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Consecutive rejections after which failures are logged as errors
    #[serde(default = "default_rejection_alert_threshold")]
    pub rejection_alert_threshold: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            lease_minutes: default_lease_minutes(),
            maintain_percent: default_maintain_percent(),
            refresh_percent: default_refresh_percent(),
            tick_interval_ms: default_tick_interval_ms(),
            rejection_alert_threshold: default_rejection_alert_threshold(),
        }
    }
}

fn default_lease_minutes() -> u32 {
    60
}

fn default_maintain_percent() -> f64 {
    10.0
}

fn default_refresh_percent() -> f64 {
    80.0
}

fn default_tick_interval_ms() -> u64 {
    10_000
}

fn default_rejection_alert_threshold() -> u32 {
    3
}

impl ReconcilerConfig {
    /// Full lease length
    pub fn lease(&self) -> Duration {
        Duration::from_secs(u64::from(self.lease_minutes) * 60)
    }

    /// Minimum time protected before a release is honored
    pub fn maintain_window(&self) -> Duration {
        self.share_of_lease(self.maintain_percent)
    }

    /// Time after a protect call at which the lease is renewed
    pub fn refresh_after(&self) -> Duration {
        self.share_of_lease(self.refresh_percent)
    }

    fn share_of_lease(&self, percent: f64) -> Duration {
        Duration::from_secs_f64(self.lease().as_secs_f64() * percent / 100.0)
    }

    /// Scheduler period
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Check the configuration for values that would break the protection guarantees
    pub fn validate(&self) -> GuardResult<()> {
        if self.lease_minutes == 0 {
            return Err(GuardError::InvalidConfig(
                "lease_minutes must be positive".to_string(),
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(GuardError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }

        for (name, value) in [
            ("maintain_percent", self.maintain_percent),
            ("refresh_percent", self.refresh_percent),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(GuardError::InvalidConfig(format!(
                    "{} must be between 0 and 100, got {}",
                    name, value
                )));
            }
        }

        if self.maintain_percent > self.refresh_percent {
            return Err(GuardError::InvalidConfig(format!(
                "maintain_percent ({}) exceeds refresh_percent ({})",
                self.maintain_percent, self.refresh_percent
            )));
        }

        // A refresh is only noticed on a tick, so it must fit inside the lease with one period to spare.
        if self.refresh_after() + self.tick_interval() >= self.lease() {
            return Err(GuardError::InvalidConfig(format!(
                "refresh at {:?} plus tick interval {:?} reaches lease expiry {:?}",
                self.refresh_after(),
                self.tick_interval(),
                self.lease()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_minute_lease() -> ReconcilerConfig {
        ReconcilerConfig {
            lease_minutes: 1,
            maintain_percent: 10.0,
            refresh_percent: 80.0,
            tick_interval_ms: 10_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ReconcilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lease(), Duration::from_secs(3600));
        assert_eq!(config.tick_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_windows() {
        let config = one_minute_lease();
        assert!(config.validate().is_ok());
        assert_eq!(config.maintain_window(), Duration::from_secs(6));
        assert_eq!(config.refresh_after(), Duration::from_secs(48));
    }

    #[test]
    fn test_rejects_maintain_above_refresh() {
        let config = ReconcilerConfig {
            maintain_percent: 90.0,
            refresh_percent: 50.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GuardError::InvalidConfig(msg)) if msg.contains("exceeds")
        ));
    }

    #[test]
    fn test_rejects_out_of_range_percent() {
        let config = ReconcilerConfig {
            refresh_percent: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ReconcilerConfig {
            maintain_percent: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_lease_and_interval() {
        let config = ReconcilerConfig {
            lease_minutes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ReconcilerConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_refresh_that_cannot_beat_expiry() {
        let config = ReconcilerConfig {
            lease_minutes: 1,
            refresh_percent: 95.0,
            tick_interval_ms: 10_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: ReconcilerConfig =
            serde_json::from_str(r#"{"lease_minutes": 30, "maintain_percent": 0}"#).unwrap();
        assert_eq!(config.lease_minutes, 30);
        assert_eq!(config.maintain_percent, 0.0);
        assert_eq!(config.refresh_percent, 80.0);
        assert_eq!(config.tick_interval_ms, 10_000);
    }
}
