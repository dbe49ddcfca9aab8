//! Reconnect policy for the event listener.

use std::time::Duration;

use taskhub_core::config::ListenerConfig;

/// How the listener retries a lost subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub interval: Duration,
    /// Attempts before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    /// Ceiling for the delay.
    pub max_interval: Duration,
}

impl ReconnectPolicy {
    /// Fixed `interval`, unbounded attempts, no backoff.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            backoff_factor: 1.0,
            max_interval: interval,
        }
    }

    /// Delay before the 1-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let ceiling = self.max_interval.max(self.interval);
        let secs = self.interval.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= ceiling.as_secs_f64() {
            return ceiling;
        }
        Duration::from_secs_f64(secs)
    }

    /// Whether another attempt is allowed after `attempts` failures.
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(60))
    }
}

impl From<&ListenerConfig> for ReconnectPolicy {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            interval: config.reconnect_interval(),
            max_attempts: config.max_reconnect_attempts,
            backoff_factor: config.backoff_factor,
            max_interval: config.max_reconnect_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fixed_one_minute() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(50), Duration::from_secs(60));
        assert!(policy.allows(u32::MAX - 1));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = ReconnectPolicy {
            interval: Duration::from_secs(1),
            max_attempts: Some(3),
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[test]
    fn test_from_listener_config() {
        let policy = ReconnectPolicy::from(&ListenerConfig::default());
        assert_eq!(policy, ReconnectPolicy {
            interval: Duration::from_secs(60),
            max_attempts: None,
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(300),
        });
    }
}
