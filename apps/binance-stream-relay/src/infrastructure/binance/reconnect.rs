//! Reconnection Policy
//!
//! Fixed-delay reconnection for the upstream WebSocket session. The
//! relay deliberately waits a constant interval between a detected
//! disconnect and the next dial rather than retrying immediately, so a
//! misbehaving upstream is never hot-looped against. Optional additive
//! jitter spreads simultaneous reconnects out without ever firing
//! before the configured delay.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay between a detected disconnect and the next connect attempt.
    pub delay: Duration,
    /// Additive jitter as a fraction of the delay (0.1 = up to +10%).
    pub jitter_factor: f64,
    /// Maximum number of reconnection attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            jitter_factor: 0.1,
            max_attempts: 0, // Unlimited
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(delay: Duration, jitter_factor: f64, max_attempts: u32) -> Self {
        Self {
            delay,
            jitter_factor,
            max_attempts,
        }
    }

    /// Create configuration from `FeedSettings`.
    #[must_use]
    pub const fn from_feed_settings(settings: &crate::FeedSettings) -> Self {
        Self {
            delay: settings.reconnect_delay,
            jitter_factor: 0.1, // Default jitter
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Fixed-delay reconnection policy.
///
/// # Example
///
/// ```rust
/// use binance_stream_relay::infrastructure::binance::reconnect::{ReconnectConfig, ReconnectPolicy};
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// // Get delay for first attempt
/// let delay = policy.next_delay();
/// assert!(delay.is_some());
///
/// // Reset after a successful connection
/// policy.reset();
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Get the delay before the next attempt.
    ///
    /// The returned delay is never shorter than the configured one.
    /// Returns `None` if max attempts have been exceeded.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt_count >= self.config.max_attempts {
            return None;
        }

        self.attempt_count += 1;
        Some(self.apply_jitter(self.config.delay))
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Check if reconnection should continue.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    /// Apply additive jitter to a duration.
    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(0.0..=jitter_range);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = (base_millis + jitter) as u64;
        Duration::from_millis(adjusted_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay, Duration::from_secs(5));
        assert!((config.jitter_factor - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 0);
    }

    #[test]
    fn delay_is_constant_across_attempts() {
        let config = ReconnectConfig {
            delay: Duration::from_millis(5000),
            jitter_factor: 0.0, // No jitter for predictable testing
            max_attempts: 0,
        };
        let mut policy = ReconnectPolicy::new(config);

        for _ in 0..5 {
            assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(5000));
        }
        assert_eq!(policy.attempt_count(), 5);
    }

    #[test]
    fn jitter_never_shortens_the_delay() {
        // Run multiple times to test jitter distribution
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                delay: Duration::from_millis(1000),
                jitter_factor: 0.1,
                max_attempts: 0,
            });

            let millis = policy.next_delay().unwrap().as_millis();
            assert!(millis >= 1000, "delay {millis}ms fired before the floor");
            assert!(millis <= 1100, "delay {millis}ms is above maximum 1100ms");
        }
    }

    #[test]
    fn policy_max_attempts() {
        let config = ReconnectConfig {
            delay: Duration::from_millis(100),
            jitter_factor: 0.0,
            max_attempts: 3,
        };
        let mut policy = ReconnectPolicy::new(config);

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert_eq!(policy.attempt_count(), 3);

        // Fourth attempt should fail
        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
    }

    #[test]
    fn policy_reset() {
        let config = ReconnectConfig {
            delay: Duration::from_millis(100),
            jitter_factor: 0.0,
            max_attempts: 3,
        };
        let mut policy = ReconnectPolicy::new(config);

        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert!(policy.should_retry());
    }

    #[test]
    fn unlimited_attempts() {
        let config = ReconnectConfig {
            max_attempts: 0, // Unlimited
            jitter_factor: 0.0,
            ..Default::default()
        };
        let mut policy = ReconnectPolicy::new(config);

        for _ in 0..1000 {
            assert!(policy.should_retry());
            assert!(policy.next_delay().is_some());
        }
    }
}
