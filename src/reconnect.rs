//! Reconnection policy with exponential backoff.
//!
//! After a connection or transport failure the supervisor waits
//! `initial_delay * multiplier^n`, capped at `max_delay`, before re-running
//! the whole handshake. The attempt counter resets once a session reaches
//! PLAY again.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{duration_ms, opt_duration_ms};
use crate::error::{Result, RtspError};

/// Default delay before the first reconnection attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Default upper bound on the delay between attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Reconnection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Whether to reconnect at all.
    pub enabled: bool,
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Growth factor between consecutive delays (>= 1.0).
    pub multiplier: f64,
    /// Give up after this many consecutive failed attempts; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Give up once the summed delays of one outage would exceed this.
    #[serde(rename = "give_up_after_ms", with = "opt_duration_ms")]
    pub give_up_after: Option<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: 2.0,
            max_attempts: None,
            give_up_after: None,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Check that the numbers make sense.
    pub fn validate(&self) -> Result<()> {
        if !(self.multiplier >= 1.0 && self.multiplier.is_finite()) {
            return Err(RtspError::Config(format!(
                "reconnect multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(RtspError::Config(
                "reconnect max_delay must not be smaller than initial_delay".into(),
            ));
        }
        Ok(())
    }

    /// Start a fresh backoff sequence.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Iterator-like backoff state for one outage.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
    elapsed: Duration,
}

impl Backoff {
    /// Delay before the next attempt, or `None` when the policy gives up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.policy.enabled {
            return None;
        }
        if let Some(max) = self.policy.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let factor = self.policy.multiplier.powi(self.attempt.min(64) as i32);
        let delay = self
            .policy
            .initial_delay
            .mul_f64(factor.min(u32::MAX as f64))
            .min(self.policy.max_delay);

        if let Some(limit) = self.policy.give_up_after {
            if self.elapsed + delay > limit {
                return None;
            }
        }

        self.attempt += 1;
        self.elapsed += delay;
        Some(delay)
    }

    /// Attempts handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Start over after a successful reconnection.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.elapsed = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, max_ms: u64) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            ..ReconnectPolicy::default()
        }
    }

    #[test]
    fn test_exponential_growth_capped() {
        let mut backoff = policy(100, 1000).backoff();
        let delays: Vec<u64> = (0..6)
            .map(|_| backoff.next_delay().unwrap().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(backoff.attempts(), 6);
    }

    #[test]
    fn test_max_attempts() {
        let mut p = policy(10, 100);
        p.max_attempts = Some(2);
        let mut backoff = p.backoff();

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_give_up_after() {
        let mut p = policy(100, 100);
        p.give_up_after = Some(Duration::from_millis(250));
        let mut backoff = p.backoff();

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_disabled() {
        let mut backoff = ReconnectPolicy::disabled().backoff();
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_validate() {
        assert!(ReconnectPolicy::default().validate().is_ok());

        let mut p = ReconnectPolicy::default();
        p.multiplier = 0.5;
        assert!(p.validate().is_err());

        let p = policy(1000, 10);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_many_attempts_do_not_overflow() {
        let mut backoff = policy(1, 5000).backoff();
        let mut last = Duration::ZERO;
        for _ in 0..200 {
            last = backoff.next_delay().unwrap();
        }
        assert_eq!(last, Duration::from_millis(5000));
    }
}
