//! Retry schedule for connections lost before login.
//!
//! A connection that drops before the server acknowledged a login is retried
//! automatically. The first retry follows `initial_delay` (immediate by
//! default); each further consecutive failure waits `base_delay * multiplier^n`,
//! capped at `max_delay`, optionally with full jitter. The schedule resets
//! once the server acknowledges a login, or on an explicit reconnect.

use std::time::Duration;

use rand::Rng;

/// Reconnection policy for pre-login connection loss.
///
/// # Example
///
/// ```
/// use reveri_client::backoff::ReconnectPolicy;
/// use std::time::Duration;
///
/// let policy = ReconnectPolicy::default()
///     .with_max_attempts(5)
///     .with_jitter(false);
/// assert_eq!(policy.delay_for(0), Duration::ZERO);
/// assert_eq!(policy.delay_for(1), Duration::from_millis(250));
/// assert_eq!(policy.delay_for(2), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry after a drop.
    pub initial_delay: Duration,
    /// Delay before the second retry; later retries grow from here.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive retries.
    pub multiplier: f64,
    /// Randomize each delay uniformly in `[0, delay]`.
    pub jitter: bool,
    /// Give up after this many consecutive failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that retries immediately and forever.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
            max_attempts: None,
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Values below 1.0 are clamped to 1.0.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Un-jittered delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Returns `true` once `attempt` consecutive failures exhaust the policy.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Tracks consecutive connection attempts against a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay for the next retry, or `None` when the policy is exhausted.
    /// Advances the attempt counter.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.policy.is_exhausted(self.attempt) {
            return None;
        }
        let delay = self.policy.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        if self.policy.jitter && !delay.is_zero() {
            let factor = rand::thread_rng().gen_range(0.0..=1.0);
            return Some(delay.mul_f64(factor));
        }
        Some(delay)
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn first_retry_is_immediate_by_default() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn delays_grow_and_cap() {
        let policy = ReconnectPolicy::default().with_jitter(false);
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(3), Duration::from_secs(1));
        assert_eq!(policy.delay_for(30), Duration::from_secs(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn backoff_stops_after_max_attempts() {
        let mut backoff = Backoff::new(ReconnectPolicy::immediate().with_max_attempts(2));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert!(backoff.next_delay().is_some());
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = ReconnectPolicy::default().with_initial_delay(Duration::from_millis(100));
        let mut backoff = Backoff::new(policy);
        for _ in 0..20 {
            let delay = backoff.next_delay().unwrap();
            assert!(delay <= Duration::from_secs(10));
        }
    }

    #[test]
    fn multiplier_is_clamped() {
        let policy = ReconnectPolicy::default()
            .with_multiplier(0.1)
            .with_jitter(false);
        assert_eq!(policy.delay_for(5), Duration::from_millis(250));
    }
}
