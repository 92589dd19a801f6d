//! Bounded reconnection policy for the realtime channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Retry limits applied when the realtime transport cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries after the first attempt; zero disables reconnection.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the exponential delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Exponential delay before retry number `attempt` (1-based), before jitter.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use gigflow_client::domain::ReconnectPolicy;
    ///
    /// let policy = ReconnectPolicy {
    ///     max_attempts: 5,
    ///     initial_delay: Duration::from_millis(100),
    ///     max_delay: Duration::from_millis(250),
    /// };
    /// assert_eq!(policy.base_delay(1), Duration::from_millis(100));
    /// assert_eq!(policy.base_delay(2), Duration::from_millis(200));
    /// assert_eq!(policy.base_delay(3), Duration::from_millis(250));
    /// ```
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = 1_u32 << exponent;
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Async sleeping abstraction so tests do not wait on real time.
#[async_trait]
pub trait ReconnectSleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Jitter strategy spreading reconnect storms.
pub trait ReconnectJitter: Send + Sync {
    /// Return the delay to wait given the exponential `base`.
    fn jittered_delay(&self, base: Duration, attempt: u32) -> Duration;
}

/// Tokio-based sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl ReconnectSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Adds up to a quarter of the base delay, drawn from a small PRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl ReconnectJitter for RandomJitter {
    fn jittered_delay(&self, base: Duration, _attempt: u32) -> Duration {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let max_extra = base_ms / 4;
        let extra = if max_extra == 0 {
            0
        } else {
            SmallRng::from_entropy().gen_range(0..=max_extra)
        };
        Duration::from_millis(base_ms.saturating_add(extra))
    }
}

/// Runtime helpers used by the reconnect loop.
#[derive(Clone)]
pub struct ReconnectRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn ReconnectSleeper>,
    /// Jitter strategy for retry delays.
    pub jitter: Arc<dyn ReconnectJitter>,
}

impl Default for ReconnectRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 500)]
    #[case(2, 1_000)]
    #[case(3, 2_000)]
    #[case(6, 10_000)]
    #[case(40, 10_000)]
    fn base_delay_doubles_up_to_the_cap(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay(attempt), Duration::from_millis(expected_ms));
    }

    #[rstest]
    #[case(Duration::ZERO)]
    #[case(Duration::from_millis(3))]
    #[case(Duration::from_millis(400))]
    fn random_jitter_stays_within_a_quarter(#[case] base: Duration) {
        for attempt in 1..=20 {
            let delay = RandomJitter.jittered_delay(base, attempt);
            assert!(delay >= base);
            assert!(delay <= base + base / 4 + Duration::from_millis(1));
        }
    }
}
