//! Retry policy for transient node failures (e.g. LLM transport errors).

use std::time::Duration;

/// Exponential backoff retry policy applied around each node invocation.
///
/// `CompiledStateGraph::invoke` retries a node up to `max_attempts` times when it
/// returns `Err`, sleeping `initial_delay * backoff_factor^attempt` (capped at
/// `max_delay`) between attempts. A `max_attempts` of `1` disables retries.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            backoff_factor,
        }
    }

    /// Delay before the given zero-based retry attempt (0 = first retry, after the
    /// initial try already failed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_disables_retries() {
        assert_eq!(RetryPolicy::default().max_attempts, 1);
    }

    #[test]
    fn delay_grows_with_backoff_factor_and_caps_at_max_delay() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(1), 2.0);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(1));
    }

    #[test]
    fn max_attempts_is_floored_at_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1), 1.0);
        assert_eq!(policy.max_attempts, 1);
    }
}
