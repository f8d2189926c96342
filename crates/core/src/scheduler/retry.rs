use std::time::Duration;

/// Attempt cap and exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(5000) }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `n` (1-based): `base * 2^(n-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Whether another attempt follows a failure of attempt `n`.
    pub fn should_retry(&self, attempt: u32, permanent: bool) -> bool {
        !permanent && attempt < self.max_attempts.max(1)
    }
}
