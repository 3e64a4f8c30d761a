use std::time::Duration;

use tessera_config::RetryDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero is treated as one.
  pub max_attempts: u32,
  /// Wait after the first failure; doubles with every further failure.
  pub base_delay: Duration,
  /// Limit on a single attempt. An attempt that runs over counts as failed.
  pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
    Self {
      max_attempts,
      base_delay,
      attempt_timeout: None,
    }
  }

  pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
    self.max_attempts = max_attempts;
    self
  }

  pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.attempt_timeout = timeout;
    self
  }

  /// Wait after the failure of zero-based `attempt`.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    self.base_delay.saturating_mul(factor)
  }

  pub(crate) fn attempts(&self) -> u32 {
    self.max_attempts.max(1)
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::new(3, Duration::from_secs(1))
  }
}

impl From<&RetryDef> for RetryPolicy {
  fn from(def: &RetryDef) -> Self {
    Self {
      max_attempts: def.max_attempts,
      base_delay: Duration::from_millis(def.base_delay_ms),
      attempt_timeout: def.attempt_timeout_ms.map(Duration::from_millis),
    }
  }
}
