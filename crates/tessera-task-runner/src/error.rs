use thiserror::Error;

use crate::runner::AttemptFailure;

/// Every attempt failed.
#[derive(Debug, Clone, Error)]
#[error("failed after {attempts} attempt(s): {last_error}")]
pub struct RetryError {
  pub attempts: u32,
  pub last_error: String,
  /// One record per attempt, in order.
  pub failures: Vec<AttemptFailure>,
}
