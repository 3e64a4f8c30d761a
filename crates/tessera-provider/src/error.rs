//! Error types for generation backends.

use std::fmt;

use thiserror::Error;

/// A failed call to a generation backend.
///
/// Every variant is treated as transient by the task runner.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
  /// The client could not be built (bad URL, missing key, ...).
  #[error("provider configuration error: {0}")]
  Config(String),

  /// The request never produced an HTTP response.
  #[error("request failed: {0}")]
  Transport(String),

  /// The backend answered with a non-success status.
  #[error("HTTP {status}: {message}")]
  Http { status: u16, message: String },

  /// The backend answered but the body was not a usable completion.
  #[error("invalid response: {0}")]
  InvalidResponse(String),
}

impl ProviderError {
  pub(crate) fn config(message: impl Into<String>) -> Self {
    Self::Config(message.into())
  }
}

/// Why one candidate was passed over.
#[derive(Debug, Clone)]
pub struct ProbeFailure {
  pub provider: String,
  pub error: ProviderError,
}

impl fmt::Display for ProbeFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.provider, self.error)
  }
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
  /// No candidate answered its probe.
  #[error("no usable generation backend ({})", describe(.failures))]
  NoUsableBackend { failures: Vec<ProbeFailure> },
}

fn describe(failures: &[ProbeFailure]) -> String {
  if failures.is_empty() {
    return "no providers configured".to_string();
  }
  failures
    .iter()
    .map(|f| f.to_string())
    .collect::<Vec<_>>()
    .join("; ")
}
