use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Failed to read a configuration file.
  #[error("failed to read config '{}': {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Configuration file is not valid JSON for the expected type.
  #[error("failed to parse config '{}': {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// Configuration parsed but violates a constraint.
  #[error("invalid config: {message}")]
  Invalid { message: String },
}

impl ConfigError {
  pub(crate) fn invalid(message: impl Into<String>) -> Self {
    Self::Invalid {
      message: message.into(),
    }
  }
}
