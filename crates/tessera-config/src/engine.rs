use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::load::load_json;

/// Engine-wide settings shared by every pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
  /// Candidate providers, highest priority first.
  #[serde(default)]
  pub providers: Vec<ProviderDef>,
  #[serde(default)]
  pub retry: RetryDef,
  /// Maximum number of generation calls in flight at once.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_concurrency: Option<usize>,
  /// Percentage points taken off `overall` per degraded contribution.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub degradation_penalty: Option<f64>,
}

impl EngineConfig {
  /// Load and validate an engine configuration from a JSON file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let config: Self = load_json(path.as_ref())?;
    config.validate()?;
    Ok(config)
  }

  /// Check constraints that serde cannot express.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.max_concurrency == Some(0) {
      return Err(ConfigError::invalid("max_concurrency must be at least 1"));
    }
    if self.retry.max_attempts == 0 {
      return Err(ConfigError::invalid("retry.max_attempts must be at least 1"));
    }
    if let Some(penalty) = self.degradation_penalty {
      if !(0.0..=100.0).contains(&penalty) {
        return Err(ConfigError::invalid(format!(
          "degradation_penalty must be within 0..=100, got {}",
          penalty
        )));
      }
    }
    for provider in &self.providers {
      if provider.name.trim().is_empty() {
        return Err(ConfigError::invalid("provider name must not be empty"));
      }
      if provider.model.trim().is_empty() {
        return Err(ConfigError::invalid(format!(
          "provider '{}' has no model",
          provider.name
        )));
      }
    }
    Ok(())
  }
}

/// One candidate generation backend.
///
/// Any OpenAI-compatible chat completions endpoint works here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDef {
  pub name: String,
  /// Base URL, e.g. `https://openrouter.ai/api/v1`.
  pub base_url: String,
  pub model: String,
  /// Name of the environment variable holding the API key.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub api_key_env: Option<String>,
  /// HTTP request timeout in milliseconds.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

/// Retry policy applied to every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryDef {
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  /// One backoff time unit; attempt `n` waits `base_delay_ms * 2^n`.
  #[serde(default = "default_base_delay_ms")]
  pub base_delay_ms: u64,
  /// Per-attempt timeout; a timed out attempt counts as a failure.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub attempt_timeout_ms: Option<u64>,
}

impl Default for RetryDef {
  fn default() -> Self {
    Self {
      max_attempts: default_max_attempts(),
      base_delay_ms: default_base_delay_ms(),
      attempt_timeout_ms: None,
    }
  }
}

fn default_max_attempts() -> u32 {
  3
}

fn default_base_delay_ms() -> u64 {
  1000
}
