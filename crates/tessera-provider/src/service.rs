use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Sampling options for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub temperature: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
  pub system_prompt: String,
  pub user_message: String,
  #[serde(default)]
  pub options: CompletionOptions,
}

impl CompletionRequest {
  pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
    Self {
      system_prompt: system_prompt.into(),
      user_message: user_message.into(),
      options: CompletionOptions::default(),
    }
  }

  pub fn with_options(mut self, options: CompletionOptions) -> Self {
    self.options = options;
    self
  }

  /// The cheapest request a backend can answer; used to probe liveness.
  pub fn probe() -> Self {
    Self::new("", "ping").with_options(CompletionOptions {
      temperature: Some(0.0),
      max_tokens: Some(1),
    })
  }
}

/// A text-generation backend.
#[async_trait]
pub trait GenerationService: Send + Sync {
  /// Name used in logs and error messages.
  fn name(&self) -> &str;

  /// Produce a completion for `request`.
  async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
