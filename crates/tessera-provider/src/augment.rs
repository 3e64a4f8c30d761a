//! Context augmentation before a generation call.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("context augmentation failed: {0}")]
pub struct AugmentError(pub String);

/// Enriches a task's system prompt with context relevant to the input.
///
/// Called once per task before its first attempt. A failure is never
/// fatal: the caller logs it and uses the original prompt.
#[async_trait]
pub trait ContextAugmenter: Send + Sync {
  async fn augment(&self, system_prompt: &str, input: &str) -> Result<String, AugmentError>;
}

/// Returns the prompt unchanged.
#[derive(Debug, Clone, Default)]
pub struct NoAugmentation;

#[async_trait]
impl ContextAugmenter for NoAugmentation {
  async fn augment(&self, system_prompt: &str, _input: &str) -> Result<String, AugmentError> {
    Ok(system_prompt.to_string())
  }
}
