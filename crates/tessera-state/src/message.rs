use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a message records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
  /// A call attempt failed and was (or would have been) retried.
  AttemptFailed,
  /// The task's final output text.
  Output,
}

/// One entry in the run's message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub task: String,
  /// Zero-based attempt index this message belongs to.
  pub attempt: u32,
  pub kind: MessageKind,
  pub content: String,
  pub timestamp: DateTime<Utc>,
}

impl Message {
  pub fn output(task: impl Into<String>, attempt: u32, content: impl Into<String>) -> Self {
    Self {
      task: task.into(),
      attempt,
      kind: MessageKind::Output,
      content: content.into(),
      timestamp: Utc::now(),
    }
  }

  pub fn attempt_failed(task: impl Into<String>, attempt: u32, error: impl Into<String>) -> Self {
    Self {
      task: task.into(),
      attempt,
      kind: MessageKind::AttemptFailed,
      content: error.into(),
      timestamp: Utc::now(),
    }
  }

  pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = timestamp;
    self
  }

  /// Log order: completion time, then task name, then attempt.
  ///
  /// Kind and content break any remaining tie so the order is total.
  pub(crate) fn log_order(&self, other: &Self) -> Ordering {
    self
      .timestamp
      .cmp(&other.timestamp)
      .then_with(|| self.task.cmp(&other.task))
      .then_with(|| self.attempt.cmp(&other.attempt))
      .then_with(|| self.kind.cmp(&other.kind))
      .then_with(|| self.content.cmp(&other.content))
  }
}
