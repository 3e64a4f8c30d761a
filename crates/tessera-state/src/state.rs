use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;
use crate::report::Report;

/// One task's contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
  /// The text the generation service returned.
  pub raw: String,
  /// The normalized structured value.
  pub value: Value,
  /// Whether any field of `value` fell back to its default.
  pub degraded: bool,
}

/// The record threaded through a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
  pub input: String,
  #[serde(default)]
  pub preferences: BTreeMap<String, Value>,
  #[serde(default)]
  pub task_results: BTreeMap<String, TaskOutput>,
  #[serde(default)]
  pub messages: Vec<Message>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub report: Option<Report>,
  #[serde(default)]
  pub iteration: u32,
  pub max_iterations: u32,
}

impl GraphState {
  pub fn new(input: impl Into<String>, max_iterations: u32) -> Self {
    Self {
      input: input.into(),
      preferences: BTreeMap::new(),
      task_results: BTreeMap::new(),
      messages: Vec::new(),
      report: None,
      iteration: 0,
      max_iterations,
    }
  }

  pub fn with_preferences(mut self, preferences: BTreeMap<String, Value>) -> Self {
    self.preferences = preferences;
    self
  }

  pub fn result(&self, task: &str) -> Option<&TaskOutput> {
    self.task_results.get(task)
  }

  /// Number of stored results that were normalized with defaults.
  pub fn degraded_count(&self) -> usize {
    self.task_results.values().filter(|r| r.degraded).count()
  }
}

/// A sparse set of updates produced by one task execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialState {
  #[serde(default)]
  pub task_results: BTreeMap<String, TaskOutput>,
  #[serde(default)]
  pub messages: Vec<Message>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub report: Option<Report>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub iteration: Option<u32>,
}

impl PartialState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_result(mut self, task: impl Into<String>, output: TaskOutput) -> Self {
    self.task_results.insert(task.into(), output);
    self
  }

  pub fn with_message(mut self, message: Message) -> Self {
    self.messages.push(message);
    self
  }

  pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
    self.messages.extend(messages);
    self
  }

  pub fn with_report(mut self, report: Report) -> Self {
    self.report = Some(report);
    self
  }

  pub fn with_iteration(mut self, iteration: u32) -> Self {
    self.iteration = Some(iteration);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.task_results.is_empty()
      && self.messages.is_empty()
      && self.report.is_none()
      && self.iteration.is_none()
  }
}
