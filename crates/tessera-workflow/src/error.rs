use thiserror::Error;

/// A task graph that cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("duplicate task name: {0}")]
  DuplicateTask(String),

  #[error("task '{0}' depends on itself")]
  SelfDependency(String),

  #[error("task '{task}' depends on unknown task '{predecessor}'")]
  UnknownPredecessor { task: String, predecessor: String },

  #[error("cycle detected in task graph at '{0}'")]
  CycleDetected(String),

  #[error("no entry tasks found (every task has a predecessor)")]
  NoEntryPoints,

  #[error("expected exactly one terminal task, found [{}]", .found.join(", "))]
  TerminalCount { found: Vec<String> },
}
