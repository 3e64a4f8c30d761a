//! Error types for pipeline resolution and execution.

use tessera_config::ConfigError;
use tessera_provider::ResolveError;
use tessera_state::StateError;
use tessera_workflow::{TaskError, WorkflowError};
use thiserror::Error;

/// A pipeline definition that cannot be turned into a task graph.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Graph(#[from] WorkflowError),

  #[error("invalid template in task '{task}': {message}")]
  Template { task: String, message: String },

  #[error("assembly task '{assembly}' must be the terminal task, but '{terminal}' is")]
  AssemblyNotTerminal { assembly: String, terminal: String },
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
  /// Every candidate provider failed its probe. Raised before any task runs.
  #[error(transparent)]
  NoUsableBackend(#[from] ResolveError),

  #[error("task '{task}' failed: {source}")]
  TaskFailed {
    task: String,
    #[source]
    source: TaskError,
  },

  /// The task's body panicked.
  #[error("task '{task}' aborted: {message}")]
  TaskAborted { task: String, message: String },

  #[error(transparent)]
  State(#[from] StateError),

  #[error("task '{0}' is in the batch plan but not in the graph")]
  MissingTask(String),

  #[error("run cancelled")]
  Cancelled,

  #[error("run timed out after {0}ms")]
  TimedOut(u128),
}
