use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tessera_state::PartialState;
use tessera_task_runner::RetryError;
use thiserror::Error;

use crate::context::TaskContext;

/// A task that could not produce its contribution.
#[derive(Debug, Error)]
pub enum TaskError {
  /// The generation call failed on every attempt.
  #[error(transparent)]
  Exhausted(#[from] RetryError),

  #[error("failed to render prompt: {0}")]
  Render(String),

  #[error("{0}")]
  Failed(String),
}

impl TaskError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed(message.into())
  }
}

/// The body of a task.
///
/// A task reads the state snapshot in its context and returns the updates
/// it wants merged. It never mutates shared state directly.
#[async_trait]
pub trait Task: Send + Sync {
  async fn run(&self, ctx: TaskContext) -> Result<PartialState, TaskError>;
}

/// A [`Task`] backed by an async closure.
pub struct FnTask<F> {
  f: F,
}

impl<F> FnTask<F> {
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
  F: Fn(TaskContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<PartialState, TaskError>> + Send,
{
  async fn run(&self, ctx: TaskContext) -> Result<PartialState, TaskError> {
    (self.f)(ctx).await
  }
}

/// Static declaration of one task.
#[derive(Clone)]
pub struct TaskSpec {
  pub name: String,
  /// Tasks whose contributions this task may read.
  pub depends_on: Vec<String>,
  pub body: Arc<dyn Task>,
}

impl TaskSpec {
  pub fn new(name: impl Into<String>, depends_on: Vec<String>, body: Arc<dyn Task>) -> Self {
    Self {
      name: name.into(),
      depends_on,
      body,
    }
  }

  /// A task whose body is an async closure.
  pub fn from_fn<F, Fut>(name: impl Into<String>, depends_on: &[&str], f: F) -> Self
  where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PartialState, TaskError>> + Send + 'static,
  {
    Self::new(
      name,
      depends_on.iter().map(|d| d.to_string()).collect(),
      Arc::new(FnTask::new(f)),
    )
  }
}

impl fmt::Debug for TaskSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskSpec")
      .field("name", &self.name)
      .field("depends_on", &self.depends_on)
      .finish_non_exhaustive()
  }
}
