use std::sync::Arc;

use tessera_provider::{
  CompletionRequest, ContextAugmenter, NoAugmentation, ProviderError, ProviderHandle,
};
use tessera_state::GraphState;
use tessera_task_runner::{Invocation, RetryError, TaskRunner};
use tokio::sync::Semaphore;

/// Everything a run shares across its tasks.
///
/// Built once per run, after the provider is resolved and before any task
/// executes. Cloning is cheap.
#[derive(Clone)]
pub struct RunContext {
  run_id: String,
  provider: ProviderHandle,
  runner: TaskRunner,
  augmenter: Arc<dyn ContextAugmenter>,
  limiter: Option<Arc<Semaphore>>,
}

impl RunContext {
  pub fn new(run_id: impl Into<String>, provider: ProviderHandle) -> Self {
    Self {
      run_id: run_id.into(),
      provider,
      runner: TaskRunner::default(),
      augmenter: Arc::new(NoAugmentation),
      limiter: None,
    }
  }

  pub fn with_runner(mut self, runner: TaskRunner) -> Self {
    self.runner = runner;
    self
  }

  pub fn with_augmenter(mut self, augmenter: Arc<dyn ContextAugmenter>) -> Self {
    self.augmenter = augmenter;
    self
  }

  /// Allow at most `permits` generation calls in flight across the run.
  pub fn with_max_concurrency(mut self, permits: Option<usize>) -> Self {
    self.limiter = permits.map(|n| Arc::new(Semaphore::new(n.max(1))));
    self
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn provider(&self) -> &ProviderHandle {
    &self.provider
  }

  pub fn runner(&self) -> &TaskRunner {
    &self.runner
  }
}

/// What one task execution sees.
#[derive(Clone)]
pub struct TaskContext {
  run: RunContext,
  task: String,
  state: Arc<GraphState>,
}

impl TaskContext {
  pub fn new(run: RunContext, task: impl Into<String>, state: Arc<GraphState>) -> Self {
    Self {
      run,
      task: task.into(),
      state,
    }
  }

  pub fn run_id(&self) -> &str {
    &self.run.run_id
  }

  /// Name of the task being executed.
  pub fn task_name(&self) -> &str {
    &self.task
  }

  /// State as of the start of this task's batch.
  pub fn state(&self) -> &GraphState {
    &self.state
  }

  pub fn runner(&self) -> &TaskRunner {
    &self.run.runner
  }

  pub fn augmenter(&self) -> &dyn ContextAugmenter {
    self.run.augmenter.as_ref()
  }

  pub fn provider(&self) -> &ProviderHandle {
    &self.run.provider
  }

  /// Call the run's provider under the run's retry policy.
  pub async fn generate(&self, request: &CompletionRequest) -> Result<Invocation<String>, RetryError> {
    self.generate_with(&self.run.runner, request).await
  }

  /// Call the run's provider under `runner`'s retry policy.
  ///
  /// Each attempt holds one concurrency permit while the call is in flight.
  /// The attempt timeout starts once the permit is held.
  pub async fn generate_with(
    &self,
    runner: &TaskRunner,
    request: &CompletionRequest,
  ) -> Result<Invocation<String>, RetryError> {
    let provider = &self.run.provider;
    let limiter = self.run.limiter.as_deref();
    runner
      .invoke_gated(
        || async move {
          match limiter {
            Some(semaphore) => semaphore
              .acquire()
              .await
              .map(Some)
              .map_err(|_| ProviderError::Transport("concurrency limiter closed".to_string())),
            None => Ok(None),
          }
        },
        |_| async move { provider.complete(request).await },
      )
      .await
  }
}
