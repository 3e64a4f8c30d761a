//! Entry point for running a resolved pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_config::EngineConfig;
use tessera_provider::{ContextAugmenter, NoAugmentation, ProviderResolver};
use tessera_state::{GraphState, Message, Report};
use tessera_task_runner::{RetryPolicy, TaskRunner};
use tessera_workflow::RunContext;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

use crate::controller::IterationController;
use crate::error::OrchestratorError;
use crate::events::{NoopNotifier, RunEvent, RunNotifier};
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;

/// What a caller submits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
  pub input: String,
  #[serde(default)]
  pub preferences: BTreeMap<String, serde_json::Value>,
}

impl RunRequest {
  pub fn new(input: impl Into<String>) -> Self {
    Self {
      input: input.into(),
      preferences: BTreeMap::new(),
    }
  }
}

/// What a finished run hands to the report consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
  pub run_id: String,
  pub pipeline_id: String,
  /// The last pass's report.
  pub report: Option<Report>,
  pub messages: Vec<Message>,
  /// Number of passes through the graph.
  pub passes: u32,
  /// Index of the last pass.
  pub iteration: u32,
}

/// Runs pipelines against a set of candidate providers.
pub struct Engine {
  resolver: ProviderResolver,
  runner: TaskRunner,
  max_concurrency: Option<usize>,
  augmenter: Arc<dyn ContextAugmenter>,
  notifier: Arc<dyn RunNotifier>,
}

impl Engine {
  pub fn new(resolver: ProviderResolver) -> Self {
    Self {
      resolver,
      runner: TaskRunner::default(),
      max_concurrency: None,
      augmenter: Arc::new(NoAugmentation),
      notifier: Arc::new(NoopNotifier),
    }
  }

  /// An engine whose candidates and retry policy come from configuration.
  pub fn from_config(config: &EngineConfig) -> Self {
    Self::new(ProviderResolver::from_defs(&config.providers))
      .with_runner(TaskRunner::new(RetryPolicy::from(&config.retry)))
      .with_max_concurrency(config.max_concurrency)
  }

  pub fn with_runner(mut self, runner: TaskRunner) -> Self {
    self.runner = runner;
    self
  }

  pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
    self.max_concurrency = max_concurrency;
    self
  }

  pub fn with_augmenter(mut self, augmenter: Arc<dyn ContextAugmenter>) -> Self {
    self.augmenter = augmenter;
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn RunNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  /// Run `pipeline` to completion.
  ///
  /// The provider is resolved first; if no candidate answers, the run fails
  /// before any task executes.
  pub async fn run(
    &self,
    pipeline: &Pipeline,
    request: RunRequest,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, OrchestratorError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!(
      "pipeline_run",
      run_id = %run_id,
      pipeline_id = %pipeline.pipeline_id,
    );

    let result = self
      .execute(&run_id, pipeline, request, &cancel)
      .instrument(span)
      .await;

    match &result {
      Ok(outcome) => {
        info!(run_id = %run_id, passes = outcome.passes, "run_finalized");
        self.notifier.notify(RunEvent::RunFinalized {
          run_id: run_id.clone(),
          passes: outcome.passes,
        });
      }
      Err(e) => {
        error!(run_id = %run_id, error = %e, "run_failed");
        self.notifier.notify(RunEvent::RunFailed {
          run_id: run_id.clone(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  async fn execute(
    &self,
    run_id: &str,
    pipeline: &Pipeline,
    request: RunRequest,
    cancel: &CancellationToken,
  ) -> Result<RunOutcome, OrchestratorError> {
    let provider = self.resolver.resolve().await?;

    info!(
      run_id = %run_id,
      pipeline_id = %pipeline.pipeline_id,
      provider = %provider.name(),
      tasks = pipeline.graph.len(),
      max_iterations = pipeline.max_iterations,
      "run_started"
    );
    self.notifier.notify(RunEvent::RunStarted {
      run_id: run_id.to_string(),
      pipeline_id: pipeline.pipeline_id.clone(),
      provider: provider.name().to_string(),
    });

    let run = RunContext::new(run_id, provider)
      .with_runner(self.runner)
      .with_augmenter(self.augmenter.clone())
      .with_max_concurrency(self.max_concurrency);

    let state =
      GraphState::new(request.input, pipeline.max_iterations).with_preferences(request.preferences);
    let scheduler = Scheduler::new(&pipeline.graph, &run, self.notifier.as_ref());
    let controller = IterationController::new(pipeline.quality_threshold);
    let notifier = self.notifier.clone();
    let passes = controller.run(&scheduler, state, cancel, move |event| notifier.notify(event));

    let completed = match pipeline.timeout {
      Some(limit) => tokio::time::timeout(limit, passes)
        .await
        .map_err(|_| OrchestratorError::TimedOut(limit.as_millis()))??,
      None => passes.await?,
    };

    Ok(RunOutcome {
      run_id: run_id.to_string(),
      pipeline_id: pipeline.pipeline_id.clone(),
      report: completed.state.report,
      messages: completed.state.messages,
      passes: completed.passes,
      iteration: completed.state.iteration,
    })
  }
}
