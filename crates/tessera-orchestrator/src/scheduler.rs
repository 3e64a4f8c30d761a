//! Batch-at-a-time execution of one pass through a task graph.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tessera_state::{GraphState, MessageKind, PartialState, StateError, merge_batch};
use tessera_workflow::{Graph, RunContext, TaskContext, TaskError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::OrchestratorError;
use crate::events::{RunEvent, RunNotifier};

/// Runs every batch of a graph once, in plan order.
pub struct Scheduler<'a> {
  graph: &'a Graph,
  run: &'a RunContext,
  notifier: &'a dyn RunNotifier,
}

impl<'a> Scheduler<'a> {
  pub fn new(graph: &'a Graph, run: &'a RunContext, notifier: &'a dyn RunNotifier) -> Self {
    Self {
      graph,
      run,
      notifier,
    }
  }

  pub fn run_id(&self) -> &str {
    self.run.run_id()
  }

  /// Execute one pass and return the state with every contribution merged.
  ///
  /// Tasks in a batch run concurrently against the same snapshot. The first
  /// fatal error aborts the pass; siblings still in flight are left to
  /// finish and their results are dropped.
  pub async fn run(
    &self,
    mut state: GraphState,
    cancel: &CancellationToken,
  ) -> Result<GraphState, OrchestratorError> {
    let run_id = self.run.run_id();
    let iteration = state.iteration;

    for (index, batch) in self.graph.batches().iter().enumerate() {
      if cancel.is_cancelled() {
        warn!(run_id = %run_id, "run cancelled");
        return Err(OrchestratorError::Cancelled);
      }

      info!(
        run_id = %run_id,
        iteration,
        batch = index,
        tasks = ?batch,
        "batch_started"
      );

      let snapshot = Arc::new(state.clone());
      let mut in_flight = FuturesUnordered::new();

      for name in batch {
        let spec = self
          .graph
          .get(name)
          .ok_or_else(|| OrchestratorError::MissingTask(name.clone()))?;

        self.notifier.notify(RunEvent::TaskStarted {
          run_id: run_id.to_string(),
          iteration,
          task: name.clone(),
        });

        let ctx = TaskContext::new(self.run.clone(), name.clone(), snapshot.clone());
        let body = spec.body.clone();
        let handle = tokio::spawn(async move { body.run(ctx).await });
        let task = name.clone();
        in_flight.push(async move { (task, handle.await) });
      }

      let mut partials = Vec::with_capacity(batch.len());
      loop {
        let next = tokio::select! {
          next = in_flight.next() => next,
          _ = cancel.cancelled() => {
            warn!(run_id = %run_id, "run cancelled during batch");
            return Err(OrchestratorError::Cancelled);
          }
        };
        let Some((task, joined)) = next else {
          break;
        };

        let partial = match joined {
          Ok(Ok(partial)) => partial,
          Ok(Err(e)) => return Err(self.task_failed(task, e)),
          Err(join) => {
            error!(run_id = %run_id, task = %task, error = %join, "task_failed");
            return Err(OrchestratorError::TaskAborted {
              task,
              message: join.to_string(),
            });
          }
        };

        if partial.iteration.is_some() {
          return Err(
            StateError::ReservedField {
              task,
              field: "iteration".to_string(),
            }
            .into(),
          );
        }

        self.completed(&task, &partial);
        partials.push(partial);
      }

      state = merge_batch(state, partials)?;
    }

    Ok(state)
  }

  fn completed(&self, task: &str, partial: &PartialState) {
    let run_id = self.run.run_id();

    for message in &partial.messages {
      if message.kind == MessageKind::AttemptFailed {
        warn!(
          run_id = %run_id,
          task = %task,
          attempt = message.attempt,
          error = %message.content,
          "task_attempt_failed"
        );
        self.notifier.notify(RunEvent::TaskAttemptFailed {
          run_id: run_id.to_string(),
          task: task.to_string(),
          attempt: message.attempt,
          error: message.content.clone(),
        });
      }
    }

    let degraded = partial
      .task_results
      .get(task)
      .is_some_and(|output| output.degraded);
    info!(run_id = %run_id, task = %task, degraded, "task_completed");
    self.notifier.notify(RunEvent::TaskCompleted {
      run_id: run_id.to_string(),
      task: task.to_string(),
      degraded,
    });
  }

  fn task_failed(&self, task: String, source: TaskError) -> OrchestratorError {
    let run_id = self.run.run_id();

    if let TaskError::Exhausted(retry) = &source {
      for failure in &retry.failures {
        warn!(
          run_id = %run_id,
          task = %task,
          attempt = failure.attempt,
          error = %failure.error,
          "task_attempt_failed"
        );
        self.notifier.notify(RunEvent::TaskAttemptFailed {
          run_id: run_id.to_string(),
          task: task.clone(),
          attempt: failure.attempt,
          error: failure.error.clone(),
        });
      }
    }

    error!(run_id = %run_id, task = %task, error = %source, "task_failed");
    self.notifier.notify(RunEvent::TaskFailed {
      run_id: run_id.to_string(),
      task: task.clone(),
      error: source.to_string(),
    });
    OrchestratorError::TaskFailed { task, source }
  }
}
