//! Bounded quality loop around the scheduler.

use serde::{Deserialize, Serialize};
use tessera_state::{GraphState, PartialState, merge};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OrchestratorError;
use crate::events::RunEvent;
use crate::scheduler::Scheduler;

/// Where a run stands between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  /// No pass has completed yet.
  Designing,
  /// A pass completed and wrote a report that has not been judged yet.
  Assembled,
  /// The report fell short; the graph runs again from its entry tasks.
  Iterating,
  /// Terminal.
  Finalized,
}

/// Decides after each pass whether to run the graph again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationController {
  /// Reports scoring below this percentage trigger another pass.
  quality_threshold: f64,
}

/// State after the last pass, and how many passes ran.
#[derive(Debug, Clone)]
pub struct Completed {
  pub state: GraphState,
  pub passes: u32,
}

impl IterationController {
  pub fn new(quality_threshold: f64) -> Self {
    Self { quality_threshold }
  }

  /// Judge an assembled pass.
  pub fn decide(&self, state: &GraphState) -> Phase {
    if state.iteration.saturating_add(1) >= state.max_iterations {
      return Phase::Finalized;
    }
    match &state.report {
      Some(report) if report.overall_percent() < self.quality_threshold => Phase::Iterating,
      Some(_) => Phase::Finalized,
      None => {
        warn!(iteration = state.iteration, "pass produced no report");
        Phase::Finalized
      }
    }
  }

  /// Run passes until the controller finalizes.
  ///
  /// Every pass sees the whole accumulated state of the previous ones. At
  /// most `state.max_iterations` passes run.
  pub async fn run(
    &self,
    scheduler: &Scheduler<'_>,
    mut state: GraphState,
    cancel: &CancellationToken,
    notify: impl Fn(RunEvent),
  ) -> Result<Completed, OrchestratorError> {
    let run_id = scheduler.run_id().to_string();
    let budget = state.max_iterations.max(1);
    let mut phase = Phase::Designing;
    let mut passes = 0;

    while passes < budget && phase != Phase::Finalized {
      notify(RunEvent::PassStarted {
        run_id: run_id.clone(),
        iteration: state.iteration,
      });

      state = scheduler.run(state, cancel).await?;
      passes += 1;
      phase = Phase::Assembled;

      let overall_percent = state.report.as_ref().map(|r| r.overall_percent());
      let next = self.decide(&state);

      info!(
        run_id = %run_id,
        iteration = state.iteration,
        overall_percent = ?overall_percent,
        from = ?phase,
        next = ?next,
        "pass_completed"
      );
      notify(RunEvent::PassCompleted {
        run_id: run_id.clone(),
        iteration: state.iteration,
        overall_percent,
        next,
      });

      if next == Phase::Iterating {
        let iteration = state.iteration + 1;
        state = merge(state, PartialState::new().with_iteration(iteration));
      }
      phase = next;
    }

    Ok(Completed { state, passes })
  }
}
