use std::collections::BTreeSet;

use crate::error::StateError;
use crate::message::Message;
use crate::state::{GraphState, PartialState};

/// Fold one partial into `state`.
///
/// The partial's messages are sorted into log order and appended after the
/// existing log, task results are last-write-wins per key, and scalars are
/// overwritten when present.
pub fn merge(mut state: GraphState, partial: PartialState) -> GraphState {
  let incoming = apply(&mut state, partial);
  append_sorted(&mut state, incoming);
  state
}

/// Fold a batch of concurrent partials into `state`.
///
/// Concurrent tasks must not race on the same slot, so the batch is
/// rejected as a whole if two partials write the same scalar or the same
/// task result. With disjoint writes the outcome does not depend on the
/// order of `partials`.
///
/// The batch's messages are sorted together and appended as one block, so
/// entries already in the log never move.
pub fn merge_batch(
  mut state: GraphState,
  partials: Vec<PartialState>,
) -> Result<GraphState, StateError> {
  check_disjoint(&partials)?;
  let mut incoming = Vec::new();
  for partial in partials {
    incoming.extend(apply(&mut state, partial));
  }
  append_sorted(&mut state, incoming);
  Ok(state)
}

/// Apply everything but the messages, which are handed back.
fn apply(state: &mut GraphState, partial: PartialState) -> Vec<Message> {
  let PartialState {
    task_results,
    messages,
    report,
    iteration,
  } = partial;

  state.task_results.extend(task_results);
  if let Some(report) = report {
    state.report = Some(report);
  }
  if let Some(iteration) = iteration {
    state.iteration = iteration;
  }
  messages
}

fn append_sorted(state: &mut GraphState, mut incoming: Vec<Message>) {
  incoming.sort_by(|a, b| a.log_order(b));
  state.messages.extend(incoming);
}

fn check_disjoint(partials: &[PartialState]) -> Result<(), StateError> {
  let mut keys = BTreeSet::new();
  let mut report = false;
  let mut iteration = false;

  for partial in partials {
    for key in partial.task_results.keys() {
      if !keys.insert(key.as_str()) {
        return Err(StateError::ConflictingWrite {
          field: format!("task_results.{}", key),
        });
      }
    }
    if partial.report.is_some() {
      if report {
        return Err(StateError::ConflictingWrite {
          field: "report".to_string(),
        });
      }
      report = true;
    }
    if partial.iteration.is_some() {
      if iteration {
        return Err(StateError::ConflictingWrite {
          field: "iteration".to_string(),
        });
      }
      iteration = true;
    }
  }

  Ok(())
}
