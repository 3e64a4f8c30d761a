//! Run events and notifiers for observability.
//!
//! Events are emitted while a pipeline runs so consumers can follow
//! progress, persist it, or stream it to a UI.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::controller::Phase;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEvent {
  /// A provider was selected and the first pass is about to start.
  RunStarted {
    run_id: String,
    pipeline_id: String,
    provider: String,
  },

  /// A pass through the graph has started.
  PassStarted { run_id: String, iteration: u32 },

  /// A task has been dispatched.
  TaskStarted {
    run_id: String,
    iteration: u32,
    task: String,
  },

  /// One attempt of a task's generation call failed.
  TaskAttemptFailed {
    run_id: String,
    task: String,
    attempt: u32,
    error: String,
  },

  /// A task produced its contribution.
  TaskCompleted {
    run_id: String,
    task: String,
    degraded: bool,
  },

  /// A task failed for good; the run is aborted.
  TaskFailed {
    run_id: String,
    task: String,
    error: String,
  },

  /// A pass finished and the iteration controller decided what comes next.
  PassCompleted {
    run_id: String,
    iteration: u32,
    overall_percent: Option<f64>,
    next: Phase,
  },

  /// The run finished with a report.
  RunFinalized { run_id: String, passes: u32 },

  /// The run failed.
  RunFailed { run_id: String, error: String },
}

/// Trait for receiving run events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them.
pub trait RunNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl RunNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl RunNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
