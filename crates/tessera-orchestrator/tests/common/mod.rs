#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tessera_config::ScoreScale;
use tessera_orchestrator::{Engine, RunEvent};
use tessera_provider::{CompletionRequest, GenerationService, ProviderError, ProviderResolver};
use tessera_state::{PartialState, Report};
use tessera_task_runner::{RetryPolicy, TaskRunner};
use tokio::sync::mpsc;

/// A generation service that replays scripted responses per system prompt.
pub struct Scripted {
  name: String,
  up: bool,
  scripts: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
  delay: Option<Duration>,
  in_flight: AtomicUsize,
  pub peak_in_flight: AtomicUsize,
  pub calls: AtomicUsize,
}

impl Scripted {
  pub fn up(name: &str) -> Self {
    Self {
      name: name.to_string(),
      up: true,
      scripts: Mutex::new(HashMap::new()),
      delay: None,
      in_flight: AtomicUsize::new(0),
      peak_in_flight: AtomicUsize::new(0),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn down(name: &str) -> Self {
    Self {
      up: false,
      ..Self::up(name)
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Queue responses for calls whose system prompt is `prompt`.
  pub fn script(self, prompt: &str, responses: Vec<Result<&str, &str>>) -> Self {
    let queue = responses
      .into_iter()
      .map(|r| r.map(str::to_string).map_err(str::to_string))
      .collect();
    self
      .scripts
      .lock()
      .unwrap()
      .insert(prompt.to_string(), queue);
    self
  }
}

#[async_trait]
impl GenerationService for Scripted {
  fn name(&self) -> &str {
    &self.name
  }

  async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
    if !self.up {
      return Err(ProviderError::Transport("connection refused".to_string()));
    }
    if request.options.max_tokens == Some(1) {
      return Ok("ok".to_string());
    }

    self.calls.fetch_add(1, Ordering::SeqCst);
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    let next = self
      .scripts
      .lock()
      .unwrap()
      .get_mut(&request.system_prompt)
      .and_then(|queue| queue.pop_front());
    match next {
      Some(Ok(text)) => Ok(text),
      Some(Err(error)) => Err(ProviderError::Transport(error)),
      None => Ok("{}".to_string()),
    }
  }
}

/// An engine over `service` that retries quickly.
pub fn engine(service: Arc<Scripted>) -> Engine {
  Engine::new(ProviderResolver::new().with_candidate(service))
    .with_runner(TaskRunner::new(RetryPolicy::new(3, Duration::from_millis(1))))
}

/// Closure body that records a report with the given overall percentage.
pub fn report_with_overall(overall: f64) -> PartialState {
  let mut report = Report::neutral(ScoreScale::Hundred);
  report.dimension_scores.insert("overall".to_string(), overall);
  PartialState::new().with_report(report)
}

pub fn drain(receiver: &mut mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
  let mut events = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    events.push(event);
  }
  events
}
