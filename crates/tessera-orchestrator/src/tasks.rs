//! Built-in task bodies that delegate to the run's generation service.
//!
//! Both bodies follow the same steps: augment the system prompt, render the
//! user template against the state snapshot, call the provider through the
//! retry policy, then normalize the response.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use minijinja::Environment;
use serde_json::{Map, Value, json};
use tessera_config::{FieldDef, ScoreScale, TaskDef};
use tessera_normalize::normalize;
use tessera_provider::{CompletionOptions, CompletionRequest};
use tessera_state::{GraphState, Message, PartialState, Report, TaskOutput};
use tessera_task_runner::Invocation;
use tessera_workflow::{Task, TaskContext, TaskError};
use tracing::warn;

/// Percentage points taken off `overall` per degraded contribution.
pub const DEFAULT_DEGRADATION_PENALTY: f64 = 10.0;

/// The prompt half shared by both task bodies.
#[derive(Debug, Clone)]
struct PromptCall {
  depends_on: Vec<String>,
  system_prompt: String,
  user_template: String,
  options: CompletionOptions,
  max_attempts: Option<u32>,
  attempt_timeout: Option<Duration>,
}

impl PromptCall {
  fn from_def(def: &TaskDef) -> Self {
    Self {
      depends_on: def.depends_on.clone(),
      system_prompt: def.system_prompt.clone(),
      user_template: def.user_template.clone(),
      options: CompletionOptions {
        temperature: def.temperature,
        max_tokens: def.max_tokens,
      },
      max_attempts: def.max_attempts,
      attempt_timeout: def.timeout_ms.map(Duration::from_millis),
    }
  }

  async fn execute(&self, ctx: &TaskContext) -> Result<Invocation<String>, TaskError> {
    let state = ctx.state();

    let system_prompt = match ctx.augmenter().augment(&self.system_prompt, &state.input).await {
      Ok(augmented) => augmented,
      Err(e) => {
        warn!(
          run_id = %ctx.run_id(),
          task = %ctx.task_name(),
          error = %e,
          "augmentation_failed"
        );
        self.system_prompt.clone()
      }
    };

    let user_message = render(
      &self.user_template,
      &template_context(state, ctx.task_name(), &self.depends_on),
    )?;

    let mut runner = *ctx.runner();
    if let Some(max_attempts) = self.max_attempts {
      runner = runner.with_max_attempts(max_attempts);
    }
    if self.attempt_timeout.is_some() {
      runner = runner.with_attempt_timeout(self.attempt_timeout);
    }

    let request = CompletionRequest::new(system_prompt, user_message).with_options(self.options);
    Ok(ctx.generate_with(&runner, &request).await?)
  }
}

/// What a template can see.
///
/// `results` holds the structured values of the task's predecessors,
/// `previous` the task's own value from the last pass.
fn template_context(state: &GraphState, task: &str, depends_on: &[String]) -> Value {
  let results: Map<String, Value> = depends_on
    .iter()
    .filter_map(|name| {
      state
        .task_results
        .get(name)
        .map(|output| (name.clone(), output.value.clone()))
    })
    .collect();

  json!({
    "input": state.input,
    "preferences": state.preferences,
    "iteration": state.iteration,
    "results": results,
    "previous": state.task_results.get(task).map(|output| &output.value),
    "previous_report": state.report,
  })
}

fn render(template: &str, context: &Value) -> Result<String, TaskError> {
  let env = Environment::new();
  env
    .render_str(template, minijinja::Value::from_serialize(context))
    .map_err(|e| TaskError::Render(e.to_string()))
}

/// One message per failed attempt, then the output.
fn messages(task: &str, invocation: &Invocation<String>) -> Vec<Message> {
  let mut messages: Vec<Message> = invocation
    .failures
    .iter()
    .map(|f| Message::attempt_failed(task, f.attempt, &f.error).at(f.failed_at))
    .collect();
  messages.push(Message::output(task, invocation.attempt, &invocation.value));
  messages
}

/// An analysis task: one structured contribution stored under its name.
#[derive(Debug, Clone)]
pub struct PromptTask {
  call: PromptCall,
  output: BTreeMap<String, FieldDef>,
}

impl PromptTask {
  pub fn new(system_prompt: impl Into<String>) -> Self {
    Self {
      call: PromptCall {
        depends_on: Vec::new(),
        system_prompt: system_prompt.into(),
        user_template: "{{ input }}".to_string(),
        options: CompletionOptions::default(),
        max_attempts: None,
        attempt_timeout: None,
      },
      output: BTreeMap::new(),
    }
  }

  pub fn from_def(def: &TaskDef) -> Self {
    Self {
      call: PromptCall::from_def(def),
      output: def.output.clone(),
    }
  }

  /// Predecessors whose values the template may read as `results.<name>`.
  pub fn reading(mut self, depends_on: &[&str]) -> Self {
    self.call.depends_on = depends_on.iter().map(|d| d.to_string()).collect();
    self
  }

  pub fn with_template(mut self, template: impl Into<String>) -> Self {
    self.call.user_template = template.into();
    self
  }

  pub fn with_field(mut self, name: impl Into<String>, field: FieldDef) -> Self {
    self.output.insert(name.into(), field);
    self
  }

  pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
    self.call.max_attempts = Some(max_attempts);
    self
  }

  fn defaults(&self) -> Value {
    Value::Object(
      self
        .output
        .iter()
        .map(|(name, field)| (name.clone(), field.default_value()))
        .collect(),
    )
  }

  /// Clamp declared number fields. Returns whether anything changed.
  fn bound(&self, value: &mut Value) -> bool {
    let mut changed = false;
    for (name, field) in &self.output {
      if let Some(slot) = value.get_mut(name) {
        let before = slot.as_f64();
        field.bound_value(slot);
        changed |= slot.as_f64() != before;
      }
    }
    changed
  }
}

#[async_trait]
impl Task for PromptTask {
  async fn run(&self, ctx: TaskContext) -> Result<PartialState, TaskError> {
    let task = ctx.task_name();
    let invocation = self.call.execute(&ctx).await?;

    let normalized = normalize(&invocation.value, &self.defaults());
    if normalized.is_degraded() {
      let issues: Vec<String> = normalized.issues().iter().map(|i| i.to_string()).collect();
      warn!(run_id = %ctx.run_id(), task = %task, issues = ?issues, "output_degraded");
    }
    let mut degraded = normalized.is_degraded();
    let mut value = normalized.into_value();
    degraded |= self.bound(&mut value);

    let output = TaskOutput {
      raw: invocation.value.clone(),
      value,
      degraded,
    };
    Ok(
      PartialState::new()
        .with_result(task, output)
        .with_messages(messages(task, &invocation)),
    )
  }
}

/// The terminal task: turns accumulated contributions into the report.
#[derive(Debug, Clone)]
pub struct AssemblyTask {
  call: PromptCall,
  scale: ScoreScale,
  penalty: f64,
}

impl AssemblyTask {
  pub fn new(system_prompt: impl Into<String>, scale: ScoreScale) -> Self {
    Self {
      call: PromptCall {
        depends_on: Vec::new(),
        system_prompt: system_prompt.into(),
        user_template: "{{ results | tojson }}".to_string(),
        options: CompletionOptions::default(),
        max_attempts: None,
        attempt_timeout: None,
      },
      scale,
      penalty: DEFAULT_DEGRADATION_PENALTY,
    }
  }

  pub fn from_def(def: &TaskDef, scale: ScoreScale, penalty: f64) -> Self {
    Self {
      call: PromptCall::from_def(def),
      scale,
      penalty,
    }
  }

  pub fn reading(mut self, depends_on: &[&str]) -> Self {
    self.call.depends_on = depends_on.iter().map(|d| d.to_string()).collect();
    self
  }

  pub fn with_template(mut self, template: impl Into<String>) -> Self {
    self.call.user_template = template.into();
    self
  }

  pub fn with_penalty(mut self, penalty: f64) -> Self {
    self.penalty = penalty;
    self
  }
}

#[async_trait]
impl Task for AssemblyTask {
  async fn run(&self, ctx: TaskContext) -> Result<PartialState, TaskError> {
    let task = ctx.task_name();
    let invocation = self.call.execute(&ctx).await?;

    let normalized = Report::from_response(&invocation.value, self.scale);
    let degraded = normalized.is_degraded();
    if degraded {
      let issues: Vec<String> = normalized.issues().iter().map(|i| i.to_string()).collect();
      warn!(run_id = %ctx.run_id(), task = %task, issues = ?issues, "output_degraded");
    }
    let mut report = normalized.into_value();

    // Contributions from other tasks, plus this one.
    let others = ctx
      .state()
      .task_results
      .iter()
      .filter(|(name, output)| name.as_str() != task && output.degraded)
      .count();
    let count = others + usize::from(degraded);
    if count > 0 {
      report.apply_penalty(self.penalty * count as f64);
    }

    let output = TaskOutput {
      raw: invocation.value.clone(),
      value: serde_json::to_value(&report).unwrap_or(Value::Null),
      degraded,
    };
    Ok(
      PartialState::new()
        .with_result(task, output)
        .with_messages(messages(task, &invocation))
        .with_report(report),
    )
  }
}
