//! Resolution of pipeline definitions into executable task graphs.

use std::sync::Arc;
use std::time::Duration;

use minijinja::Environment;
use tessera_config::{EngineConfig, PipelineDef, ScoreScale, TaskKind};
use tessera_workflow::{Graph, Task, TaskSpec};

use crate::error::PipelineError;
use crate::tasks::{AssemblyTask, DEFAULT_DEGRADATION_PENALTY, PromptTask};

/// A resolved pipeline: the task graph plus its run settings.
#[derive(Debug, Clone)]
pub struct Pipeline {
  pub pipeline_id: String,
  pub name: String,
  pub graph: Graph,
  pub max_iterations: u32,
  /// Percentage below which another pass runs.
  pub quality_threshold: f64,
  pub score_scale: ScoreScale,
  pub timeout: Option<Duration>,
}

impl Pipeline {
  /// A single-pass pipeline around an already-built graph.
  pub fn new(pipeline_id: impl Into<String>, graph: Graph) -> Self {
    let pipeline_id = pipeline_id.into();
    Self {
      name: pipeline_id.clone(),
      pipeline_id,
      graph,
      max_iterations: 1,
      quality_threshold: 40.0,
      score_scale: ScoreScale::default(),
      timeout: None,
    }
  }

  pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
    self.max_iterations = max_iterations;
    self
  }

  pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
    self.quality_threshold = threshold;
    self
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }
}

/// Validate a pipeline definition and bind its task bodies.
///
/// Checks field constraints, template syntax, the graph shape, and that the
/// assembly task is the graph's terminal task.
pub fn resolve_pipeline(def: &PipelineDef, engine: &EngineConfig) -> Result<Pipeline, PipelineError> {
  def.validate()?;

  let env = Environment::new();
  for task in &def.tasks {
    env
      .template_from_str(&task.user_template)
      .map_err(|e| PipelineError::Template {
        task: task.name.clone(),
        message: e.to_string(),
      })?;
  }

  let penalty = engine
    .degradation_penalty
    .unwrap_or(DEFAULT_DEGRADATION_PENALTY);

  let mut assembly = None;
  let specs: Vec<TaskSpec> = def
    .tasks
    .iter()
    .map(|task| {
      let body: Arc<dyn Task> = match task.kind {
        TaskKind::Analysis => Arc::new(PromptTask::from_def(task)),
        TaskKind::Assembly => {
          assembly = Some(task.name.clone());
          Arc::new(AssemblyTask::from_def(task, def.score_scale, penalty))
        }
      };
      TaskSpec::new(&task.name, task.depends_on.clone(), body)
    })
    .collect();

  let graph = Graph::new(specs)?;

  if let Some(assembly) = assembly {
    if assembly != graph.terminal() {
      return Err(PipelineError::AssemblyNotTerminal {
        assembly,
        terminal: graph.terminal().to_string(),
      });
    }
  }

  Ok(Pipeline {
    pipeline_id: def.pipeline_id.clone(),
    name: def.name.clone(),
    graph,
    max_iterations: def.max_iterations,
    quality_threshold: def.quality_threshold,
    score_scale: def.score_scale,
    timeout: def.timeout_ms.map(Duration::from_millis),
  })
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tessera_workflow::WorkflowError;

  use super::*;

  fn def(tasks: serde_json::Value) -> PipelineDef {
    serde_json::from_value(json!({
      "pipeline_id": "audit",
      "name": "Audit",
      "max_iterations": 2,
      "tasks": tasks,
    }))
    .unwrap()
  }

  #[test]
  fn test_resolves_fan_in() {
    let pipeline = resolve_pipeline(
      &def(json!([
        { "name": "security", "system_prompt": "s" },
        { "name": "performance", "system_prompt": "p" },
        { "name": "report", "kind": "assembly", "system_prompt": "r",
          "depends_on": ["security", "performance"] }
      ])),
      &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(pipeline.graph.terminal(), "report");
    assert_eq!(pipeline.graph.batches().len(), 2);
    assert_eq!(pipeline.graph.back_edge().1.len(), 2);
    assert_eq!(pipeline.max_iterations, 2);
  }

  #[test]
  fn test_bad_template_names_task() {
    let err = resolve_pipeline(
      &def(json!([
        { "name": "a", "system_prompt": "s", "user_template": "{{ input" },
        { "name": "r", "kind": "assembly", "system_prompt": "r", "depends_on": ["a"] }
      ])),
      &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Template { task, .. } if task == "a"));
  }

  #[test]
  fn test_assembly_must_be_terminal() {
    let err = resolve_pipeline(
      &def(json!([
        { "name": "r", "kind": "assembly", "system_prompt": "r" },
        { "name": "after", "system_prompt": "s", "depends_on": ["r"] }
      ])),
      &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::AssemblyNotTerminal { .. }));
  }

  #[test]
  fn test_unknown_dependency() {
    let err = resolve_pipeline(
      &def(json!([
        { "name": "r", "kind": "assembly", "system_prompt": "r", "depends_on": ["ghost"] }
      ])),
      &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
      err,
      PipelineError::Graph(WorkflowError::UnknownPredecessor { .. })
    ));
  }

  #[test]
  fn test_missing_assembly_is_config_error() {
    let err = resolve_pipeline(
      &def(json!([{ "name": "a", "system_prompt": "s" }])),
      &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
  }
}
