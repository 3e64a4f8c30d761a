use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::enums::{ScoreScale, TaskKind};
use crate::error::ConfigError;
use crate::field::FieldDef;
use crate::load::load_json;

/// A pipeline definition: the task graph plus its iteration budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
  pub pipeline_id: String,
  pub name: String,
  /// Upper bound on full passes through the graph.
  #[serde(default = "default_max_iterations")]
  pub max_iterations: u32,
  /// Passes whose `overall` score (as a percentage) falls below this loop again.
  #[serde(default = "default_quality_threshold")]
  pub quality_threshold: f64,
  #[serde(default)]
  pub score_scale: ScoreScale,
  /// Run-level timeout in milliseconds.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  pub tasks: Vec<TaskDef>,
}

impl PipelineDef {
  /// Load and validate a pipeline definition from a JSON file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let def: Self = load_json(path.as_ref())?;
    def.validate()?;
    Ok(def)
  }

  /// Check field-level constraints.
  ///
  /// Graph structure (dependencies, cycles, terminal task) is checked when
  /// the definition is resolved into a task graph.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.tasks.is_empty() {
      return Err(ConfigError::invalid(format!(
        "pipeline '{}' has no tasks",
        self.pipeline_id
      )));
    }
    if self.max_iterations == 0 {
      return Err(ConfigError::invalid("max_iterations must be at least 1"));
    }
    if !(0.0..=100.0).contains(&self.quality_threshold) {
      return Err(ConfigError::invalid(format!(
        "quality_threshold must be within 0..=100, got {}",
        self.quality_threshold
      )));
    }

    let mut seen = HashSet::new();
    for task in &self.tasks {
      if task.name.trim().is_empty() {
        return Err(ConfigError::invalid("task name must not be empty"));
      }
      if !seen.insert(task.name.as_str()) {
        return Err(ConfigError::invalid(format!(
          "duplicate task name '{}'",
          task.name
        )));
      }
      if task.max_attempts == Some(0) {
        return Err(ConfigError::invalid(format!(
          "task '{}' max_attempts must be at least 1",
          task.name
        )));
      }
    }

    let assemblers = self
      .tasks
      .iter()
      .filter(|t| t.kind == TaskKind::Assembly)
      .count();
    if assemblers != 1 {
      return Err(ConfigError::invalid(format!(
        "pipeline must have exactly one assembly task, found {}",
        assemblers
      )));
    }

    Ok(())
  }
}

/// One task in a pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub name: String,
  #[serde(default)]
  pub kind: TaskKind,
  /// Tasks whose contributions this task reads.
  #[serde(default)]
  pub depends_on: Vec<String>,
  pub system_prompt: String,
  /// Template rendered against the run state to form the user message.
  #[serde(default = "default_user_template")]
  pub user_template: String,
  /// Output schema for analysis tasks. Ignored for the assembly task.
  #[serde(default)]
  pub output: BTreeMap<String, FieldDef>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub temperature: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_tokens: Option<u32>,
  /// Overrides the engine retry policy for this task.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_attempts: Option<u32>,
  /// Per-attempt timeout in milliseconds.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

fn default_max_iterations() -> u32 {
  1
}

fn default_quality_threshold() -> f64 {
  40.0
}

fn default_user_template() -> String {
  "{{ input }}".to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn sample() -> serde_json::Value {
    json!({
      "pipeline_id": "security-review",
      "name": "Security Review",
      "max_iterations": 2,
      "tasks": [
        {
          "name": "threats",
          "system_prompt": "List threats.",
          "output": {
            "threats": { "type": "array" },
            "risk": { "type": "number", "default": 50, "min": 0, "max": 100 }
          }
        },
        {
          "name": "report",
          "kind": "assembly",
          "depends_on": ["threats"],
          "system_prompt": "Assemble the report."
        }
      ]
    })
  }

  #[test]
  fn test_deserialize_with_defaults() {
    let def: PipelineDef = serde_json::from_value(sample()).unwrap();

    assert_eq!(def.max_iterations, 2);
    assert_eq!(def.quality_threshold, 40.0);
    assert_eq!(def.score_scale, ScoreScale::Hundred);
    assert_eq!(def.tasks[0].kind, TaskKind::Analysis);
    assert_eq!(def.tasks[0].user_template, "{{ input }}");
    assert_eq!(def.tasks[1].kind, TaskKind::Assembly);
    assert!(def.validate().is_ok());
  }

  #[test]
  fn test_duplicate_task_rejected() {
    let mut def: PipelineDef = serde_json::from_value(sample()).unwrap();
    def.tasks.push(def.tasks[0].clone());

    let err = def.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate task name 'threats'"));
  }

  #[test]
  fn test_missing_assembly_rejected() {
    let mut def: PipelineDef = serde_json::from_value(sample()).unwrap();
    def.tasks.pop();

    let err = def.validate().unwrap_err();
    assert!(err.to_string().contains("exactly one assembly task"));
  }

  #[test]
  fn test_zero_iterations_rejected() {
    let mut def: PipelineDef = serde_json::from_value(sample()).unwrap();
    def.max_iterations = 0;
    assert!(def.validate().is_err());
  }

  #[test]
  fn test_load_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = PipelineDef::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
  }
}
