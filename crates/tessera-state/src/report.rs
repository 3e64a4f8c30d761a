use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tessera_config::ScoreScale;
use tessera_normalize::{Normalize, NormalizedResult, normalize_into};

/// Key of the aggregate score in `dimension_scores`.
pub const OVERALL: &str = "overall";

/// The structured product of one assembly pass.
///
/// A later pass supersedes the report as a whole; nothing edits a report
/// in place once it is in state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
  pub scale: ScoreScale,
  /// Dimension name to score on `scale`. Always holds [`OVERALL`].
  pub dimension_scores: BTreeMap<String, f64>,
  /// Category name to finding records.
  pub findings: BTreeMap<String, Vec<Value>>,
  pub summary_text: String,
}

impl Report {
  /// An empty report with a neutral `overall` on `scale`.
  pub fn neutral(scale: ScoreScale) -> Self {
    Self {
      scale,
      dimension_scores: BTreeMap::from([(OVERALL.to_string(), scale.neutral())]),
      findings: BTreeMap::new(),
      summary_text: String::new(),
    }
  }

  /// Normalize an assembly response into a report on `scale`.
  pub fn from_response(raw: &str, scale: ScoreScale) -> NormalizedResult<Self> {
    normalize_into(raw, Self::neutral(scale))
  }

  pub fn overall(&self) -> f64 {
    self
      .dimension_scores
      .get(OVERALL)
      .copied()
      .unwrap_or_else(|| self.scale.neutral())
  }

  /// `overall` as a percentage, whatever the scale.
  pub fn overall_percent(&self) -> f64 {
    self.scale.to_percent(self.overall())
  }

  /// Lower `overall` by `points` percentage points, stopping at zero.
  pub fn apply_penalty(&mut self, points: f64) {
    let percent = (self.overall_percent() - points).max(0.0);
    self
      .dimension_scores
      .insert(OVERALL.to_string(), self.scale.from_percent(percent));
  }
}

impl Default for Report {
  fn default() -> Self {
    Self::neutral(ScoreScale::default())
  }
}

impl Normalize for Report {
  fn schema_defaults(&self) -> Value {
    json!({
      "dimension_scores": self.dimension_scores,
      "findings": self.findings,
      "summary_text": self.summary_text,
    })
  }

  fn sanitize(&mut self) -> Vec<String> {
    let max = self.scale.max();
    let neutral = self.scale.neutral();
    let mut corrected = Vec::new();

    for (name, score) in self.dimension_scores.iter_mut() {
      let fixed = if score.is_finite() {
        score.clamp(0.0, max)
      } else {
        neutral
      };
      if fixed != *score {
        *score = fixed;
        corrected.push(format!("dimension_scores.{}", name));
      }
    }

    if !self.dimension_scores.contains_key(OVERALL) {
      let others: Vec<f64> = self.dimension_scores.values().copied().collect();
      let overall = if others.is_empty() {
        neutral
      } else {
        others.iter().sum::<f64>() / others.len() as f64
      };
      self.dimension_scores.insert(OVERALL.to_string(), overall);
      corrected.push(format!("dimension_scores.{}", OVERALL));
    }

    corrected
  }
}
