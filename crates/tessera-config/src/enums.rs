use serde::{Deserialize, Serialize};

/// Range used for every dimension score in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
  /// Scores in `0..=10`.
  Ten,
  /// Scores in `0..=100`.
  #[default]
  Hundred,
}

impl ScoreScale {
  /// Upper bound of the scale.
  pub fn max(self) -> f64 {
    match self {
      ScoreScale::Ten => 10.0,
      ScoreScale::Hundred => 100.0,
    }
  }

  /// The neutral score used when a model omits or garbles a score.
  pub fn neutral(self) -> f64 {
    self.max() / 2.0
  }

  /// Convert a score on this scale to a percentage.
  pub fn to_percent(self, score: f64) -> f64 {
    score * 100.0 / self.max()
  }

  /// Convert a percentage to a score on this scale.
  pub fn from_percent(self, percent: f64) -> f64 {
    percent * self.max() / 100.0
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
  /// Produces one structured contribution stored under the task's name.
  #[default]
  Analysis,
  /// Terminal task that turns accumulated contributions into the report.
  Assembly,
}
