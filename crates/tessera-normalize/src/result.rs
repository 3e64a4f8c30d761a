use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a normalized result fell back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", content = "detail", rename_all = "snake_case")]
pub enum Issue {
  /// The response was empty or whitespace.
  Empty,
  /// No JSON could be recovered from the response.
  Unparseable,
  /// The JSON was cut off and had to be closed.
  Truncated,
  /// The response was JSON of the wrong shape (e.g. an array for an object).
  WrongShape,
  /// These fields were missing or had the wrong type.
  DefaultedFields(Vec<String>),
  /// These fields were present but out of range and were corrected.
  Sanitized(Vec<String>),
}

impl fmt::Display for Issue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Issue::Empty => write!(f, "empty response"),
      Issue::Unparseable => write!(f, "no JSON found in response"),
      Issue::Truncated => write!(f, "truncated JSON was repaired"),
      Issue::WrongShape => write!(f, "response JSON has the wrong shape"),
      Issue::DefaultedFields(fields) => write!(f, "defaulted fields: {}", fields.join(", ")),
      Issue::Sanitized(fields) => write!(f, "corrected fields: {}", fields.join(", ")),
    }
  }
}

/// A typed projection of a task's raw text output.
///
/// Either every field came from the response (`Parsed`), or at least one
/// field holds its documented default (`Degraded`). Both variants always
/// carry a complete value.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResult<T> {
  Parsed(T),
  Degraded { value: T, issues: Vec<Issue> },
}

impl<T> NormalizedResult<T> {
  pub(crate) fn from_parts(value: T, issues: Vec<Issue>) -> Self {
    if issues.is_empty() {
      NormalizedResult::Parsed(value)
    } else {
      NormalizedResult::Degraded { value, issues }
    }
  }

  pub fn value(&self) -> &T {
    match self {
      NormalizedResult::Parsed(value) => value,
      NormalizedResult::Degraded { value, .. } => value,
    }
  }

  pub fn into_value(self) -> T {
    match self {
      NormalizedResult::Parsed(value) => value,
      NormalizedResult::Degraded { value, .. } => value,
    }
  }

  pub fn is_degraded(&self) -> bool {
    matches!(self, NormalizedResult::Degraded { .. })
  }

  /// Issues that caused degradation; empty for `Parsed`.
  pub fn issues(&self) -> &[Issue] {
    match self {
      NormalizedResult::Parsed(_) => &[],
      NormalizedResult::Degraded { issues, .. } => issues,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> NormalizedResult<U> {
    match self {
      NormalizedResult::Parsed(value) => NormalizedResult::Parsed(f(value)),
      NormalizedResult::Degraded { value, issues } => NormalizedResult::Degraded {
        value: f(value),
        issues,
      },
    }
  }
}
