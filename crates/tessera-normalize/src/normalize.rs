//! Field-level projection of parsed output onto schema defaults.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::extract::{extract_json, repair_truncated, strip_wrappers};
use crate::result::{Issue, NormalizedResult};

/// A record type a task is expected to produce.
///
/// The serialized form of a value is the schema a response is projected
/// onto, so `Self::default()` documents the default of every field.
pub trait Normalize: Serialize + DeserializeOwned + Default {
  /// The defaults object responses are projected onto.
  ///
  /// Fields left out here are never read from the response; they keep the
  /// value they have in the seed.
  fn schema_defaults(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }

  /// Correct out-of-range values after parsing.
  ///
  /// Returns the names of the fields that had to be corrected.
  fn sanitize(&mut self) -> Vec<String> {
    Vec::new()
  }
}

/// Parse `raw` as leniently as possible.
///
/// Wrappers are only stripped once the text fails to parse as is, so fence
/// or tag markers inside JSON string values never cut the document.
fn parse_lenient(raw: &str, issues: &mut Vec<Issue>) -> Option<Value> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    issues.push(Issue::Empty);
    return None;
  }
  if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
    return Some(value);
  }

  let stripped = strip_wrappers(trimmed);
  if stripped != trimmed {
    if stripped.is_empty() {
      issues.push(Issue::Empty);
      return None;
    }
    if let Some(value) = parse_complete(stripped) {
      return Some(value);
    }
  }
  if let Some(value) = extract_json(trimmed).and_then(|json| serde_json::from_str(json).ok()) {
    return Some(value);
  }

  let repaired = repair_truncated(stripped).or_else(|| repair_truncated(trimmed));
  if let Some(value) = repaired.and_then(|json| serde_json::from_str(&json).ok()) {
    issues.push(Issue::Truncated);
    return Some(value);
  }

  issues.push(Issue::Unparseable);
  None
}

fn parse_complete(text: &str) -> Option<Value> {
  serde_json::from_str(text)
    .ok()
    .or_else(|| extract_json(text).and_then(|json| serde_json::from_str(json).ok()))
}

/// Whether `value` may stand in for a field whose default is `default`.
///
/// A `null` default marks an optional field and accepts anything.
fn same_kind(value: &Value, default: &Value) -> bool {
  match default {
    Value::Null => true,
    Value::Bool(_) => value.is_boolean(),
    Value::Number(_) => value.is_number(),
    Value::String(_) => value.is_string(),
    Value::Array(_) => value.is_array(),
    Value::Object(_) => value.is_object(),
  }
}

/// Project `parsed` onto the fields of `defaults`.
fn project(parsed: Option<Value>, defaults: &Value, issues: &mut Vec<Issue>) -> Value {
  let Some(parsed) = parsed else {
    return defaults.clone();
  };

  let Value::Object(schema) = defaults else {
    if same_kind(&parsed, defaults) {
      return parsed;
    }
    issues.push(Issue::WrongShape);
    return defaults.clone();
  };

  // No declared fields: keep whatever object came back.
  if schema.is_empty() {
    if parsed.is_object() {
      return parsed;
    }
    issues.push(Issue::WrongShape);
    return defaults.clone();
  }

  let Value::Object(mut fields) = parsed else {
    issues.push(Issue::WrongShape);
    return defaults.clone();
  };

  let mut defaulted = Vec::new();
  let mut out = Map::with_capacity(schema.len());
  for (key, default) in schema {
    match fields.remove(key) {
      Some(value) if same_kind(&value, default) => {
        out.insert(key.clone(), value);
      }
      _ => {
        defaulted.push(key.clone());
        out.insert(key.clone(), default.clone());
      }
    }
  }

  if !defaulted.is_empty() {
    issues.push(Issue::DefaultedFields(defaulted));
  }
  Value::Object(out)
}

/// Normalize raw model output against a defaults object.
///
/// Never fails: missing or malformed fields get their default, and output
/// with no recoverable JSON yields `defaults` itself, marked degraded.
pub fn normalize(raw: &str, defaults: &Value) -> NormalizedResult<Value> {
  let mut issues = Vec::new();
  let parsed = parse_lenient(raw, &mut issues);
  let value = project(parsed, defaults, &mut issues);
  NormalizedResult::from_parts(value, issues)
}

/// Normalize raw model output into `T`, starting from `T::default()`.
pub fn normalize_as<T: Normalize>(raw: &str) -> NormalizedResult<T> {
  normalize_into(raw, T::default())
}

/// Normalize raw model output into `T`, starting from `seed`.
///
/// Fields whose values pass the JSON type check but still fail to
/// deserialize into `T` (for example a map holding a string where a number
/// belongs) are reset to the seed's value one at a time.
pub fn normalize_into<T: Normalize>(raw: &str, seed: T) -> NormalizedResult<T> {
  let defaults = seed.schema_defaults();
  let base = serde_json::to_value(&seed).unwrap_or(Value::Null);

  let mut issues = Vec::new();
  let parsed = parse_lenient(raw, &mut issues);
  let projected = project(parsed, &defaults, &mut issues);

  let mut value = match serde_json::from_value::<T>(overlay(base.clone(), projected.clone())) {
    Ok(value) => value,
    Err(_) => deserialize_fieldwise(projected, base, seed, &mut issues),
  };

  let corrected = value.sanitize();
  if !corrected.is_empty() {
    issues.push(Issue::Sanitized(corrected));
  }

  NormalizedResult::from_parts(value, issues)
}

/// Write the fields of `top` over `base`.
fn overlay(base: Value, top: Value) -> Value {
  match (base, top) {
    (Value::Object(mut base), Value::Object(top)) => {
      base.extend(top);
      Value::Object(base)
    }
    (_, top) => top,
  }
}

fn deserialize_fieldwise<T: Normalize>(
  projected: Value,
  base: Value,
  seed: T,
  issues: &mut Vec<Issue>,
) -> T {
  let (Value::Object(fields), Value::Object(mut accepted)) = (projected, base) else {
    issues.push(Issue::WrongShape);
    return seed;
  };

  let mut rejected = Vec::new();
  for (key, value) in fields {
    let mut trial = accepted.clone();
    trial.insert(key.clone(), value.clone());
    if serde_json::from_value::<T>(Value::Object(trial)).is_ok() {
      accepted.insert(key, value);
    } else {
      rejected.push(key);
    }
  }

  if !rejected.is_empty() {
    issues.push(Issue::DefaultedFields(rejected));
  }
  serde_json::from_value(Value::Object(accepted)).unwrap_or(seed)
}
