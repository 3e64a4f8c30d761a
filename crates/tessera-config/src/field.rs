use serde::{Deserialize, Serialize};
use serde_json::json;

/// Declared type of one field in a task's structured output.
///
/// The declared type doubles as the field's documented default, which the
/// normalizer substitutes whenever the model omits or garbles the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldDef {
  /// Free text, defaults to `""`.
  Text,
  /// List of items, defaults to `[]`.
  Array,
  /// Flag, defaults to `false`.
  Boolean,
  /// Nested object, defaults to `{}`.
  Object,
  /// Bounded number.
  Number {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
  },
}

impl FieldDef {
  /// The value substituted when the field is missing or malformed.
  pub fn default_value(&self) -> serde_json::Value {
    match self {
      FieldDef::Text => json!(""),
      FieldDef::Array => json!([]),
      FieldDef::Boolean => json!(false),
      FieldDef::Object => json!({}),
      FieldDef::Number { default, .. } => json!(self.bound(default.unwrap_or(0.0))),
    }
  }

  /// Clamp a number into the declared range. Non-number fields pass through.
  pub fn bound(&self, value: f64) -> f64 {
    match self {
      FieldDef::Number { min, max, .. } => {
        let value = min.map_or(value, |min| value.max(min));
        max.map_or(value, |max| value.min(max))
      }
      _ => value,
    }
  }

  /// Apply [`FieldDef::bound`] to a JSON value in place.
  pub fn bound_value(&self, value: &mut serde_json::Value) {
    if let (FieldDef::Number { .. }, Some(n)) = (self, value.as_f64()) {
      *value = json!(self.bound(n));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_per_type() {
    assert_eq!(FieldDef::Text.default_value(), json!(""));
    assert_eq!(FieldDef::Array.default_value(), json!([]));
    assert_eq!(FieldDef::Boolean.default_value(), json!(false));
    assert_eq!(FieldDef::Object.default_value(), json!({}));
  }

  #[test]
  fn test_number_default_is_bounded() {
    let field = FieldDef::Number {
      default: Some(50.0),
      min: Some(0.0),
      max: Some(10.0),
    };
    assert_eq!(field.default_value(), json!(10.0));
  }

  #[test]
  fn test_bound_value_clamps_numbers_only() {
    let field = FieldDef::Number {
      default: None,
      min: Some(0.0),
      max: Some(100.0),
    };
    let mut value = json!(140);
    field.bound_value(&mut value);
    assert_eq!(value, json!(100.0));

    let mut text = json!("140");
    FieldDef::Text.bound_value(&mut text);
    assert_eq!(text, json!("140"));
  }

  #[test]
  fn test_deserialize_tagged() {
    let field: FieldDef =
      serde_json::from_value(json!({ "type": "number", "default": 50, "max": 100 })).unwrap();
    assert_eq!(
      field,
      FieldDef::Number {
        default: Some(50.0),
        min: None,
        max: Some(100.0),
      }
    );
  }
}
