use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
  /// Two partials in the same batch wrote the same field.
  #[error("conflicting writes to '{field}' within one batch")]
  ConflictingWrite { field: String },

  /// A task tried to write a field that only the engine may set.
  #[error("task '{task}' attempted to write reserved field '{field}'")]
  ReservedField { task: String, field: String },
}
