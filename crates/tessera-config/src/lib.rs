//! Tessera Config
//!
//! This crate contains the serializable configuration types for tessera.
//! These types describe pipelines and engine settings before they are
//! resolved into an executable task graph.
//!
//! Configuration is loaded from JSON files:
//! - a pipeline definition (`PipelineDef`) lists the analysis tasks, their
//!   dependencies, prompts and output schemas, plus the iteration budget;
//! - an engine configuration (`EngineConfig`) lists the candidate providers
//!   in priority order and the retry policy.
//!
//! The orchestrator takes these definitions, validates the graph and
//! templates, and resolves them into runtime structures for execution.

mod engine;
mod enums;
mod error;
mod field;
mod load;
mod pipeline;

pub use engine::{EngineConfig, ProviderDef, RetryDef};
pub use enums::{ScoreScale, TaskKind};
pub use error::ConfigError;
pub use field::FieldDef;
pub use pipeline::{PipelineDef, TaskDef};
