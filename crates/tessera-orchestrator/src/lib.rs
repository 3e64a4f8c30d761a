//! Tessera Orchestrator
//!
//! Runs resolved pipelines end to end.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │  - resolves one provider per run (fails before any task)    │
//! │  - builds the run context (retry policy, limiter, augmenter)│
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   IterationController                       │
//! │  - bounded loop: designing → assembled → iterating/finalized│
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Scheduler                            │
//! │  - one pass: batches in order, tasks in a batch concurrently│
//! │  - merges partial states in completion order                │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 PromptTask / AssemblyTask                   │
//! │  - template → retrying generation call → normalization      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let def = PipelineDef::load("pipeline.json")?;
//! let config = EngineConfig::load("engine.json")?;
//! let pipeline = resolve_pipeline(&def, &config)?;
//!
//! let engine = Engine::from_config(&config);
//! let outcome = engine
//!   .run(&pipeline, RunRequest::new("..."), CancellationToken::new())
//!   .await?;
//! ```

mod controller;
mod engine;
mod error;
mod events;
mod pipeline;
mod scheduler;
mod tasks;

pub use controller::{Completed, IterationController, Phase};
pub use engine::{Engine, RunOutcome, RunRequest};
pub use error::{OrchestratorError, PipelineError};
pub use events::{ChannelNotifier, NoopNotifier, RunEvent, RunNotifier};
pub use pipeline::{Pipeline, resolve_pipeline};
pub use scheduler::Scheduler;
pub use tasks::{AssemblyTask, DEFAULT_DEGRADATION_PENALTY, PromptTask};
