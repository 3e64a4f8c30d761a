//! Tessera Workflow
//!
//! The executable form of a pipeline: a validated graph of [`TaskSpec`]s,
//! each pairing a task name and its predecessors with a [`Task`] body.
//!
//! Compared to a `PipelineDef` from `tessera-config`:
//! - the graph is known to be a DAG with entry tasks and a single terminal
//! - task bodies are bound (built-in LLM tasks or arbitrary closures)
//! - the batch plan (Kahn levels) is computed once at construction
//!
//! The loop from the terminal task back to the entry tasks is not a graph
//! edge. [`Graph::back_edge`] names it so an iteration controller can apply
//! it.

mod context;
mod error;
mod graph;
mod task;

pub use context::{RunContext, TaskContext};
pub use error::WorkflowError;
pub use graph::Graph;
pub use task::{FnTask, Task, TaskError, TaskSpec};
