//! Tessera State
//!
//! The record threaded through a pipeline run and the reducers that fold
//! task contributions into it.
//!
//! Tasks never mutate [`GraphState`]. Each task execution returns one
//! [`PartialState`], a sparse set of updates, and the scheduler folds it in
//! with [`merge`] (or [`merge_batch`] for a whole batch at once):
//!
//! - `messages` are appended, each merged block ordered by completion time;
//! - `task_results` are last-write-wins per task name;
//! - `report` and `iteration` are overwritten.
//!
//! A partial has no way to delete another task's contribution.

mod error;
mod merge;
mod message;
mod report;
mod state;

pub use error::StateError;
pub use merge::{merge, merge_batch};
pub use message::{Message, MessageKind};
pub use report::{OVERALL, Report};
pub use state::{GraphState, PartialState, TaskOutput};
