//! Tessera Task Runner
//!
//! Executes one fallible async call under a retry policy: on failure wait
//! `base_delay * 2^attempt` and try again, up to `max_attempts` in total.
//! There is no wait after the final attempt.
//!
//! The runner does not log. Every failed attempt is returned as an
//! [`AttemptFailure`] so the caller can record and report it.

mod error;
mod policy;
mod runner;

pub use error::RetryError;
pub use policy::RetryPolicy;
pub use runner::{AttemptFailure, Invocation, TaskRunner};
