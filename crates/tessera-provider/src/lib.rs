//! Tessera Provider
//!
//! The narrow interfaces tessera uses to reach a text-generation backend:
//!
//! - [`GenerationService`]: `complete(system_prompt, user_message, options)`;
//!   [`OpenAiCompatible`] implements it over HTTP for any endpoint that speaks
//!   the chat completions protocol.
//! - [`ProviderResolver`]: probes candidates in priority order, once per run,
//!   and hands back the first that answers as a [`ProviderHandle`].
//! - [`ContextAugmenter`]: optionally enriches a system prompt before a call.

mod augment;
mod error;
mod openai;
mod resolver;
mod service;

pub use augment::{AugmentError, ContextAugmenter, NoAugmentation};
pub use error::{ProbeFailure, ProviderError, ResolveError};
pub use openai::OpenAiCompatible;
pub use resolver::{ProviderHandle, ProviderResolver};
pub use service::{CompletionOptions, CompletionRequest, GenerationService};
