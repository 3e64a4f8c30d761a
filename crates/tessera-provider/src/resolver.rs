use std::sync::Arc;
use std::time::Duration;

use tessera_config::ProviderDef;
use tracing::{info, warn};

use crate::error::{ProbeFailure, ProviderError, ResolveError};
use crate::openai::OpenAiCompatible;
use crate::service::{CompletionRequest, GenerationService};

/// The backend selected for a run.
///
/// Written once by [`ProviderResolver::resolve`] and shared read-only by
/// every task of the run.
#[derive(Clone)]
pub struct ProviderHandle {
  service: Arc<dyn GenerationService>,
}

impl ProviderHandle {
  pub fn new(service: Arc<dyn GenerationService>) -> Self {
    Self { service }
  }

  pub fn name(&self) -> &str {
    self.service.name()
  }

  pub async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
    self.service.complete(request).await
  }
}

impl std::fmt::Debug for ProviderHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProviderHandle")
      .field("name", &self.name())
      .finish()
  }
}

enum Candidate {
  Ready(Arc<dyn GenerationService>),
  /// A candidate whose client could not even be built.
  Broken { name: String, error: ProviderError },
}

/// Candidate backends in priority order.
#[derive(Default)]
pub struct ProviderResolver {
  candidates: Vec<Candidate>,
  probe_timeout: Option<Duration>,
}

impl ProviderResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Candidates from configuration, keeping their declared order.
  pub fn from_defs(defs: &[ProviderDef]) -> Self {
    let candidates = defs
      .iter()
      .map(|def| match OpenAiCompatible::from_def(def) {
        Ok(client) => Candidate::Ready(Arc::new(client)),
        Err(error) => Candidate::Broken {
          name: def.name.clone(),
          error,
        },
      })
      .collect();
    Self {
      candidates,
      probe_timeout: None,
    }
  }

  /// Append a lower-priority candidate.
  pub fn with_candidate(mut self, service: Arc<dyn GenerationService>) -> Self {
    self.candidates.push(Candidate::Ready(service));
    self
  }

  /// Give up on a probe after `timeout`.
  pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
    self.probe_timeout = Some(timeout);
    self
  }

  pub fn len(&self) -> usize {
    self.candidates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.candidates.is_empty()
  }

  /// Probe candidates in order and select the first that answers.
  pub async fn resolve(&self) -> Result<ProviderHandle, ResolveError> {
    let probe = CompletionRequest::probe();
    let mut failures = Vec::new();

    for candidate in &self.candidates {
      let service = match candidate {
        Candidate::Ready(service) => service,
        Candidate::Broken { name, error } => {
          warn!(provider = %name, error = %error, "provider_probe_failed");
          failures.push(ProbeFailure {
            provider: name.clone(),
            error: error.clone(),
          });
          continue;
        }
      };

      let outcome = match self.probe_timeout {
        Some(limit) => tokio::time::timeout(limit, service.complete(&probe))
          .await
          .unwrap_or_else(|_| {
            Err(ProviderError::Transport(format!(
              "probe timed out after {}ms",
              limit.as_millis()
            )))
          }),
        None => service.complete(&probe).await,
      };

      match outcome {
        Ok(_) => {
          info!(provider = %service.name(), "provider_selected");
          return Ok(ProviderHandle::new(service.clone()));
        }
        Err(error) => {
          warn!(provider = %service.name(), error = %error, "provider_probe_failed");
          failures.push(ProbeFailure {
            provider: service.name().to_string(),
            error,
          });
        }
      }
    }

    Err(ResolveError::NoUsableBackend { failures })
  }
}
