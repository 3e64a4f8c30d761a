use std::fmt::Display;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RetryError;
use crate::policy::RetryPolicy;

/// Record of one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
  /// Zero-based attempt index.
  pub attempt: u32,
  pub error: String,
  pub failed_at: DateTime<Utc>,
}

/// A successful call and the attempts that failed before it.
#[derive(Debug, Clone)]
pub struct Invocation<T> {
  pub value: T,
  /// Zero-based index of the attempt that succeeded.
  pub attempt: u32,
  pub failures: Vec<AttemptFailure>,
}

/// Runs calls under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRunner {
  policy: RetryPolicy,
}

impl TaskRunner {
  pub fn new(policy: RetryPolicy) -> Self {
    Self { policy }
  }

  pub fn policy(&self) -> &RetryPolicy {
    &self.policy
  }

  /// A runner with the same policy but a different attempt budget.
  pub fn with_max_attempts(self, max_attempts: u32) -> Self {
    Self::new(self.policy.with_max_attempts(max_attempts))
  }

  /// A runner with the same policy but a different per-attempt limit.
  pub fn with_attempt_timeout(self, timeout: Option<std::time::Duration>) -> Self {
    Self::new(self.policy.with_attempt_timeout(timeout))
  }

  /// Call `call` until it succeeds or the attempt budget is spent.
  ///
  /// `call` receives the zero-based attempt index and must build a fresh
  /// future each time.
  pub async fn invoke<T, E, F, Fut>(&self, call: F) -> Result<Invocation<T>, RetryError>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
  {
    self
      .invoke_gated(|| async { Ok::<(), E>(()) }, call)
      .await
  }

  /// Like [`invoke`](Self::invoke), but every attempt first awaits `gate`.
  ///
  /// The guard `gate` resolves to is held until the attempt finishes. Time
  /// spent waiting on the gate does not count against the attempt timeout;
  /// a gate error fails the attempt.
  pub async fn invoke_gated<T, E, G, Gate, GateFut, F, Fut>(
    &self,
    mut gate: Gate,
    mut call: F,
  ) -> Result<Invocation<T>, RetryError>
  where
    Gate: FnMut() -> GateFut,
    GateFut: Future<Output = Result<G, E>>,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
  {
    let attempts = self.policy.attempts();
    let mut failures = Vec::new();

    for attempt in 0..attempts {
      let outcome = match gate().await {
        Ok(guard) => {
          let outcome = self.timed(call(attempt)).await;
          drop(guard);
          outcome
        }
        Err(e) => Err(e.to_string()),
      };

      match outcome {
        Ok(value) => {
          return Ok(Invocation {
            value,
            attempt,
            failures,
          });
        }
        Err(error) => {
          failures.push(AttemptFailure {
            attempt,
            error,
            failed_at: Utc::now(),
          });
          if attempt + 1 < attempts {
            tokio::time::sleep(self.policy.delay_for(attempt)).await;
          }
        }
      }
    }

    let last_error = failures
      .last()
      .map(|f| f.error.clone())
      .unwrap_or_default();
    Err(RetryError {
      attempts,
      last_error,
      failures,
    })
  }

  async fn timed<T, E: Display>(&self, call: impl Future<Output = Result<T, E>>) -> Result<T, String> {
    match self.policy.attempt_timeout {
      Some(limit) => match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("attempt timed out after {}ms", limit.as_millis())),
      },
      None => call.await.map_err(|e| e.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  use tokio::time::Instant;

  use super::*;

  fn runner() -> TaskRunner {
    TaskRunner::new(RetryPolicy::new(3, Duration::from_secs(1)))
  }

  #[tokio::test(start_paused = true)]
  async fn test_attempts_exactly_max_attempts() {
    let calls = AtomicU32::new(0);
    let err = runner()
      .invoke(|_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>("service unavailable") }
      })
      .await
      .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.attempts, 3);
    assert_eq!(err.last_error, "service unavailable");
    let indices: Vec<u32> = err.failures.iter().map(|f| f.attempt).collect();
    assert_eq!(indices, [0, 1, 2]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_backoff_doubles_and_skips_final_wait() {
    let started = Instant::now();
    let call_times = Mutex::new(Vec::new());

    let _ = runner()
      .invoke(|_| {
        call_times.lock().unwrap().push(started.elapsed());
        async { Err::<(), _>("boom") }
      })
      .await;

    let times = call_times.into_inner().unwrap();
    assert_eq!(times.len(), 3);
    assert_near(times[0], Duration::ZERO);
    assert_near(times[1], Duration::from_secs(1));
    assert_near(times[2], Duration::from_secs(3));
    // No sleep after the third failure.
    assert_near(started.elapsed(), Duration::from_secs(3));
  }

  fn assert_near(actual: Duration, expected: Duration) {
    assert!(
      actual >= expected && actual < expected + Duration::from_millis(5),
      "expected ~{:?}, got {:?}",
      expected,
      actual
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_success_after_failures() {
    let result = runner()
      .invoke(|attempt| async move {
        if attempt < 2 {
          Err(format!("attempt {} failed", attempt))
        } else {
          Ok("done")
        }
      })
      .await
      .unwrap();

    assert_eq!(result.value, "done");
    assert_eq!(result.attempt, 2);
    assert_eq!(result.failures.len(), 2);
    assert_eq!(result.failures[1].error, "attempt 1 failed");
  }

  #[tokio::test(start_paused = true)]
  async fn test_first_success_does_not_wait() {
    let started = Instant::now();
    let result = runner()
      .invoke(|_| async { Ok::<_, String>(7) })
      .await
      .unwrap();
    assert_eq!(result.value, 7);
    assert!(result.failures.is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
  }

  #[tokio::test(start_paused = true)]
  async fn test_hung_attempt_times_out() {
    let policy =
      RetryPolicy::new(2, Duration::from_millis(10)).with_attempt_timeout(Some(Duration::from_secs(1)));
    let err = TaskRunner::new(policy)
      .invoke(|_| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<_, String>(())
      })
      .await
      .unwrap_err();

    assert_eq!(err.attempts, 2);
    assert!(err.last_error.contains("timed out"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_gate_wait_is_not_timed() {
    let policy =
      RetryPolicy::new(1, Duration::from_millis(10)).with_attempt_timeout(Some(Duration::from_millis(150)));
    let started = Instant::now();
    let result = TaskRunner::new(policy)
      .invoke_gated(
        || async {
          tokio::time::sleep(Duration::from_millis(400)).await;
          Ok::<_, String>(())
        },
        |_| async {
          tokio::time::sleep(Duration::from_millis(80)).await;
          Ok::<_, String>("answered")
        },
      )
      .await
      .unwrap();

    assert_eq!(result.value, "answered");
    assert!(result.failures.is_empty());
    assert_near(started.elapsed(), Duration::from_millis(480));
  }

  #[tokio::test(start_paused = true)]
  async fn test_gated_call_still_times_out() {
    let policy =
      RetryPolicy::new(1, Duration::from_millis(10)).with_attempt_timeout(Some(Duration::from_millis(150)));
    let err = TaskRunner::new(policy)
      .invoke_gated(
        || async { Ok::<_, String>(()) },
        |_| async {
          tokio::time::sleep(Duration::from_secs(60)).await;
          Ok::<_, String>(())
        },
      )
      .await
      .unwrap_err();

    assert_eq!(err.last_error, "attempt timed out after 150ms");
  }

  #[tokio::test(start_paused = true)]
  async fn test_gate_error_fails_attempt() {
    let calls = AtomicU32::new(0);
    let err = runner()
      .with_max_attempts(2)
      .invoke_gated(
        || async { Err::<(), _>("gate closed".to_string()) },
        |_| {
          calls.fetch_add(1, Ordering::SeqCst);
          async { Ok::<_, String>(()) }
        },
      )
      .await
      .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(err.attempts, 2);
    assert_eq!(err.last_error, "gate closed");
  }

  #[tokio::test(start_paused = true)]
  async fn test_zero_attempts_still_calls_once() {
    let calls = AtomicU32::new(0);
    let _ = runner()
      .with_max_attempts(0)
      .invoke(|_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>("x") }
      })
      .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
