//! Circuit breaker guarding the shared broker connection.
//!
//! One breaker instance is shared by every in-flight publish. A run of
//! consecutive failures opens it; after the reset timeout a single trial call
//! is let through and its outcome decides between closing and reopening.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing; calls are rejected without being attempted.
    Open,
    /// Reset timeout elapsed; one trial call decides the next state.
    HalfOpen,
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The call was rejected without invoking the operation.
    #[error("Circuit breaker is open")]
    Open,
    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker for protecting against cascading failures.
pub struct CircuitBreaker {
    name: String,
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    /// Create a new circuit breaker. A zero threshold is treated as one.
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
        }
    }

    /// Observed state. An open breaker whose timeout has elapsed reports `HalfOpen`;
    /// reading never changes the stored state.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Open if self.timeout_elapsed(&inner) => CircuitState::HalfOpen,
            state => state,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Run `operation` under the breaker.
    ///
    /// While open (and before the reset timeout) the operation is not invoked and
    /// [`BreakerError::Open`] is returned. While half-open only one caller runs the
    /// trial; concurrent callers are rejected until it completes.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut permit = self.try_acquire().ok_or(BreakerError::Open)?;

        let result = operation().await;
        match &result {
            Ok(_) => permit.succeed(),
            Err(_) => permit.fail(),
        }
        result.map_err(BreakerError::Inner)
    }

    fn timeout_elapsed(&self, inner: &BreakerInner) -> bool {
        inner
            .opened_at
            .is_some_and(|opened_at| opened_at.elapsed() >= self.reset_timeout)
    }

    fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut inner = self.inner.lock();
        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                if !self.timeout_elapsed(&inner) {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                debug!(breaker = %self.name, "Circuit breaker half-open, admitting trial call");
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                inner.trial_in_flight = true;
                true
            }
        };
        Some(CallPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.trial_in_flight = false;
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            inner.trial_in_flight = false;
            info!(breaker = %self.name, "Circuit breaker closed after successful trial call");
        } else if inner.state == CircuitState::Closed {
            inner.consecutive_failures = 0;
        }
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            self.open(&mut inner);
            warn!(breaker = %self.name, "Circuit breaker reopened after failed trial call");
            return;
        }
        // Calls admitted before the breaker opened may finish late; they no longer count.
        if inner.state != CircuitState::Closed {
            return;
        }
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            self.open(&mut inner);
            warn!(
                breaker = %self.name,
                failures = inner.consecutive_failures,
                reset_timeout_ms = self.reset_timeout.as_millis() as u64,
                "Circuit breaker opened after consecutive failures"
            );
        }
    }
}

/// Admission ticket for one call. A trial permit dropped without an outcome
/// (the caller was cancelled) reopens the breaker so the trial slot is not leaked.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    fn succeed(&mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    fn fail(&mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.record_failure(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        breaker.execute(|| async { Err("boom") }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        breaker.execute(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(60));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(succeed(&breaker).await.is_ok());
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_on_failures() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(60));

        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner("boom"))));
        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner("boom"))));
        assert_eq!(breaker.state(), CircuitState::Closed);

        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner("boom"))));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_breaker_does_not_invoke_operation() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_secs(60));
        let _ = fail(&breaker).await;

        let calls = AtomicUsize::new(0);
        let result: Result<(), BreakerError<&str>> = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(60));

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.consecutive_failures(), 0);

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_trial_success_closes() {
        let breaker = CircuitBreaker::new("test", 2, Duration::from_millis(30));
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_trial_failure_reopens_and_restarts_timeout() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_millis(150));
        let _ = fail(&breaker).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state(), CircuitState::Open);

        // Timeout restarted: still rejecting immediately.
        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open)));
    }

    #[tokio::test]
    async fn test_only_one_trial_in_flight() {
        let breaker = Arc::new(CircuitBreaker::new("test", 1, Duration::from_millis(20)));
        let _ = fail(&breaker).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

        let trial = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .execute(|| async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, &'static str>(())
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open)));

        release_tx.send(()).unwrap();
        trial.await.unwrap().unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_cancelled_trial_reopens() {
        let breaker = Arc::new(CircuitBreaker::new("test", 1, Duration::from_millis(150)));
        let _ = fail(&breaker).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let handle = {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .execute(|| async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok::<_, &'static str>(())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        let _ = handle.await;

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!(CircuitState::Closed.to_string(), "closed");
    }
}
