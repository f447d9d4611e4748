//! Call controls: deadline, cancellation, retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use super::error::ReasoningError;
use super::{ReasoningRequest, ReasoningService};

/// Bounded retry policy for transient reasoning-service failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = at-most-once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
    /// Upper bound of the random jitter added to each delay (milliseconds).
    pub max_jitter_ms: u64,
    /// Wall-clock limit for a single attempt (milliseconds, 0 = none).
    pub attempt_timeout_ms: u64,
}

/// At-most-once: retries are opted into by raising `max_retries`, which then
/// backs off from 500 ms with up to 250 ms of jitter.
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 500,
            max_jitter_ms: 250,
            attempt_timeout_ms: 0,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries, no backoff configured.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 0,
            max_jitter_ms: 0,
            attempt_timeout_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)` plus jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.max_jitter_ms)
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }

    fn attempt_timeout(&self) -> Option<Duration> {
        (self.attempt_timeout_ms > 0).then(|| Duration::from_millis(self.attempt_timeout_ms))
    }
}

/// Sending half of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a handle and the signal it controls.
    pub fn new() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelSignal { rx })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of a cancellation pair; cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Per-request deadline and cancellation, threaded through extractor and evaluator.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelSignal>,
}

impl CallContext {
    /// No deadline, no cancellation.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled)
    }

    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    async fn wait_cancelled(&self) {
        match &self.cancel {
            Some(signal) => signal.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Run `fut` bounded by the attempt timeout, the deadline and cancellation.
    async fn run<F>(&self, attempt_timeout: Option<Duration>, fut: F) -> Result<String, ReasoningError>
    where
        F: Future<Output = Result<String, ReasoningError>>,
    {
        let attempt = async {
            match attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(ReasoningError::ServiceUnavailable(format!(
                        "attempt timed out after {}ms",
                        limit.as_millis()
                    ))),
                },
                None => fut.await,
            }
        };
        let bounded = async {
            match self.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(ReasoningError::DeadlineExceeded),
                },
                None => attempt.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.wait_cancelled() => Err(ReasoningError::Cancelled),
            result = bounded => result,
        }
    }

    /// Sleep for a backoff delay unless the deadline or cancellation comes first.
    async fn backoff(&self, delay: Duration) -> Result<(), ReasoningError> {
        if let Some(deadline) = self.deadline {
            if Instant::now() + delay >= deadline {
                return Err(ReasoningError::DeadlineExceeded);
            }
        }
        tokio::select! {
            biased;
            _ = self.wait_cancelled() => Err(ReasoningError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Call the reasoning service under `policy` and `ctx`.
///
/// Only [`ReasoningError::ServiceUnavailable`] is retried; every other error
/// is returned from the attempt that produced it.
pub async fn call_with_controls(
    service: &dyn ReasoningService,
    request: ReasoningRequest<'_>,
    policy: &RetryPolicy,
    ctx: &CallContext,
) -> Result<String, ReasoningError> {
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 1;

    loop {
        if ctx.is_cancelled() {
            return Err(ReasoningError::Cancelled);
        }
        if ctx.is_expired() {
            return Err(ReasoningError::DeadlineExceeded);
        }

        match ctx
            .run(policy.attempt_timeout(), service.generate_json(request))
            .await
        {
            Ok(body) => return Ok(body),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    event = "reasoning.retry",
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                );
                ctx.backoff(delay).await?;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
