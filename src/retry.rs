//! Retry policy for search requests and a cancellable wait primitive.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::GdcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    Linear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until success or cancellation.
    pub max_attempts: Option<u32>,
    pub max_elapsed: Option<Duration>,
    pub delay: Duration,
    pub backoff: Backoff,
    /// Also retry 4xx responses other than 408/429.
    pub retry_client_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            max_elapsed: None,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
            retry_client_errors: false,
        }
    }
}

impl RetryPolicy {
    /// Retries every failure forever with a one second pause.
    pub fn persistent() -> Self {
        Self {
            max_attempts: None,
            max_elapsed: None,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
            retry_client_errors: true,
        }
    }

    /// Pause before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt.max(1)),
        }
    }

    pub fn is_retryable(&self, err: &GdcError) -> bool {
        match err {
            GdcError::Http(_) => true,
            GdcError::Status { status, .. } => {
                is_transient_status(*status) || self.retry_client_errors
            }
            _ => false,
        }
    }

    /// Runs `op` until it succeeds, fails terminally, or the policy gives up.
    /// `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, cancel: &CancelToken, mut op: F) -> Result<T, GdcError>
    where
        F: FnMut(u32) -> Result<T, GdcError>,
    {
        let started = Instant::now();
        let mut attempt = 1u32;
        loop {
            if cancel.is_cancelled() {
                return Err(GdcError::Cancelled);
            }
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !self.is_retryable(&err) {
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            let out_of_attempts = self.max_attempts.is_some_and(|max| attempt >= max);
            let out_of_time = self
                .max_elapsed
                .is_some_and(|max| started.elapsed() + delay > max);
            if out_of_attempts || out_of_time {
                return Err(GdcError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying GDC request");
            if cancel.wait(delay) {
                return Err(GdcError::Cancelled);
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// Shared flag that interrupts retry waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, signal) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for up to `timeout`. Returns true if cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, signal) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        if timeout.is_zero() {
            return *guard;
        }
        let (guard, _) = signal
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
