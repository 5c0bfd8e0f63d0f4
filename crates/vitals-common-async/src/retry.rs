//! Linear-backoff retry for transient failures.

use crate::shutdown::ShutdownHandle;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy: `max_attempts` calls, sleeping
/// `initial_delay + k * delay_increment` between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of times the operation is invoked.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Added to the delay after every retry.
    pub delay_increment: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            delay_increment: Duration::from_secs(1),
        }
    }
}

/// Terminal outcomes of a retried operation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The error was not transient; it propagates without further attempts.
    #[error(transparent)]
    Permanent(E),

    /// Every attempt failed with a transient error.
    #[error("after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// The shutdown token fired during a backoff sleep.
    #[error("operation cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// The underlying operation error, if the failure carries one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Permanent(e) | Self::Exhausted { last_error: e, .. } => Some(e),
            Self::Cancelled => None,
        }
    }
}

/// Run `op` under `policy`, retrying only errors `is_transient` accepts.
///
/// Backoff sleeps race against `shutdown`; cancellation aborts the loop
/// immediately with [`RetryError::Cancelled`].
pub async fn retry<F, Fut, T, E>(
    policy: RetryPolicy,
    shutdown: &ShutdownHandle,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay;
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        debug!(attempt, "attempting operation");

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_transient(&err) => {
                warn!(%err, "not retrying non-transient error");
                return Err(RetryError::Permanent(err));
            }
            Err(err) => {
                warn!(%err, attempt, "operation failed, will retry");
                last_error = Some(err);
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    warn!("retry cancelled during backoff");
                    return Err(RetryError::Cancelled);
                }
            }
            delay += policy.delay_increment;
        }
    }

    Err(RetryError::Exhausted {
        attempts: policy.max_attempts,
        last_error: last_error.expect("max_attempts is at least 1"),
    })
}
