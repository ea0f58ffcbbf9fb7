//! # Timeout Guard
//!
//! Wall-clock budgets around units of work. Enforcement is deadline
//! observation: an async future is dropped when its budget runs out, while
//! blocking work handed to [`run_blocking_with_timeout`] keeps running on the
//! blocking pool and its late result is discarded. Either way the caller is
//! told about the breach at the deadline rather than receiving a late
//! success.

use crate::error::{Result, RouteError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub async fn with_timeout<T, Fut>(operation: &str, timeout: Duration, future: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_elapsed) => {
            warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "⏱️ Operation exceeded its deadline"
            );
            Err(RouteError::Timeout {
                operation: operation.to_string(),
                timeout,
            })
        }
    }
}

/// Run CPU-bound `work` on the blocking pool under a deadline
pub async fn run_blocking_with_timeout<T, F>(
    operation: &str,
    timeout: Duration,
    work: F,
) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    with_timeout(operation, timeout, async move {
        handle
            .await
            .map_err(|e| RouteError::Internal(format!("blocking task failed: {e}")))?
    })
    .await
}
