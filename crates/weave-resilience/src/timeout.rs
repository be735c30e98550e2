//! Deadline wrappers for async operations.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout as tokio_timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ResilienceError, ResilienceResult};

/// Run a future with a hard deadline.
pub async fn timeout<T, F>(duration: Duration, future: F) -> ResilienceResult<T>
where
    F: Future<Output = T>,
{
    tokio_timeout(duration, future)
        .await
        .map_err(|_| ResilienceError::timeout(duration))
}

/// Run a future with a primary deadline plus a cleanup grace period.
///
/// When the primary deadline expires the `cancel` token fires so the
/// operation can unwind; the future then gets up to `grace` more time to
/// finish. Only after both windows elapse does the call give up. The
/// reported timeout duration is the primary deadline.
pub async fn timeout_with_grace<T, F>(
    primary: Duration,
    grace: Duration,
    cancel: &CancellationToken,
    future: F,
) -> ResilienceResult<T>
where
    F: Future<Output = T>,
{
    tokio::pin!(future);

    match tokio_timeout(primary, &mut future).await {
        Ok(value) => Ok(value),
        Err(_) => {
            debug!(
                primary_ms = primary.as_millis() as u64,
                grace_ms = grace.as_millis() as u64,
                "primary deadline expired, entering grace period"
            );
            cancel.cancel();
            tokio_timeout(grace, &mut future)
                .await
                .map_err(|_| ResilienceError::timeout(primary))
        }
    }
}
