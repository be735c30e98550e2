//! Bulkhead: a concurrency cap with bounded waiting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{ResilienceError, ResilienceResult};

/// Caps concurrent operations at `max_concurrency`; up to `max_waiters`
/// callers may queue for a permit, each waiting at most
/// `acquire_timeout`.
#[derive(Debug)]
pub struct Bulkhead {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    max_waiters: usize,
    acquire_timeout: Duration,
    waiters: AtomicUsize,
}

impl Bulkhead {
    /// Bulkhead with the given cap, allowing as many waiters as permits
    /// and a 30s acquire timeout.
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        Self::with_limits(max_concurrency, max_concurrency, Duration::from_secs(30))
    }

    /// Bulkhead with explicit waiter bound and acquire timeout.
    #[must_use]
    pub fn with_limits(
        max_concurrency: usize,
        max_waiters: usize,
        acquire_timeout: Duration,
    ) -> Self {
        let cap = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(cap)),
            max_concurrency: cap,
            max_waiters,
            acquire_timeout,
            waiters: AtomicUsize::new(0),
        }
    }

    /// The configured concurrency cap.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Permits currently available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquire a permit, queueing within the waiter bound. The permit
    /// releases its slot on drop.
    pub async fn acquire(&self) -> ResilienceResult<OwnedSemaphorePermit> {
        // Fast path: a free permit means no queueing at all.
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(permit);
        }

        let waiting = self.waiters.fetch_add(1, Ordering::SeqCst);
        if waiting >= self.max_waiters {
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            return Err(ResilienceError::BulkheadFull {
                max_concurrency: self.max_concurrency,
            });
        }

        let result = tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await;
        self.waiters.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(Ok(permit)) => Ok(permit),
            // The semaphore is never closed.
            Ok(Err(_)) => Err(ResilienceError::BulkheadFull {
                max_concurrency: self.max_concurrency,
            }),
            Err(_) => Err(ResilienceError::timeout(self.acquire_timeout)),
        }
    }
}
