use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Maximum number of nodes linked at the same time.
pub const LINK_CONCURRENCY: usize = 16;

/// Bounds how many link jobs of one install run are in flight.
///
/// Clones share the same permits. Each install run creates its own limiter.
#[derive(Debug, Clone)]
pub struct LinkLimiter {
    permits: Arc<Semaphore>,
}

impl Default for LinkLimiter {
    fn default() -> Self {
        Self::new(LINK_CONCURRENCY)
    }
}

impl LinkLimiter {
    /// A limiter admitting `permits` concurrent jobs (at least one).
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(permits.max(1))),
        }
    }

    /// Run `job` once a permit is free; the permit is held until it finishes.
    pub async fn run<F: Future>(&self, job: F) -> F::Output {
        // The semaphore is never closed, so acquiring only fails on misuse
        let _permit = self.permits.acquire().await.ok();
        job.await
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
