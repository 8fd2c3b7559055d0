//! Bounded-concurrency batch executor.
//!
//! A [`WorkerPool`] is a semaphore of `size` permits. Each task holds one
//! permit while it runs, so at most `size` tasks of all batches sharing the
//! pool are in flight at once. Clones share capacity.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use fanout_core::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Worker capacity shared by the tasks of one or more batches.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: NonZeroUsize,
}

impl WorkerPool {
    /// Default number of concurrently running tasks.
    pub const DEFAULT_SIZE: usize = 1000;

    /// Create a pool allowing `size` concurrent tasks.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPoolSize` if `size` is 0 or above the
    /// semaphore limit.
    pub fn new(size: usize) -> Result<Self, Error> {
        let size = NonZeroUsize::new(size).ok_or(Error::InvalidPoolSize(size))?;
        if size.get() > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidPoolSize(size.get()));
        }
        Ok(Self::with_size(size))
    }

    pub(crate) fn with_size(size: NonZeroUsize) -> Self {
        Self { permits: Arc::new(Semaphore::new(size.get())), size }
    }

    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Permits not currently held by a running task.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one task per item and wait for all of them.
    ///
    /// Results are returned in item order regardless of completion order.
    /// A slot is `None` only if its task panicked; one task's failure never
    /// stops the others.
    pub async fn run_batch<I, R, F, Fut>(&self, items: Vec<I>, mut task: F) -> Vec<Option<R>>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
        let mut join_set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!("worker pool closed, skipping task {index}: {e}");
                    continue;
                }
            };
            let work = task(item);

            join_set.spawn(async move {
                // NOTE: Hold permit for task duration to enforce concurrency limit
                let _permit = permit;
                (index, work.await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, value)) => results[index] = Some(value),
                Err(e) => tracing::warn!("batch task did not complete: {e}"),
            }
        }

        results
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::with_size(NonZeroUsize::new(Self::DEFAULT_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}
