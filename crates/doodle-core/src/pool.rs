//! Bounded pool for blocking collaborator calls.
//!
//! Classifier inference and canvas archiving are CPU or disk bound, so
//! they run on Tokio's blocking threads instead of the coordination
//! tasks. A semaphore caps how many run at once; a hung call holds only
//! its own slot.

use std::sync::Arc;

use tokio::sync::Semaphore;

/// Errors from running a job on the pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool was closed before a slot became free.
    #[error("worker pool closed: {source}")]
    Closed {
        /// The underlying acquire error.
        #[from]
        source: tokio::sync::AcquireError,
    },

    /// The job panicked or was cancelled.
    #[error("worker job failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}

/// A cloneable handle to a bounded blocking worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool that runs at most `size` jobs at a time.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum number of concurrent jobs.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking thread once a slot is free.
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await?;
        Ok(output)
    }
}
