use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use rayon::ThreadPool;
use tracing::debug;
use crate::core::config::ExecutorConfig;
use crate::core::error::Result;

/// Process-wide pool that runs independent sub-range sorts.
///
/// Started once at startup and shared by every collection through
/// `CollectionEnv`. After `shutdown` the pool is gone and `run` executes the
/// job on the calling thread, so sorts keep working sequentially.
pub struct SortExecutor {
    pool: RwLock<Option<ThreadPool>>,
    workers: usize,
    dispatched: AtomicUsize,
}

impl SortExecutor {
    pub fn start(config: ExecutorConfig) -> Result<Arc<Self>> {
        let workers = config.workers.max(1);
        let prefix = config.thread_name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .build()?;
        debug!(workers, "sort executor started");

        Ok(Arc::new(SortExecutor {
            pool: RwLock::new(Some(pool)),
            workers,
            dispatched: AtomicUsize::new(0),
        }))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_running(&self) -> bool {
        self.pool.read().is_some()
    }

    /// Number of sub-range jobs handed to workers so far
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub(crate) fn note_dispatch(&self, jobs: usize) {
        self.dispatched.fetch_add(jobs, Ordering::Relaxed);
    }

    /// Runs `job` inside the pool and blocks until it returns.
    /// Returns `None` when the pool has been shut down.
    pub fn run<R, F>(&self, job: F) -> Option<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        let pool = self.pool.read();
        pool.as_ref().map(|p| p.install(job))
    }

    /// Waits for running jobs, then drops the worker threads
    pub fn shutdown(&self) {
        let pool = self.pool.write().take();
        if pool.is_some() {
            debug!(workers = self.workers, "sort executor shut down");
        }
    }
}

impl std::fmt::Debug for SortExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortExecutor")
            .field("workers", &self.workers)
            .field("running", &self.is_running())
            .finish()
    }
}
