use std::sync::Arc;
use std::time::Duration;
use crate::core::error::{Error, ErrorKind, Result};
use crate::memory::oracle::{MemoryOracle, Unbounded};
use crate::parallel::executor::SortExecutor;

/// Tuning knobs shared by every collection built from one environment
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub grow_factor: f64,               // Capacity multiplier on growth (> 1)
    pub isort_limit: usize,             // Ranges below this use insertion sort
    pub split_threshold: usize,         // Sub-range size allowing a second fan-out level
    pub parallel_threshold: usize,      // Range size dispatched to sort workers
    pub resort_limit: usize,            // Unsorted tail length that forces a resort on lookup
    pub dedup_budget: Duration,         // Time box for uniq passes
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            grow_factor: 1.4,
            isort_limit: 20,
            split_threshold: 4_000,
            parallel_threshold: 8_000,
            resort_limit: 400,
            dedup_budget: Duration::from_secs(60),
        }
    }
}

impl CollectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.grow_factor.is_finite() || self.grow_factor <= 1.0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("grow_factor must be a finite value > 1, got {}", self.grow_factor),
            ));
        }
        if self.isort_limit < 2 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("isort_limit must be at least 2, got {}", self.isort_limit),
            ));
        }
        if self.split_threshold > self.parallel_threshold {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "split_threshold must not exceed parallel_threshold".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sort worker pool settings
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub workers: usize,
    pub thread_name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            workers: num_cpus::get(),
            thread_name_prefix: "rowdex-sort".to_string(),
        }
    }
}

/// Collaborators injected into collections: tuning, memory oracle, sort pool
#[derive(Clone)]
pub struct CollectionEnv {
    pub config: CollectionConfig,
    pub memory: Arc<dyn MemoryOracle>,
    pub executor: Option<Arc<SortExecutor>>,
}

impl CollectionEnv {
    pub fn new(
        config: CollectionConfig,
        memory: Arc<dyn MemoryOracle>,
        executor: Option<Arc<SortExecutor>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(CollectionEnv { config, memory, executor })
    }

    pub fn with_executor(mut self, executor: Arc<SortExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryOracle>) -> Self {
        self.memory = memory;
        self
    }
}

impl Default for CollectionEnv {
    fn default() -> Self {
        CollectionEnv {
            config: CollectionConfig::default(),
            memory: Arc::new(Unbounded),
            executor: None,
        }
    }
}

impl std::fmt::Debug for CollectionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEnv")
            .field("config", &self.config)
            .field("executor", &self.executor.as_ref().map(|e| e.workers()))
            .finish()
    }
}
