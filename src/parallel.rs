//! Worker pool configuration
//!
//! External tool invocations and index-map conversions run on a dedicated Rayon
//! thread pool whose size bounds the number of simultaneous child processes.

use crate::errors::{MosaicError, Result};
use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Configuration for the bounded worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: usize,
}

impl ParallelConfig {
    /// Create a new parallel configuration; zero is bumped to one worker
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// One worker per physical core, each child process being single threaded
    #[must_use]
    pub fn physical_cores() -> Self {
        Self::new(num_cpus::get_physical())
    }

    /// Build a thread pool with exactly `num_threads` workers.
    ///
    /// A private pool is used instead of the global one so several pools with
    /// different sizes can coexist in one process.
    ///
    /// # Errors
    ///
    /// Returns [`MosaicError::ThreadPoolError`] if the pool cannot be created.
    pub fn build_pool(&self, name: &str) -> Result<ThreadPool> {
        let prefix = name.to_string();
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| {
                MosaicError::ThreadPoolError(format!(
                    "Failed to initialize {} pool with {} threads: {}",
                    name, self.num_threads, e
                ))
            })?;
        info!("Running {} with {} workers", name, self.num_threads);
        Ok(pool)
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self::physical_cores()
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub available_cores: usize,
    pub physical_cores: usize,
}

/// Get information about the host's cores
#[must_use]
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        available_cores: num_cpus::get(),
        physical_cores: num_cpus::get_physical(),
    }
}
