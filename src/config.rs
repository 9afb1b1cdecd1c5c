//! Configuration of the storage engine.

use serde::{Deserialize, Serialize};

use crate::{StorageError, StorageResult};

/// Configuration for a [`Signal`](crate::Signal) and the services it owns.
///
/// All fields have defaults, so a partial configuration can be deserialized:
///
/// ```
/// use sample_tracks::StorageConfig;
///
/// let config = StorageConfig {
///     block_size: 1024,
///     ..StorageConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Number of samples buffered by readers and writers, also the unit of
    /// work of multi-track operations.
    pub block_size: usize,

    /// Limit for sample memory in megabytes, zero means unlimited.
    pub memory_limit_mb: usize,

    /// Limit for memory used by undo data in megabytes.
    pub undo_limit_mb: usize,

    /// Number of worker threads for multi-track operations.
    ///
    /// `None` uses the global rayon pool.
    pub worker_threads: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            block_size: 16384,
            memory_limit_mb: 0,
            undo_limit_mb: 256,
            worker_threads: None,
        }
    }
}

impl StorageConfig {
    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> StorageResult<()> {
        if self.block_size == 0 {
            return Err(StorageError::invalid_parameter("block_size must be > 0"));
        }
        if self.worker_threads == Some(0) {
            return Err(StorageError::invalid_parameter(
                "worker_threads must be > 0 if given",
            ));
        }
        Ok(())
    }

    /// Memory limit in bytes, zero if unlimited.
    pub const fn memory_limit_bytes(&self) -> usize {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }

    /// Number of worker threads that multi-track operations will use.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get)
    }

    /// Build a dedicated worker pool if `worker_threads` is set.
    pub(crate) fn build_pool(&self) -> StorageResult<Option<rayon::ThreadPool>> {
        let Some(threads) = self.worker_threads else {
            return Ok(None);
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sample-tracks-{i}"))
            .build()
            .map(Some)
            .map_err(|e| StorageError::ThreadPool(format!("Thread pool creation failed: {e}")))
    }
}
