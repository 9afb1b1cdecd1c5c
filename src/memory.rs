//! Memory management for sample buffers.
//!
//! The [`MemoryManager`] is an explicit service object, created once by the
//! owner of the storage and handed to every component that allocates sample
//! memory. It enforces a physical limit and keeps statistics. Each allocation
//! is returned as a [`SampleBuffer`] that releases its accounting on drop.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::sample::{Sample, bytes_of};
use crate::{StorageConfig, StorageError, StorageResult};

/// Numeric identity of an allocated buffer, used for diagnostics only.
pub type Handle = u64;

/// Snapshot of the memory manager's statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Number of live buffers.
    pub handles: usize,
    /// Bytes currently accounted to live buffers.
    pub bytes: usize,
    /// Limit in bytes, zero if unlimited.
    pub limit: usize,
    /// Total number of allocations so far.
    pub allocs: u64,
    /// Total number of frees so far.
    pub frees: u64,
}

/// Allocator service for sample memory.
pub struct MemoryManager {
    limit: usize,
    undo_limit_mb: AtomicUsize,
    in_use: AtomicUsize,
    handles: AtomicUsize,
    next_handle: AtomicU64,
    allocs: AtomicU64,
    frees: AtomicU64,
}

impl fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryManager")
            .field("stats", &self.stats())
            .field("undo_limit_mb", &self.undo_limit())
            .finish()
    }
}

impl MemoryManager {
    /// Create a memory manager with the limits from `config`.
    pub fn new(config: &StorageConfig) -> Arc<Self> {
        Arc::new(Self {
            limit: config.memory_limit_bytes(),
            undo_limit_mb: AtomicUsize::new(config.undo_limit_mb),
            in_use: AtomicUsize::new(0),
            handles: AtomicUsize::new(0),
            next_handle: AtomicU64::new(1),
            allocs: AtomicU64::new(0),
            frees: AtomicU64::new(0),
        })
    }

    /// Create a memory manager without a physical limit.
    pub fn unlimited() -> Arc<Self> {
        Self::new(&StorageConfig::default())
    }

    /// Allocate a zero-filled buffer of `samples` samples.
    pub fn allocate(self: &Arc<Self>, samples: usize) -> StorageResult<SampleBuffer> {
        let bytes = bytes_of(samples);
        self.reserve(bytes)?;

        let mut data = Vec::new();
        if let Err(e) = data.try_reserve_exact(samples) {
            self.release(bytes);
            tracing::warn!(samples, error = %e, "system allocator refused sample buffer");
            return Err(self.out_of_memory(bytes));
        }
        data.resize(samples, 0);

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.fetch_add(1, Ordering::Relaxed);
        self.allocs.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(handle, samples, "allocated sample buffer");

        Ok(SampleBuffer {
            manager: Arc::clone(self),
            handle,
            accounted: bytes,
            data,
        })
    }

    /// Returns the statistics of this manager.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            handles: self.handles.load(Ordering::Relaxed),
            bytes: self.in_use.load(Ordering::Relaxed),
            limit: self.limit,
            allocs: self.allocs.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
        }
    }

    /// Sets the limit of memory that can be used for undo/redo in megabytes.
    pub fn set_undo_limit(&self, mb: usize) {
        self.undo_limit_mb.store(mb, Ordering::Relaxed);
    }

    /// Returns the limit of memory that can be used for undo/redo in megabytes.
    pub fn undo_limit(&self) -> usize {
        self.undo_limit_mb.load(Ordering::Relaxed)
    }

    fn reserve(&self, bytes: usize) -> StorageResult<()> {
        if self.limit == 0 {
            self.in_use.fetch_add(bytes, Ordering::Relaxed);
            return Ok(());
        }
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= self.limit)
            })
            .map(|_| ())
            .map_err(|_| self.out_of_memory(bytes))
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn out_of_memory(&self, requested: usize) -> StorageError {
        StorageError::OutOfMemory {
            requested,
            in_use: self.in_use.load(Ordering::Relaxed),
            limit: self.limit,
        }
    }
}

/// An owned run of samples whose size is accounted by a [`MemoryManager`].
///
/// All operations that grow the buffer go through the manager first and
/// leave the buffer unchanged if the manager refuses.
pub struct SampleBuffer {
    manager: Arc<MemoryManager>,
    handle: Handle,
    accounted: usize,
    data: Vec<Sample>,
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("handle", &self.handle)
            .field("len", &self.data.len())
            .finish()
    }
}

impl SampleBuffer {
    /// Handle of this buffer.
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The samples as a slice.
    pub fn as_slice(&self) -> &[Sample] {
        &self.data
    }

    /// The samples as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.data
    }

    /// Resize to `samples`, new samples are zero.
    pub fn resize(&mut self, samples: usize) -> StorageResult<()> {
        let old = self.data.len();
        if samples > old {
            self.grow_by(samples - old)?;
        }
        self.data.resize(samples, 0);
        self.sync_accounting();
        Ok(())
    }

    /// Append `samples` at the end.
    pub fn extend_from_slice(&mut self, samples: &[Sample]) -> StorageResult<()> {
        self.grow_by(samples.len())?;
        self.data.extend_from_slice(samples);
        self.sync_accounting();
        Ok(())
    }

    /// Remove the samples in `range`, moving later samples to the left.
    ///
    /// # Panics
    /// Panics if `range` is out of bounds.
    pub fn remove_range(&mut self, range: Range<usize>) {
        self.data.drain(range);
        self.sync_accounting();
    }

    /// Split the buffer at `at`, returning a new buffer with the tail.
    pub fn split_off(&mut self, at: usize) -> StorageResult<SampleBuffer> {
        let at = at.min(self.data.len());
        let mut tail = self.manager.allocate(0)?;
        tail.grow_by(self.data.len() - at)?;
        tail.data.extend_from_slice(&self.data[at..]);
        tail.sync_accounting();
        self.data.truncate(at);
        self.sync_accounting();
        Ok(tail)
    }

    // Reserves both accounting and real capacity for `additional` samples.
    fn grow_by(&mut self, additional: usize) -> StorageResult<()> {
        let needed = self.data.len().saturating_add(additional);
        if bytes_of(needed) <= self.accounted {
            return Ok(());
        }
        let extra = bytes_of(needed) - self.accounted;
        self.manager.reserve(extra)?;
        if let Err(e) = self.data.try_reserve(additional) {
            self.manager.release(extra);
            tracing::warn!(handle = self.handle, additional, error = %e, "growing sample buffer failed");
            return Err(self.manager.out_of_memory(extra));
        }
        self.accounted += extra;
        Ok(())
    }

    // Accounting follows the length, not the capacity of the vector.
    fn sync_accounting(&mut self) {
        let wanted = bytes_of(self.data.len());
        if wanted < self.accounted {
            self.manager.release(self.accounted - wanted);
            self.accounted = wanted;
        }
    }
}

impl Drop for SampleBuffer {
    fn drop(&mut self) {
        self.manager.release(self.accounted);
        self.manager.handles.fetch_sub(1, Ordering::Relaxed);
        self.manager.frees.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(handle = self.handle, "freed sample buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(mb: usize) -> Arc<MemoryManager> {
        MemoryManager::new(&StorageConfig {
            memory_limit_mb: mb,
            ..StorageConfig::default()
        })
    }

    #[test]
    fn test_allocate_and_free_updates_stats() {
        let mm = MemoryManager::unlimited();
        let buffer = mm.allocate(100).unwrap();
        assert_eq!(buffer.len(), 100);
        assert!(buffer.as_slice().iter().all(|&s| s == 0));

        let stats = mm.stats();
        assert_eq!(stats.handles, 1);
        assert_eq!(stats.bytes, 400);
        assert_eq!(stats.allocs, 1);

        drop(buffer);
        let stats = mm.stats();
        assert_eq!(stats.handles, 0);
        assert_eq!(stats.bytes, 0);
        assert_eq!(stats.frees, 1);
    }

    #[test]
    fn test_limit_is_enforced() {
        let mm = limited(1);
        let samples_per_mb = 1024 * 1024 / 4;
        let _a = mm.allocate(samples_per_mb / 2).unwrap();
        let err = mm.allocate(samples_per_mb).unwrap_err();
        assert!(err.is_out_of_memory());
        // a failed request does not leak accounting
        assert_eq!(mm.stats().bytes, bytes_of(samples_per_mb / 2));
    }

    #[test]
    fn test_failed_growth_leaves_buffer_unchanged() {
        let mm = limited(1);
        let samples_per_mb = 1024 * 1024 / 4;
        let mut buffer = mm.allocate(10).unwrap();
        buffer.as_mut_slice()[0] = 7;
        assert!(buffer.resize(samples_per_mb + 1).is_err());
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.as_slice()[0], 7);
        assert_eq!(mm.stats().bytes, 40);
    }

    #[test]
    fn test_extend_remove_and_split() {
        let mm = MemoryManager::unlimited();
        let mut buffer = mm.allocate(0).unwrap();
        buffer.extend_from_slice(&[1, 2, 3, 4, 5, 6]).unwrap();
        buffer.remove_range(1..3);
        assert_eq!(buffer.as_slice(), &[1, 4, 5, 6]);
        assert_eq!(mm.stats().bytes, 16);

        let tail = buffer.split_off(1).unwrap();
        assert_eq!(buffer.as_slice(), &[1]);
        assert_eq!(tail.as_slice(), &[4, 5, 6]);
        assert_eq!(mm.stats().bytes, 16);
        assert_eq!(mm.stats().handles, 2);
    }

    #[test]
    fn test_undo_limit() {
        let mm = MemoryManager::unlimited();
        assert_eq!(mm.undo_limit(), StorageConfig::default().undo_limit_mb);
        mm.set_undo_limit(16);
        assert_eq!(mm.undo_limit(), 16);
    }
}
