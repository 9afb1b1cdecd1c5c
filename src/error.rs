//! Error types and result utilities for track storage operations.

use thiserror::Error;

/// Convenience type alias for results that may contain a [`StorageError`].
pub type StorageResult<T> = Result<T, StorageError>;

/// Error types that can occur while storing, locking or streaming samples.
///
/// Lock contention is deliberately absent: a conflicting range lock blocks
/// until the holder goes away, it never fails. Reaching the end of a stream
/// is not an error either, readers expose it through `eof()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A sample buffer could not be allocated or grown.
    ///
    /// Either the configured physical limit of the memory manager would be
    /// exceeded or the system allocator refused the request. The operation
    /// did not happen and the storage is unchanged.
    #[error("Out of memory: requested {requested} bytes ({in_use} in use, limit {limit})")]
    OutOfMemory {
        /// Number of bytes that were requested in addition.
        requested: usize,
        /// Number of bytes in use when the request failed.
        in_use: usize,
        /// Limit in bytes, zero if unlimited.
        limit: usize,
    },

    /// A sample range that cannot be clipped into something sensible.
    ///
    /// This happens when `right < left`, or when a range starts beyond the
    /// end of a track for an operation that needs existing samples.
    #[error("Invalid range [{left}, {right}]: {reason}")]
    InvalidRange {
        /// First sample of the requested range.
        left: usize,
        /// Last sample of the requested range.
        right: usize,
        /// Why the range was rejected.
        reason: String,
    },

    /// Error that occurs when invalid parameters are provided to an operation.
    #[error("Invalid parameter error: {0}")]
    InvalidParameter(String),

    /// A track index that does not refer to an existing track.
    #[error("No such track: index {index}, signal has {tracks} tracks")]
    NoSuchTrack {
        /// The requested index.
        index: usize,
        /// Number of tracks at the time of the request.
        tracks: usize,
    },

    /// The worker pool for multi-track operations could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl StorageError {
    /// Create a new invalid range error.
    pub fn invalid_range(left: usize, right: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            left,
            right,
            reason: reason.into(),
        }
    }

    /// Create a new invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Returns true if the error is an allocation failure.
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}
