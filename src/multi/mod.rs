//! Coordinated access to a set of tracks over a common range.
//!
//! A [`MultiTrackReader`] bundles one [`SampleReader`](crate::SampleReader)
//! per track and aggregates their state. A [`MultiTrackSource`] drives one
//! [`SampleSource`] per track and runs a block of work on all of them in
//! parallel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod reader;
mod source;

pub use reader::MultiTrackReader;
pub use source::{MultiTrackSource, ReaderSource, SampleSource};

/// Cooperative cancellation flag shared between an operation and its caller.
///
/// Clones share the same flag. Per-track loops poll it between blocks, an
/// in-flight block is always completed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
