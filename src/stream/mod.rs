//! Sequential cursors over a locked range of a track.
//!
//! - [`SampleReader`] reads samples forward or backward and signals the end
//!   of its range through [`SampleReader::eof`].
//! - [`SampleWriter`] inserts, appends or overwrites samples through an
//!   internal block buffer.
//!
//! Both hold a [`SampleLock`](crate::SampleLock) for their whole lifetime
//! and release it when dropped. Both report how far they got through an
//! optional [`ProgressHook`].

use std::sync::Arc;

mod reader;
mod writer;

pub use reader::{Direction, SampleReader};
pub use writer::SampleWriter;

/// Callback receiving the number of samples a cursor just moved forward.
///
/// Readers call it after every read, writers after every flush. It runs on
/// the thread driving the cursor.
pub type ProgressHook = Arc<dyn Fn(usize) + Send + Sync>;
