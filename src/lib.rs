// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)] // Duplicate match arms

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::large_stack_arrays)] // Helps avoid stack overflows
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::let_unit_value)] // Avoids binding `()` to variables
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![cfg_attr(not(test), warn(clippy::unwrap_used))] // Avoids using `unwrap()`

// Maintainability
#![warn(clippy::missing_panics_doc)] // Docs for functions that might panic
#![warn(clippy::missing_const_for_fn)] // Suggests making eligible functions `const`
#![allow(clippy::too_many_arguments)]
#![deny(missing_docs)] // Documentation is a must for release

//! # sample_tracks
//!
//! Track-based sample storage with range-locked concurrent readers and
//! writers.
//!
//! ## Overview
//!
//! A [`Signal`] holds an ordered list of [`Track`]s, one per channel. Each
//! track stores its samples in stripes, contiguous runs that can be split,
//! grown and removed without copying the rest of the track. Samples are
//! 24-bit values carried in an `i32`.
//!
//! All access goes through streams. A [`SampleReader`] or [`SampleWriter`]
//! holds a [`SampleLock`] on its range for its whole lifetime:
//!
//! - any number of readers may share a range,
//! - writers may work next to readers, but not next to other writers on an
//!   overlapping range,
//! - deleting a range waits until it is the only holder.
//!
//! ## Quick Start
//!
//! ```rust
//! use sample_tracks::{InsertMode, Signal, StorageConfig};
//!
//! let signal = Signal::new(StorageConfig::default()).unwrap();
//! let track = signal.append_track(0).unwrap();
//!
//! let mut writer = track.open_sample_writer(InsertMode::Append, 0, 0).unwrap();
//! writer.write(&[10, 20, 30, 40, 50]).unwrap();
//! drop(writer); // flushes and releases the lock
//!
//! signal.delete_range(0, 1, 2).unwrap();
//! assert_eq!(track.length(), 3);
//!
//! let mut reader = signal.open_sample_reader(0, 0, 2).unwrap();
//! let mut buffer = [0; 3];
//! reader.read(&mut buffer);
//! assert_eq!(buffer, [10, 40, 50]);
//! ```
//!
//! ## Working on several tracks
//!
//! A [`MultiTrackReader`] opens one reader per track over a common range and
//! reads blocks of all of them in parallel. Operations built on top of it,
//! like [`ops::reverse`], poll a [`CancelToken`] between blocks and report
//! their progress to a [`ProgressReporter`].
//!
//! ```rust
//! use sample_tracks::{CancelToken, NullProgressReporter, Signal, StorageConfig, ops};
//!
//! let signal = Signal::new(StorageConfig::default()).unwrap();
//! let track = signal.append_track(0).unwrap();
//! let mut writer = track
//!     .open_sample_writer(sample_tracks::InsertMode::Append, 0, 0)
//!     .unwrap();
//! writer.write(&[1, 2, 3]).unwrap();
//! drop(writer);
//!
//! ops::reverse_selection(&signal, &NullProgressReporter, &CancelToken::new()).unwrap();
//! let mut reader = track.open_sample_reader(0, 2).unwrap();
//! let mut buffer = [0; 3];
//! reader.read(&mut buffer);
//! assert_eq!(buffer, [3, 2, 1]);
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns a [`StorageResult`]. A failed operation
//! leaves the track unchanged.
//!
//! ```rust
//! use sample_tracks::{StorageError, Signal, StorageConfig};
//!
//! let signal = Signal::new(StorageConfig::default()).unwrap();
//! match signal.track(3) {
//!     Err(StorageError::NoSuchTrack { index, tracks }) => {
//!         assert_eq!((index, tracks), (3, 0));
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```
//!
//! ## Features
//!
//! - `progress-tracking`: [`ProgressBarReporter`], a terminal progress bar
//!   using `indicatif`.

mod config;
mod error;
mod events;
mod lock;
mod memory;
mod sample;
mod signal;
mod stream;
mod stripe;
mod track;

pub mod multi;
pub mod ops;
pub mod progress;

#[cfg(test)]
mod tests;

pub use crate::config::StorageConfig;
pub use crate::error::{StorageError, StorageResult};
pub use crate::events::{ChangeKind, ListenerId, StripeChange, TrackEvent, TrackListener};
pub use crate::lock::{LockKind, LockRange, SampleLock};
pub use crate::memory::{Handle, MemoryManager, MemoryStats, SampleBuffer};
pub use crate::multi::{
    CancelToken, MultiTrackReader, MultiTrackSource, ReaderSource, SampleSource,
};
#[cfg(feature = "progress-tracking")]
pub use crate::progress::ProgressBarReporter;
pub use crate::progress::{
    CallbackProgressReporter, ChannelProgressReporter, LogProgressReporter,
    NullProgressReporter, ProgressInfo, ProgressReporter,
};
pub use crate::sample::{
    SAMPLE_BITS, SAMPLE_MAX, SAMPLE_MIN, Sample, bytes_of, f32_to_sample, sample_to_f32,
};
pub use crate::signal::Signal;
pub use crate::stream::{Direction, ProgressHook, SampleReader, SampleWriter};
pub use crate::stripe::Stripe;
pub use crate::track::{InsertMode, Track};
