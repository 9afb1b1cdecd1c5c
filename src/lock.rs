//! Range-scoped reader/writer locks over a track's sample space.
//!
//! Every [`Track`] owns a table of currently held range locks. A
//! [`SampleLock`] is entered into that table on construction, blocking until
//! no conflicting holder overlaps its range, and removed again on drop.
//!
//! The table is a plain list scanned linearly. The number of simultaneous
//! holders per track is small (one per open stream), so an interval tree
//! would not pay off.
//!
//! # Compatibility
//!
//! For two locks on overlapping ranges:
//!
//! | held \ requested | ReadShared | WriteShared | WriteExclusive |
//! |------------------|------------|-------------|----------------|
//! | ReadShared       | yes        | yes         | no             |
//! | WriteShared      | yes        | no          | no             |
//! | WriteExclusive   | no         | no          | no             |
//!
//! Locks on disjoint ranges never conflict.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::Track;

/// Kind of a [`SampleLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Shared read access.
    ReadShared,
    /// Write access that tolerates concurrent readers.
    WriteShared,
    /// Exclusive access, used for structural changes like deletion.
    WriteExclusive,
}

impl LockKind {
    /// Returns true if locks of these kinds may not overlap.
    pub const fn conflicts_with(self, other: LockKind) -> bool {
        !matches!(
            (self, other),
            (LockKind::ReadShared, LockKind::ReadShared)
                | (LockKind::ReadShared, LockKind::WriteShared)
                | (LockKind::WriteShared, LockKind::ReadShared)
        )
    }
}

/// A range of samples covered by a lock.
///
/// A length of zero denotes a range that is open towards the end of the
/// track, so data appended while the lock is held is still covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRange {
    /// First sample of the range.
    pub offset: usize,
    /// Number of samples, zero for "up to the end of the track".
    pub length: usize,
}

impl LockRange {
    /// Create a new range.
    pub const fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Returns true if the range has no upper bound.
    pub const fn is_open(&self) -> bool {
        self.length == 0
    }

    // exclusive end, None if open
    const fn end(&self) -> Option<usize> {
        if self.is_open() {
            None
        } else {
            Some(self.offset.saturating_add(self.length))
        }
    }

    /// Returns true if both ranges share at least one sample position.
    pub fn overlaps(&self, other: &LockRange) -> bool {
        let self_below = self.end().is_some_and(|end| end <= other.offset);
        let other_below = other.end().is_some_and(|end| end <= self.offset);
        !self_below && !other_below
    }
}

#[derive(Debug)]
struct LockRecord {
    id: u64,
    range: LockRange,
    kind: LockKind,
}

#[derive(Debug, Default)]
struct LockState {
    next_id: u64,
    holders: Vec<LockRecord>,
}

impl LockState {
    fn is_free(&self, range: &LockRange, kind: LockKind) -> bool {
        !self
            .holders
            .iter()
            .any(|h| h.range.overlaps(range) && h.kind.conflicts_with(kind))
    }

    fn enter(&mut self, range: LockRange, kind: LockKind) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.holders.push(LockRecord { id, range, kind });
        id
    }
}

/// Table of the range locks currently held on one track.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    state: Mutex<LockState>,
    released: Condvar,
}

impl LockTable {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn acquire(self: &Arc<Self>, range: LockRange, kind: LockKind) -> SampleLock {
        let mut state = self.state.lock();
        let mut waited = false;
        while !state.is_free(&range, kind) {
            if !waited {
                tracing::trace!(?range, ?kind, "waiting for range lock");
                waited = true;
            }
            self.released.wait(&mut state);
        }
        let id = state.enter(range, kind);
        tracing::trace!(id, ?range, ?kind, "range lock acquired");
        SampleLock {
            table: Arc::clone(self),
            id,
            range,
            kind,
        }
    }

    pub(crate) fn try_acquire(
        self: &Arc<Self>,
        range: LockRange,
        kind: LockKind,
    ) -> Option<SampleLock> {
        let mut state = self.state.lock();
        if !state.is_free(&range, kind) {
            return None;
        }
        let id = state.enter(range, kind);
        Some(SampleLock {
            table: Arc::clone(self),
            id,
            range,
            kind,
        })
    }

    pub(crate) fn holders(&self) -> usize {
        self.state.lock().holders.len()
    }

    fn release(&self, id: u64) {
        let mut state = self.state.lock();
        state.holders.retain(|h| h.id != id);
        drop(state);
        self.released.notify_all();
        tracing::trace!(id, "range lock released");
    }
}

/// A held lock over a range of samples of one track.
///
/// The lock is released when this object is dropped.
pub struct SampleLock {
    table: Arc<LockTable>,
    id: u64,
    range: LockRange,
    kind: LockKind,
}

impl fmt::Debug for SampleLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleLock")
            .field("id", &self.id)
            .field("range", &self.range)
            .field("kind", &self.kind)
            .finish()
    }
}

impl SampleLock {
    /// Lock `length` samples of `track` starting at `offset`.
    ///
    /// Blocks until the range is compatible with all overlapping holders.
    /// A `length` of zero locks everything from `offset` to the end of the
    /// track, including data appended later.
    pub fn new(track: &Track, offset: usize, length: usize, kind: LockKind) -> Self {
        track
            .lock_table()
            .acquire(LockRange::new(offset, length), kind)
    }

    /// Like [`SampleLock::new`], but returns `None` instead of blocking.
    pub fn try_new(track: &Track, offset: usize, length: usize, kind: LockKind) -> Option<Self> {
        track
            .lock_table()
            .try_acquire(LockRange::new(offset, length), kind)
    }

    /// First locked sample.
    pub const fn offset(&self) -> usize {
        self.range.offset
    }

    /// Number of locked samples, zero if open-ended.
    pub const fn length(&self) -> usize {
        self.range.length
    }

    /// The locked range.
    pub const fn range(&self) -> LockRange {
        self.range
    }

    /// Kind of the lock.
    pub const fn kind(&self) -> LockKind {
        self.kind
    }
}

impl Drop for SampleLock {
    fn drop(&mut self) {
        self.table.release(self.id);
    }
}
