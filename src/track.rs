//! Tracks, one channel of audio made of an ordered set of stripes.
//!
//! A [`Track`] is a cheap, cloneable handle. All clones refer to the same
//! stripes, and readers and writers keep a clone so the track stays alive as
//! long as any stream on it is open.
//!
//! Data access goes through streams:
//!
//! ```
//! use sample_tracks::{InsertMode, MemoryManager, StorageConfig, Track};
//!
//! let config = StorageConfig::default();
//! let track = Track::new(&MemoryManager::unlimited(), &config);
//!
//! let mut writer = track.open_sample_writer(InsertMode::Append, 0, 0).unwrap();
//! writer.write(&[1, 2, 3, 4]).unwrap();
//! drop(writer);
//!
//! let mut reader = track.open_sample_reader(1, 2).unwrap();
//! let mut buffer = [0; 2];
//! assert_eq!(reader.read(&mut buffer), 2);
//! assert_eq!(buffer, [2, 3]);
//! assert!(reader.eof());
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::events::{ChangeKind, ListenerId, TrackEvent, TrackListener};
use crate::lock::{LockKind, LockRange, LockTable};
use crate::memory::MemoryManager;
use crate::sample::Sample;
use crate::stream::{Direction, SampleReader, SampleWriter};
use crate::stripe::{Stripe, StripeRef};
use crate::{StorageConfig, StorageError, StorageResult};

/// How a [`SampleWriter`] places its samples in the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertMode {
    /// Insert at a position, moving everything after it to the right.
    Insert,
    /// Append at the end of the track.
    Append,
    /// Overwrite existing samples in place.
    Overwrite,
}

struct TrackInner {
    stripes: RwLock<Vec<StripeRef>>,
    locks: Arc<LockTable>,
    selected: AtomicBool,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn TrackListener>)>>,
    next_listener: AtomicU64,
    memory: Arc<MemoryManager>,
    block_size: usize,
}

/// One channel of audio.
#[derive(Clone)]
pub struct Track {
    inner: Arc<TrackInner>,
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("length", &self.length())
            .field("stripes", &self.stripe_count())
            .field("selected", &self.is_selected())
            .finish()
    }
}

impl Track {
    /// Create an empty track.
    pub fn new(memory: &Arc<MemoryManager>, config: &StorageConfig) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                stripes: RwLock::new(Vec::new()),
                locks: LockTable::new(),
                selected: AtomicBool::new(true),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                memory: Arc::clone(memory),
                block_size: config.block_size.max(1),
            }),
        }
    }

    /// Create a track holding `length` zero samples in one stripe.
    pub fn with_length(
        memory: &Arc<MemoryManager>,
        config: &StorageConfig,
        length: usize,
    ) -> StorageResult<Self> {
        let track = Self::new(memory, config);
        if length > 0 {
            track.append_stripe(length)?;
        }
        Ok(track)
    }

    /// Number of samples in the track.
    pub fn length(&self) -> usize {
        Self::total_length(&self.inner.stripes.read())
    }

    /// Number of stripes, including empty ones not yet filled.
    pub fn stripe_count(&self) -> usize {
        self.inner.stripes.read().len()
    }

    /// Start and length of every stripe, in track order.
    pub fn stripe_layout(&self) -> Vec<(usize, usize)> {
        self.relayout();
        self.inner
            .stripes
            .read()
            .iter()
            .map(|s| {
                let s = s.lock();
                (s.start(), s.length())
            })
            .collect()
    }

    /// Returns true if the track takes part in operations on the selection.
    pub fn is_selected(&self) -> bool {
        self.inner.selected.load(Ordering::Relaxed)
    }

    /// Include or exclude the track from operations on the selection.
    pub fn select(&self, selected: bool) {
        self.inner.selected.store(selected, Ordering::Relaxed);
    }

    /// Returns true if both handles refer to the same track.
    pub fn same_track(&self, other: &Track) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a listener for change notifications.
    pub fn subscribe(&self, listener: Arc<dyn TrackListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.write().push((id, listener));
        id
    }

    /// Remove a listener, returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Append a new stripe of `length` zero samples at the end of the track.
    pub fn append_stripe(&self, length: usize) -> StorageResult<()> {
        let event = {
            let mut stripes = self.inner.stripes.write();
            let start = Self::total_length(&stripes);
            let mut stripe = Stripe::new(&self.inner.memory, start)?;
            let change = stripe.resize(length)?;
            stripes.push(Arc::new(Mutex::new(stripe)));
            tracing::debug!(start, length, "appended stripe");
            change.map(|c| c.to_track(start))
        };
        if let Some(event) = event {
            self.notify(event);
        }
        Ok(())
    }

    /// Open a reader for the samples `[left, right]`.
    ///
    /// `right` is clipped to the end of the track. A range that starts
    /// beyond the end yields a reader that is immediately at eof.
    pub fn open_sample_reader(&self, left: usize, right: usize) -> StorageResult<SampleReader> {
        self.open_sample_reader_with(Direction::Forward, left, right)
    }

    /// Open a reader for the samples `[left, right]` in the given direction.
    pub fn open_sample_reader_with(
        &self,
        direction: Direction,
        left: usize,
        right: usize,
    ) -> StorageResult<SampleReader> {
        if right < left {
            return Err(StorageError::invalid_range(left, right, "right < left"));
        }
        let lock = self.inner.locks.acquire(
            LockRange::new(left, (right - left).saturating_add(1)),
            LockKind::ReadShared,
        );

        let length = self.length();
        let count = if left >= length {
            0
        } else {
            right.min(length - 1) - left + 1
        };

        Ok(SampleReader::new(
            self.clone(),
            lock,
            direction,
            left,
            count,
            self.inner.block_size,
        ))
    }

    /// Open a writer.
    ///
    /// * [`InsertMode::Insert`] inserts at `left`, `right` is ignored.
    /// * [`InsertMode::Append`] appends at the end, `left` and `right` are
    ///   ignored.
    /// * [`InsertMode::Overwrite`] overwrites `[left, right]`. A `right` of
    ///   zero or equal to `left` means "up to the end of the track".
    pub fn open_sample_writer(
        &self,
        mode: InsertMode,
        left: usize,
        right: usize,
    ) -> StorageResult<SampleWriter> {
        match mode {
            InsertMode::Insert => self.open_insert_writer(left),
            InsertMode::Append => self.open_append_writer(),
            InsertMode::Overwrite => self.open_overwrite_writer(left, right),
        }
    }

    /// Delete `length` samples starting at `offset`.
    ///
    /// A range reaching beyond the end of the track is clipped. Stripes that
    /// become empty are removed. One aggregate notification is sent after the
    /// range lock has been released.
    pub fn delete_range(&self, offset: usize, length: usize) -> StorageResult<()> {
        if length == 0 {
            return Ok(());
        }
        let total = self.length();
        if offset >= total {
            return Err(StorageError::invalid_range(
                offset,
                offset.saturating_add(length - 1),
                format!("track has only {total} samples"),
            ));
        }
        let length = length.min(total - offset);
        {
            let _lock = self
                .inner
                .locks
                .acquire(LockRange::new(offset, length), LockKind::WriteExclusive);
            let mut stripes = self.inner.stripes.write();
            Self::relayout_locked(&stripes);

            let end = offset + length;
            for index in (0..stripes.len()).rev() {
                let now_empty = {
                    let mut stripe = stripes[index].lock();
                    let (st, en) = (stripe.start(), stripe.end());
                    if en > offset && st < end {
                        let from = offset.max(st);
                        let to = end.min(en);
                        stripe.delete_range(from - st, to - from);
                    }
                    stripe.is_empty()
                };
                if now_empty {
                    stripes.remove(index);
                }
            }
            Self::relayout_locked(&stripes);
            tracing::debug!(offset, length, stripes = stripes.len(), "deleted range");
        }
        self.notify(TrackEvent::new(ChangeKind::Deleted, offset, length));
        Ok(())
    }

    fn open_insert_writer(&self, left: usize) -> StorageResult<SampleWriter> {
        let lock = self
            .inner
            .locks
            .acquire(LockRange::new(left, 0), LockKind::WriteShared);

        let mut stripes = self.inner.stripes.write();
        Self::relayout_locked(&stripes);
        let length = Self::total_length(&stripes);
        if left > length {
            return Err(StorageError::invalid_range(
                left,
                left,
                format!("insert position beyond end of track ({length})"),
            ));
        }

        let mut target = None;
        let mut before = None;
        for (index, stripe) in stripes.iter().enumerate() {
            let s = stripe.lock();
            if s.is_empty() {
                continue;
            }
            if left >= s.end() {
                before = Some(index);
            }
            if s.contains(left) {
                target = Some(index);
                break;
            }
        }

        // inserting right behind a stripe just extends that stripe
        if let Some(b) = before {
            if stripes[b].lock().end() == left {
                let stripe = Arc::clone(&stripes[b]);
                drop(stripes);
                tracing::trace!(left, "insert appends to existing stripe");
                return Ok(SampleWriter::new(
                    self.clone(),
                    vec![stripe],
                    lock,
                    InsertMode::Append,
                    left,
                    None,
                    self.inner.block_size,
                ));
            }
        }

        // allocate before touching the layout so a failure changes nothing
        let stripe = Arc::new(Mutex::new(Stripe::new(&self.inner.memory, left)?));
        let mut index = before.map_or(0, |b| b + 1);
        if let Some(t) = target {
            let mut s = stripes[t].lock();
            let at = left - s.start();
            if at > 0 {
                // split so that a stripe boundary exists at `left`
                let tail = s.split_off(at)?;
                drop(s);
                stripes.insert(t + 1, Arc::new(Mutex::new(tail)));
                index = t + 1;
            }
        }
        stripes.insert(index, Arc::clone(&stripe));
        tracing::debug!(left, index, "inserted new stripe");
        drop(stripes);

        Ok(SampleWriter::new(
            self.clone(),
            vec![stripe],
            lock,
            InsertMode::Insert,
            left,
            None,
            self.inner.block_size,
        ))
    }

    fn open_append_writer(&self) -> StorageResult<SampleWriter> {
        let end = self.length();
        let lock = self
            .inner
            .locks
            .acquire(LockRange::new(end, 0), LockKind::WriteShared);

        let mut stripes = self.inner.stripes.write();
        let start = Self::total_length(&stripes);
        let stripe = Arc::new(Mutex::new(Stripe::new(&self.inner.memory, start)?));
        stripes.push(Arc::clone(&stripe));
        drop(stripes);
        tracing::debug!(start, "opened append writer");

        Ok(SampleWriter::new(
            self.clone(),
            vec![stripe],
            lock,
            InsertMode::Append,
            start,
            None,
            self.inner.block_size,
        ))
    }

    fn open_overwrite_writer(&self, left: usize, right: usize) -> StorageResult<SampleWriter> {
        let right = if right == 0 || right == left {
            usize::MAX
        } else {
            right
        };
        self.open_overwrite_range(left, right)
    }

    /// Open an overwrite writer for exactly `[left, right]`, clipped to the
    /// end of the track. Unlike [`open_sample_writer`](Self::open_sample_writer)
    /// a single-sample range stays a single sample.
    pub(crate) fn open_overwrite_range(
        &self,
        left: usize,
        right: usize,
    ) -> StorageResult<SampleWriter> {
        let length = self.length();
        if left >= length {
            return Err(StorageError::invalid_range(
                left,
                right,
                format!("track has only {length} samples"),
            ));
        }
        if right < left {
            return Err(StorageError::invalid_range(left, right, "right < left"));
        }
        let right = right.min(length - 1);

        let lock = self
            .inner
            .locks
            .acquire(LockRange::new(left, right - left + 1), LockKind::WriteShared);
        let stripes = self.inner.stripes.read();
        let covered = Self::overlapping(&stripes, left, right + 1);
        drop(stripes);

        Ok(SampleWriter::new(
            self.clone(),
            covered,
            lock,
            InsertMode::Overwrite,
            left,
            Some(right),
            self.inner.block_size,
        ))
    }

    pub(crate) fn lock_table(&self) -> &Arc<LockTable> {
        &self.inner.locks
    }

    /// Recompute stripe starts after stripes have grown.
    pub(crate) fn relayout(&self) {
        Self::relayout_locked(&self.inner.stripes.write());
    }

    /// Append `samples` to `stripe` and move every later stripe right.
    ///
    /// Both happen under the stripe list lock, so readers never see the
    /// grown stripe overlapping its successor.
    pub(crate) fn grow_stripe(
        &self,
        stripe: &StripeRef,
        samples: &[Sample],
    ) -> StorageResult<Option<TrackEvent>> {
        let stripes = self.inner.stripes.write();
        let change = stripe.lock().append(samples)?;
        Self::relayout_locked(&stripes);
        let start = stripe.lock().start();
        Ok(change.map(|c| c.to_track(start)))
    }

    /// Copy the current content starting at the absolute `pos` into
    /// `buffer`, returns the number of contiguous samples copied.
    pub(crate) fn read_at(&self, mut pos: usize, buffer: &mut [Sample]) -> usize {
        let stripes = self.inner.stripes.read();
        let mut copied = 0;
        for stripe in stripes.iter() {
            if copied == buffer.len() {
                break;
            }
            let s = stripe.lock();
            if s.is_empty() || s.end() <= pos {
                continue;
            }
            if s.start() > pos {
                break;
            }
            let n = s.read(pos - s.start(), &mut buffer[copied..]);
            copied += n;
            pos += n;
        }
        copied
    }

    /// Drop `stripe` from the track if nothing was ever written into it.
    pub(crate) fn discard_if_empty(&self, stripe: &StripeRef) {
        let mut stripes = self.inner.stripes.write();
        if stripe.lock().is_empty() {
            stripes.retain(|s| !Arc::ptr_eq(s, stripe));
        }
    }

    pub(crate) fn notify(&self, event: TrackEvent) {
        let listeners: Vec<Arc<dyn TrackListener>> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener.track_changed(&event);
        }
    }

    fn total_length(stripes: &[StripeRef]) -> usize {
        stripes.iter().map(|s| s.lock().length()).sum()
    }

    fn relayout_locked(stripes: &[StripeRef]) {
        let mut start = 0;
        for stripe in stripes {
            let mut s = stripe.lock();
            s.set_start(start);
            start += s.length();
        }
    }

    // non-empty stripes overlapping [left, end), in ascending order
    fn overlapping(stripes: &[StripeRef], left: usize, end: usize) -> Vec<StripeRef> {
        stripes
            .iter()
            .filter(|stripe| {
                let s = stripe.lock();
                !s.is_empty() && s.start() < end && s.end() > left
            })
            .map(Arc::clone)
            .collect()
    }
}
