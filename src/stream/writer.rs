use std::fmt;

use super::ProgressHook;
use crate::events::{ChangeKind, TrackEvent};
use crate::lock::SampleLock;
use crate::sample::Sample;
use crate::stripe::StripeRef;
use crate::{InsertMode, StorageResult, Track};

/// Writes samples into a locked range of a track.
///
/// Samples are collected in a block buffer and transferred into the track
/// on [`flush`](Self::flush), when the buffer is full, and when the writer
/// is dropped.
///
/// In [`InsertMode::Insert`] and [`InsertMode::Append`] the writer owns a
/// single stripe that grows with every flush. In [`InsertMode::Overwrite`]
/// it replaces existing samples and silently drops everything beyond the
/// end of its range.
pub struct SampleWriter {
    track: Track,
    stripes: Vec<StripeRef>,
    mode: InsertMode,
    first: usize,
    last: Option<usize>,
    written: usize,
    buffer: Vec<Sample>,
    block_size: usize,
    progress: Option<ProgressHook>,
    lock: SampleLock,
}

impl fmt::Debug for SampleWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleWriter")
            .field("mode", &self.mode)
            .field("first", &self.first)
            .field("last", &self.last)
            .field("written", &self.written)
            .field("buffered", &self.buffer.len())
            .field("lock", &self.lock)
            .finish()
    }
}

impl SampleWriter {
    pub(crate) fn new(
        track: Track,
        stripes: Vec<StripeRef>,
        lock: SampleLock,
        mode: InsertMode,
        first: usize,
        last: Option<usize>,
        block_size: usize,
    ) -> Self {
        Self {
            track,
            stripes,
            mode,
            first,
            last,
            written: 0,
            buffer: Vec::with_capacity(block_size),
            block_size,
            progress: None,
            lock,
        }
    }

    /// Call `hook` with the number of samples transferred by every flush.
    pub fn set_progress_hook(&mut self, hook: ProgressHook) {
        self.progress = Some(hook);
    }

    /// The track this writer writes into.
    pub const fn track(&self) -> &Track {
        &self.track
    }

    /// How this writer places its samples.
    pub const fn mode(&self) -> InsertMode {
        self.mode
    }

    /// First sample position of this writer.
    pub const fn first(&self) -> usize {
        self.first
    }

    /// Last writable sample for overwrite writers, `None` if unbounded.
    pub const fn last(&self) -> Option<usize> {
        self.last
    }

    /// Position of the next sample to be written.
    pub fn position(&self) -> usize {
        self.first + self.written + self.buffer.len()
    }

    /// Number of samples accepted so far, including buffered ones.
    pub fn written(&self) -> usize {
        self.written + self.buffer.len()
    }

    /// Returns true if an overwrite writer has reached the end of its range.
    pub fn is_full(&self) -> bool {
        self.room() == Some(0)
    }

    /// Write `samples`, returns how many were accepted.
    ///
    /// Only overwrite writers accept fewer samples than given, when the end
    /// of their range is reached.
    pub fn write(&mut self, samples: &[Sample]) -> StorageResult<usize> {
        let accepted = match self.room() {
            Some(room) => samples.len().min(room),
            None => samples.len(),
        };
        let mut rest = &samples[..accepted];
        while !rest.is_empty() {
            let n = rest.len().min(self.block_size - self.buffer.len());
            self.buffer.extend_from_slice(&rest[..n]);
            rest = &rest[n..];
            if self.buffer.len() >= self.block_size {
                self.flush()?;
            }
        }
        Ok(accepted)
    }

    /// Write a single sample, returns false if it was dropped.
    pub fn write_sample(&mut self, sample: Sample) -> StorageResult<bool> {
        Ok(self.write(&[sample])? == 1)
    }

    /// Transfer all buffered samples into the track.
    ///
    /// On failure the buffered samples stay in the buffer and the track is
    /// unchanged.
    pub fn flush(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let event = match self.mode {
            InsertMode::Insert | InsertMode::Append => self.flush_growing()?,
            InsertMode::Overwrite => self.flush_overwrite(),
        };
        let flushed = self.buffer.len();
        self.written += flushed;
        self.buffer.clear();
        if let Some(event) = event {
            self.track.notify(event);
        }
        if let Some(hook) = &self.progress {
            hook(flushed);
        }
        Ok(())
    }

    fn room(&self) -> Option<usize> {
        self.last
            .map(|last| (last + 1).saturating_sub(self.position()))
    }

    fn flush_growing(&mut self) -> StorageResult<Option<TrackEvent>> {
        self.track.grow_stripe(&self.stripes[0], &self.buffer)
    }

    fn flush_overwrite(&mut self) -> Option<TrackEvent> {
        let offset = self.first + self.written;
        let mut pos = offset;
        let mut rest = self.buffer.as_slice();
        for stripe in &self.stripes {
            if rest.is_empty() {
                break;
            }
            let mut s = stripe.lock();
            if !s.contains(pos) {
                continue;
            }
            let local = pos - s.start();
            let (_, n) = s.write(local, rest);
            pos += n;
            rest = &rest[n..];
        }
        if !rest.is_empty() {
            tracing::debug!(
                dropped = rest.len(),
                pos,
                "overwrite reached end of track content"
            );
        }
        (pos > offset).then(|| TrackEvent::new(ChangeKind::Modified, offset, pos - offset))
    }
}

impl Drop for SampleWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(
                error = %e,
                lost = self.buffer.len(),
                "flushing sample writer on drop failed"
            );
        }
        if matches!(self.mode, InsertMode::Insert | InsertMode::Append) {
            self.track.discard_if_empty(&self.stripes[0]);
        }
    }
}
