//! Stripes, the unit of physical sample storage within a track.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{ChangeKind, StripeChange};
use crate::memory::{MemoryManager, SampleBuffer};
use crate::sample::Sample;
use crate::StorageResult;

/// Shared reference to a stripe, as held by a track and by open streams.
pub(crate) type StripeRef = Arc<Mutex<Stripe>>;

/// A contiguous run of samples at a fixed position within a track.
///
/// A stripe does no locking on its own, the owning [`Track`](crate::Track)
/// serializes access through range locks. Every mutation returns a
/// [`StripeChange`] describing what happened in stripe-local coordinates.
#[derive(Debug)]
pub struct Stripe {
    start: usize,
    samples: SampleBuffer,
}

impl Stripe {
    /// Create an empty stripe starting at `start`.
    pub fn new(memory: &Arc<MemoryManager>, start: usize) -> StorageResult<Self> {
        Ok(Self {
            start,
            samples: memory.allocate(0)?,
        })
    }

    pub(crate) const fn from_buffer(start: usize, samples: SampleBuffer) -> Self {
        Self { start, samples }
    }

    /// First sample of this stripe within the track.
    pub const fn start(&self) -> usize {
        self.start
    }

    pub(crate) fn set_start(&mut self, start: usize) {
        self.start = start;
    }

    /// Number of samples in this stripe.
    pub fn length(&self) -> usize {
        self.samples.len()
    }

    /// One past the last sample of this stripe within the track.
    pub fn end(&self) -> usize {
        self.start + self.length()
    }

    /// Returns true if the stripe holds no samples and can be removed.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns true if the absolute position `pos` lies in this stripe.
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end()
    }

    /// The samples of this stripe.
    pub fn samples(&self) -> &[Sample] {
        self.samples.as_slice()
    }

    /// Grow or shrink the stripe to `length` samples.
    ///
    /// New samples are zero. Returns `None` if the length did not change.
    pub fn resize(&mut self, length: usize) -> StorageResult<Option<StripeChange>> {
        let old = self.length();
        self.samples.resize(length)?;
        Ok(match length.cmp(&old) {
            std::cmp::Ordering::Greater => Some(StripeChange::new(
                ChangeKind::Inserted,
                old,
                length - old,
            )),
            std::cmp::Ordering::Less => Some(StripeChange::new(
                ChangeKind::Deleted,
                length,
                old - length,
            )),
            std::cmp::Ordering::Equal => None,
        })
    }

    /// Append `samples` at the end of the stripe.
    pub fn append(&mut self, samples: &[Sample]) -> StorageResult<Option<StripeChange>> {
        if samples.is_empty() {
            return Ok(None);
        }
        let offset = self.length();
        self.samples.extend_from_slice(samples)?;
        Ok(Some(StripeChange::new(
            ChangeKind::Inserted,
            offset,
            samples.len(),
        )))
    }

    /// Delete `length` samples starting at the stripe-local `offset`.
    ///
    /// The range is clipped to the stripe. Returns `None` if nothing was
    /// deleted.
    pub fn delete_range(&mut self, offset: usize, length: usize) -> Option<StripeChange> {
        let len = self.length();
        if offset >= len || length == 0 {
            return None;
        }
        let end = offset.saturating_add(length).min(len);
        self.samples.remove_range(offset..end);
        Some(StripeChange::new(ChangeKind::Deleted, offset, end - offset))
    }

    /// Copy samples from the stripe-local `offset` into `buffer`.
    ///
    /// Returns the number of samples copied, which is less than the buffer
    /// length if the stripe ends first.
    pub fn read(&self, offset: usize, buffer: &mut [Sample]) -> usize {
        let data = self.samples.as_slice();
        if offset >= data.len() {
            return 0;
        }
        let count = buffer.len().min(data.len() - offset);
        buffer[..count].copy_from_slice(&data[offset..offset + count]);
        count
    }

    /// Overwrite samples at the stripe-local `offset` with `samples`.
    ///
    /// Writes are clipped to the current stripe length, the stripe never
    /// grows through this call. Returns the change and the number of samples
    /// written.
    pub fn write(&mut self, offset: usize, samples: &[Sample]) -> (Option<StripeChange>, usize) {
        let data = self.samples.as_mut_slice();
        if offset >= data.len() || samples.is_empty() {
            return (None, 0);
        }
        let count = samples.len().min(data.len() - offset);
        data[offset..offset + count].copy_from_slice(&samples[..count]);
        (
            Some(StripeChange::new(ChangeKind::Modified, offset, count)),
            count,
        )
    }

    /// Split the stripe at the stripe-local `offset`.
    ///
    /// The stripe keeps `[0, offset)`, the returned stripe holds the rest and
    /// starts at `start + offset`.
    pub fn split_off(&mut self, offset: usize) -> StorageResult<Stripe> {
        let offset = offset.min(self.length());
        let tail = self.samples.split_off(offset)?;
        Ok(Stripe::from_buffer(self.start + offset, tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe_with(start: usize, samples: &[Sample]) -> Stripe {
        let mm = MemoryManager::unlimited();
        let mut stripe = Stripe::new(&mm, start).unwrap();
        stripe.append(samples).unwrap();
        stripe
    }

    #[test]
    fn test_resize_reports_delta() {
        let mm = MemoryManager::unlimited();
        let mut stripe = Stripe::new(&mm, 10).unwrap();
        let grown = stripe.resize(8).unwrap().unwrap();
        assert_eq!(grown, StripeChange::new(ChangeKind::Inserted, 0, 8));
        assert!(stripe.samples().iter().all(|&s| s == 0));

        let shrunk = stripe.resize(3).unwrap().unwrap();
        assert_eq!(shrunk, StripeChange::new(ChangeKind::Deleted, 3, 5));
        assert_eq!(stripe.end(), 13);
        assert!(stripe.resize(3).unwrap().is_none());
    }

    #[test]
    fn test_delete_range_is_clipped() {
        let mut stripe = stripe_with(0, &[0, 1, 2, 3, 4, 5]);
        let change = stripe.delete_range(4, 100).unwrap();
        assert_eq!(change, StripeChange::new(ChangeKind::Deleted, 4, 2));
        assert_eq!(stripe.samples(), &[0, 1, 2, 3]);

        stripe.delete_range(1, 2);
        assert_eq!(stripe.samples(), &[0, 3]);
        assert!(stripe.delete_range(2, 1).is_none());
    }

    #[test]
    fn test_delete_everything_makes_stripe_removable() {
        let mut stripe = stripe_with(0, &[1, 2, 3]);
        stripe.delete_range(0, 3);
        assert!(stripe.is_empty());
    }

    #[test]
    fn test_read_stops_at_stripe_end() {
        let stripe = stripe_with(100, &[1, 2, 3, 4]);
        let mut buffer = [0; 3];
        assert_eq!(stripe.read(2, &mut buffer), 2);
        assert_eq!(&buffer[..2], &[3, 4]);
        assert_eq!(stripe.read(4, &mut buffer), 0);
        assert!(stripe.contains(103));
        assert!(!stripe.contains(104));
    }

    #[test]
    fn test_write_overwrites_in_place() {
        let mut stripe = stripe_with(0, &[0; 4]);
        let (change, written) = stripe.write(2, &[7, 8, 9]);
        assert_eq!(written, 2);
        assert_eq!(change, Some(StripeChange::new(ChangeKind::Modified, 2, 2)));
        assert_eq!(stripe.samples(), &[0, 0, 7, 8]);
    }

    #[test]
    fn test_split_off() {
        let mut stripe = stripe_with(10, &[1, 2, 3, 4, 5]);
        let tail = stripe.split_off(2).unwrap();
        assert_eq!(stripe.samples(), &[1, 2]);
        assert_eq!(tail.start(), 12);
        assert_eq!(tail.samples(), &[3, 4, 5]);
    }
}
