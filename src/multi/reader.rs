use std::ops::{Index, IndexMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use super::CancelToken;
use crate::progress::{ProgressInfo, ProgressReporter};
use crate::sample::Sample;
use crate::stream::{Direction, SampleReader};
use crate::{Signal, StorageError, StorageResult};

/// One [`SampleReader`] per track over a common range.
///
/// Position `i` of the reader corresponds to the `i`-th entry of the track
/// list it was built from, not to the track index within the signal.
pub struct MultiTrackReader {
    tracks: Vec<usize>,
    readers: Vec<SampleReader>,
    direction: Direction,
    first: usize,
    last: usize,
    cancel: CancelToken,
    reporter: Option<Arc<dyn ProgressReporter>>,
    started: Instant,
}

impl std::fmt::Debug for MultiTrackReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiTrackReader")
            .field("tracks", &self.tracks)
            .field("direction", &self.direction)
            .field("first", &self.first)
            .field("last", &self.last)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl MultiTrackReader {
    /// Open readers for `[first, last]` on the given tracks of `signal`.
    ///
    /// Fails without keeping any lock if one of the tracks does not exist.
    pub fn new(
        signal: &Signal,
        tracks: &[usize],
        first: usize,
        last: usize,
        direction: Direction,
    ) -> StorageResult<Self> {
        if last < first {
            return Err(StorageError::invalid_range(first, last, "last < first"));
        }
        let readers = tracks
            .iter()
            .map(|&track| signal.open_sample_reader_with(track, direction, first, last))
            .collect::<StorageResult<Vec<_>>>()?;
        tracing::debug!(?tracks, first, last, ?direction, "opened multi-track reader");

        Ok(Self {
            tracks: tracks.to_vec(),
            readers,
            direction,
            first,
            last,
            cancel: CancelToken::new(),
            reporter: None,
            started: Instant::now(),
        })
    }

    /// Track indices within the signal, in reader order.
    pub fn track_indices(&self) -> &[usize] {
        &self.tracks
    }

    /// Number of tracks.
    pub fn tracks(&self) -> usize {
        self.readers.len()
    }

    /// Direction of all readers.
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// First sample of the requested range.
    pub const fn first(&self) -> usize {
        self.first
    }

    /// Last sample of the requested range.
    pub const fn last(&self) -> usize {
        self.last
    }

    /// Reader at position `index`, `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&SampleReader> {
        self.readers.get(index)
    }

    /// Mutable access to all readers, for driving them in parallel.
    pub fn readers_mut(&mut self) -> &mut [SampleReader] {
        &mut self.readers
    }

    /// Take the readers out, ending the aggregation.
    ///
    /// Readers keep reporting to an attached progress reporter.
    pub fn into_readers(mut self) -> Vec<SampleReader> {
        std::mem::take(&mut self.readers)
    }

    /// Returns true if any of the readers is at eof.
    pub fn eof(&self) -> bool {
        self.readers.iter().any(SampleReader::eof)
    }

    /// Request cancellation of loops working on this reader.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A token sharing the cancellation flag of this reader.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Use `token` as the cancellation flag of this reader.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    /// Samples consumed so far, summed over all tracks.
    pub fn proceeded(&self) -> u64 {
        self.readers.iter().map(|r| r.consumed() as u64).sum()
    }

    /// Total samples all readers will deliver.
    pub fn total(&self) -> u64 {
        self.readers.iter().map(|r| r.len() as u64).sum()
    }

    /// Send progress updates to `reporter` whenever any of the readers
    /// advances, however it is driven.
    pub fn set_progress_reporter(&mut self, reporter: Arc<dyn ProgressReporter>) {
        let total = self.total();
        reporter.start("read", total);
        let proceeded = Arc::new(AtomicU64::new(self.proceeded()));
        let started = self.started;
        for reader in &mut self.readers {
            let reporter = Arc::clone(&reporter);
            let proceeded = Arc::clone(&proceeded);
            reader.set_progress_hook(Arc::new(move |n: usize| {
                let n = n as u64;
                let processed = proceeded.fetch_add(n, Ordering::Relaxed) + n;
                reporter.report_progress(&ProgressInfo {
                    operation: "read".to_string(),
                    processed,
                    total,
                    elapsed: started.elapsed(),
                });
            }));
        }
        self.reporter = Some(reporter);
    }

    /// Report the aggregated progress, if a reporter is attached.
    pub fn report_progress(&self) {
        if let Some(reporter) = &self.reporter {
            reporter.report_progress(&ProgressInfo {
                operation: "read".to_string(),
                processed: self.proceeded(),
                total: self.total(),
                elapsed: self.started.elapsed(),
            });
        }
    }

    /// Read one block per track in parallel.
    ///
    /// `blocks` must hold one buffer per track. Returns the number of
    /// samples delivered per track; the rest of each buffer is zeroed.
    pub fn read_blocks(&mut self, blocks: &mut [Vec<Sample>]) -> StorageResult<Vec<usize>> {
        if blocks.len() != self.readers.len() {
            return Err(StorageError::invalid_parameter(format!(
                "expected {} block buffers, got {}",
                self.readers.len(),
                blocks.len()
            )));
        }
        let counts = self
            .readers
            .par_iter_mut()
            .zip(blocks.par_iter_mut())
            .map(|(reader, block)| reader.read(block))
            .collect();
        Ok(counts)
    }
}

impl Index<usize> for MultiTrackReader {
    type Output = SampleReader;

    fn index(&self, index: usize) -> &SampleReader {
        &self.readers[index]
    }
}

impl IndexMut<usize> for MultiTrackReader {
    fn index_mut(&mut self, index: usize) -> &mut SampleReader {
        &mut self.readers[index]
    }
}

impl Drop for MultiTrackReader {
    fn drop(&mut self) {
        if let Some(reporter) = &self.reporter {
            reporter.finish(self.started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ChannelProgressReporter;
    use crate::{InsertMode, StorageConfig};
    use crossbeam::channel::unbounded;

    fn signal_with(lengths: &[usize]) -> Signal {
        let signal = Signal::new(StorageConfig::default()).unwrap();
        for &length in lengths {
            let track = signal.append_track(0).unwrap();
            let mut writer = track.open_sample_writer(InsertMode::Append, 0, 0).unwrap();
            let data: Vec<Sample> = (0..length as Sample).collect();
            writer.write(&data).unwrap();
        }
        signal
    }

    #[test]
    fn test_positions_follow_track_list() {
        let signal = signal_with(&[10, 20, 30]);
        let reader = MultiTrackReader::new(&signal, &[2, 0], 0, 14, Direction::Forward).unwrap();
        assert_eq!(reader.tracks(), 2);
        assert_eq!(reader.track_indices(), &[2, 0]);
        assert_eq!(reader[0].len(), 15);
        assert_eq!(reader[1].len(), 10);
        assert!(reader.get(2).is_none());
    }

    #[test]
    fn test_unknown_track_is_rejected() {
        let signal = signal_with(&[10]);
        let err = MultiTrackReader::new(&signal, &[0, 3], 0, 5, Direction::Forward).unwrap_err();
        assert!(matches!(err, StorageError::NoSuchTrack { index: 3, .. }));
        // the reader opened for track 0 was dropped again
        assert!(signal.track(0).unwrap().lock_table().holders() == 0);
    }

    #[test]
    fn test_read_blocks_and_progress() {
        let signal = signal_with(&[8, 8]);
        let mut reader = MultiTrackReader::new(&signal, &[0, 1], 0, 7, Direction::Reverse).unwrap();
        let (tx, rx) = unbounded();
        reader.set_progress_reporter(Arc::new(ChannelProgressReporter::new(tx)));

        let mut blocks = vec![vec![0; 3]; 2];
        assert_eq!(reader.read_blocks(&mut blocks).unwrap(), vec![3, 3]);
        assert_eq!(blocks[0], vec![7, 6, 5]);
        assert_eq!(blocks[1], vec![7, 6, 5]);
        assert_eq!(reader.proceeded(), 6);
        // one update per reader, in whatever order the readers finished
        let updates: Vec<u64> = rx.try_iter().map(|p| p.processed).collect();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates.iter().max(), Some(&6));

        assert!(reader.read_blocks(&mut blocks[..1]).is_err());
    }

    #[test]
    fn test_cancel_is_shared() {
        let signal = signal_with(&[4]);
        let reader = MultiTrackReader::new(&signal, &[0], 0, 3, Direction::Forward).unwrap();
        let token = reader.cancel_token();
        assert!(!reader.is_cancelled());
        token.cancel();
        assert!(reader.is_cancelled());
    }

    #[test]
    fn test_progress_through_indexing() {
        let signal = signal_with(&[5, 5]);
        let mut reader = MultiTrackReader::new(&signal, &[0, 1], 0, 4, Direction::Forward).unwrap();
        let (tx, rx) = unbounded();
        reader.set_progress_reporter(Arc::new(ChannelProgressReporter::new(tx)));

        let mut buffer = [0; 5];
        for index in 0..reader.tracks() {
            reader[index].read(&mut buffer);
        }
        let updates: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            updates.iter().map(|p| p.processed).collect::<Vec<_>>(),
            vec![5, 10]
        );
        assert!(updates.iter().all(|p| p.total == 10));
        assert_eq!(reader.proceeded(), 10);
    }

    #[test]
    fn test_open_ended_range_and_into_readers() {
        let signal = signal_with(&[6, 4]);
        let reader =
            MultiTrackReader::new(&signal, &[0, 1], 0, usize::MAX, Direction::Forward).unwrap();
        assert_eq!(reader.total(), 10);
        let readers = reader.into_readers();
        assert_eq!(readers.len(), 2);
        assert_eq!(readers[1].last(), 3);
    }
}
