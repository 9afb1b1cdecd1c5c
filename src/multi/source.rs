use std::ops::{Index, IndexMut};
use std::sync::Arc;

use rayon::prelude::*;

use super::{CancelToken, MultiTrackReader};
use crate::sample::{Sample, sample_to_f32};
use crate::stream::SampleReader;

/// A producer of sample blocks driven in steps.
pub trait SampleSource: Send {
    /// Produce the next block of output.
    fn go_on(&mut self);

    /// Returns true once the source will not produce anything new.
    fn done(&self) -> bool;

    /// Stop producing, [`done`](Self::done) returns true afterwards.
    fn cancel(&mut self) {}
}

/// Feeds the samples of a [`SampleReader`] as normalized `f32` blocks.
///
/// Every [`go_on`](SampleSource::go_on) fills one block. The last block is
/// zero-padded and the source is done once the reader reaches eof.
#[derive(Debug)]
pub struct ReaderSource {
    reader: SampleReader,
    raw: Vec<Sample>,
    block: Vec<f32>,
    valid: usize,
    done: bool,
}

impl ReaderSource {
    /// Wrap `reader`, producing blocks of `block_size` values.
    pub fn new(reader: SampleReader, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let done = reader.eof();
        Self {
            reader,
            raw: vec![0; block_size],
            block: vec![0.0; block_size],
            valid: 0,
            done,
        }
    }

    /// The block produced by the last step.
    pub fn block(&self) -> &[f32] {
        &self.block
    }

    /// Number of values in [`block`](Self::block) that came from the track.
    pub const fn valid(&self) -> usize {
        self.valid
    }

    /// The wrapped reader.
    pub const fn reader(&self) -> &SampleReader {
        &self.reader
    }
}

impl SampleSource for ReaderSource {
    fn go_on(&mut self) {
        if self.done {
            return;
        }
        self.valid = self.reader.read(&mut self.raw);
        for (out, &sample) in self.block.iter_mut().zip(&self.raw) {
            *out = sample_to_f32(sample);
        }
        if self.reader.eof() {
            self.done = true;
        }
    }

    fn done(&self) -> bool {
        self.done
    }

    fn cancel(&mut self) {
        self.done = true;
    }
}

/// One [`SampleSource`] per track, advanced together.
pub struct MultiTrackSource<S> {
    sources: Vec<S>,
    cancel: CancelToken,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl<S> std::fmt::Debug for MultiTrackSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiTrackSource")
            .field("tracks", &self.sources.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

impl<S> Default for MultiTrackSource<S> {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            cancel: CancelToken::new(),
            pool: None,
        }
    }
}

impl<S: SampleSource> MultiTrackSource<S> {
    /// Create an empty multi-track source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `tracks` sources with `factory`.
    pub fn with_tracks(tracks: usize, mut factory: impl FnMut(usize) -> S) -> Self {
        Self {
            sources: (0..tracks).map(&mut factory).collect(),
            ..Self::default()
        }
    }

    /// Run steps on `pool` instead of the global rayon pool.
    pub fn with_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Run one step of every source in parallel and wait for all of them.
    ///
    /// Does nothing once cancelled.
    pub fn go_on(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let sources = &mut self.sources;
        let mut step = move || sources.par_iter_mut().for_each(|s| s.go_on());
        match &self.pool {
            Some(pool) => pool.install(step),
            None => step(),
        }
    }

    /// Returns true if every source is done.
    pub fn done(&self) -> bool {
        self.sources.iter().all(|s| s.done())
    }

    /// Cancel all sources.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        for source in &mut self.sources {
            source.cancel();
        }
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of tracks.
    pub fn tracks(&self) -> usize {
        self.sources.len()
    }

    /// Source at position `track`.
    pub fn at(&self, track: usize) -> Option<&S> {
        self.sources.get(track)
    }

    /// Mutable source at position `track`.
    pub fn at_mut(&mut self, track: usize) -> Option<&mut S> {
        self.sources.get_mut(track)
    }

    /// Insert `source` at position `track`, clamped to the number of tracks.
    ///
    /// A source inserted into a cancelled multi-track source is cancelled
    /// too.
    pub fn insert(&mut self, track: usize, mut source: S) {
        if self.cancel.is_cancelled() {
            source.cancel();
        }
        let track = track.min(self.sources.len());
        self.sources.insert(track, source);
    }

    /// Remove all sources.
    pub fn clear(&mut self) {
        self.sources.clear();
    }
}

impl MultiTrackSource<ReaderSource> {
    /// Turn every reader of `reader` into a [`ReaderSource`].
    pub fn from_reader(reader: MultiTrackReader, block_size: usize) -> Self {
        let cancel = reader.cancel_token();
        let sources = reader
            .into_readers()
            .into_iter()
            .map(|r| ReaderSource::new(r, block_size))
            .collect();
        Self {
            sources,
            cancel,
            pool: None,
        }
    }
}

impl<S> Index<usize> for MultiTrackSource<S> {
    type Output = S;

    fn index(&self, track: usize) -> &S {
        &self.sources[track]
    }
}

impl<S> IndexMut<usize> for MultiTrackSource<S> {
    fn index_mut(&mut self, track: usize) -> &mut S {
        &mut self.sources[track]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Direction;
    use crate::{InsertMode, SAMPLE_MAX, Signal, StorageConfig};

    #[derive(Debug, Default)]
    struct Counter {
        steps: usize,
        limit: usize,
        cancelled: bool,
    }

    impl SampleSource for Counter {
        fn go_on(&mut self) {
            self.steps += 1;
        }

        fn done(&self) -> bool {
            self.cancelled || self.steps >= self.limit
        }

        fn cancel(&mut self) {
            self.cancelled = true;
        }
    }

    #[test]
    fn test_go_on_steps_every_source() {
        let mut source = MultiTrackSource::with_tracks(3, |i| Counter {
            limit: i + 1,
            ..Counter::default()
        });
        assert_eq!(source.tracks(), 3);
        source.go_on();
        assert!(!source.done());
        source.go_on();
        source.go_on();
        assert!(source.done());
        assert_eq!(source[1].steps, 3);
    }

    #[test]
    fn test_cancel_stops_stepping() {
        let mut source = MultiTrackSource::with_tracks(2, |_| Counter {
            limit: 100,
            ..Counter::default()
        });
        source.cancel();
        source.go_on();
        assert!(source.done());
        assert_eq!(source.at(0).map(|c| c.steps), Some(0));

        source.insert(5, Counter::default());
        assert_eq!(source.tracks(), 3);
        assert!(source[2].cancelled);
        source.clear();
        assert_eq!(source.tracks(), 0);
    }

    #[test]
    fn test_dedicated_pool() {
        let config = StorageConfig {
            worker_threads: Some(2),
            ..StorageConfig::default()
        };
        let pool = config.build_pool().unwrap().map(Arc::new).unwrap();
        let mut source = MultiTrackSource::with_tracks(4, |_| Counter {
            limit: 1,
            ..Counter::default()
        })
        .with_pool(pool);
        source.go_on();
        assert!(source.done());
    }

    #[test]
    fn test_reader_source_blocks() {
        let signal = Signal::new(StorageConfig::default()).unwrap();
        for _ in 0..2 {
            let track = signal.append_track(0).unwrap();
            let mut writer = track.open_sample_writer(InsertMode::Append, 0, 0).unwrap();
            writer.write(&[SAMPLE_MAX, 0, SAMPLE_MAX, 0, SAMPLE_MAX]).unwrap();
        }
        let reader = MultiTrackReader::new(&signal, &[0, 1], 0, 4, Direction::Forward).unwrap();
        let mut source = MultiTrackSource::from_reader(reader, 3);

        source.go_on();
        assert!(!source.done());
        assert_eq!(source[0].valid(), 3);
        assert!(source[0].block()[0] > 0.99);

        source.go_on();
        assert!(source.done());
        assert_eq!(source[1].valid(), 2);
        assert_eq!(source[1].block()[2], 0.0);
    }
}
