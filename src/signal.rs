//! A signal, the ordered set of tracks of one piece of audio.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::memory::MemoryManager;
use crate::stream::{Direction, SampleReader, SampleWriter};
use crate::{InsertMode, StorageConfig, StorageError, StorageResult, Track};

/// An ordered list of tracks sharing one [`MemoryManager`].
///
/// Tracks are addressed by their index. Inserting or deleting a track shifts
/// the indices of all tracks behind it.
pub struct Signal {
    config: StorageConfig,
    memory: Arc<MemoryManager>,
    tracks: RwLock<Vec<Track>>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("tracks", &self.tracks())
            .field("length", &self.length())
            .field("memory", &self.memory)
            .finish()
    }
}

impl Signal {
    /// Create an empty signal with its own memory manager.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let memory = MemoryManager::new(&config);
        Self::with_memory(config, memory)
    }

    /// Create an empty signal allocating from `memory`.
    pub fn with_memory(config: StorageConfig, memory: Arc<MemoryManager>) -> StorageResult<Self> {
        config.validate()?;
        let pool = config.build_pool()?.map(Arc::new);
        Ok(Self {
            config,
            memory,
            tracks: RwLock::new(Vec::new()),
            pool,
        })
    }

    /// The configuration this signal was created with.
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The memory manager all tracks allocate from.
    pub const fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    /// Dedicated worker pool, if the configuration asked for one.
    pub fn pool(&self) -> Option<&Arc<rayon::ThreadPool>> {
        self.pool.as_ref()
    }

    /// Number of tracks.
    pub fn tracks(&self) -> usize {
        self.tracks.read().len()
    }

    /// Length of the longest track.
    pub fn length(&self) -> usize {
        self.tracks
            .read()
            .iter()
            .map(Track::length)
            .max()
            .unwrap_or(0)
    }

    /// Handle of the track at `index`.
    pub fn track(&self, index: usize) -> StorageResult<Track> {
        let tracks = self.tracks.read();
        tracks.get(index).cloned().ok_or(StorageError::NoSuchTrack {
            index,
            tracks: tracks.len(),
        })
    }

    /// Indices of all tracks.
    pub fn all_tracks(&self) -> Vec<usize> {
        (0..self.tracks()).collect()
    }

    /// Indices of the selected tracks, in ascending order.
    pub fn selected_tracks(&self) -> Vec<usize> {
        self.tracks
            .read()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_selected())
            .map(|(i, _)| i)
            .collect()
    }

    /// Append a track holding `length` zero samples.
    pub fn append_track(&self, length: usize) -> StorageResult<Track> {
        let track = Track::with_length(&self.memory, &self.config, length)?;
        let mut tracks = self.tracks.write();
        tracks.push(track.clone());
        tracing::debug!(index = tracks.len() - 1, length, "appended track");
        Ok(track)
    }

    /// Insert a track holding `length` zero samples at `index`.
    ///
    /// An index beyond the last track appends.
    pub fn insert_track(&self, index: usize, length: usize) -> StorageResult<Track> {
        let track = Track::with_length(&self.memory, &self.config, length)?;
        let mut tracks = self.tracks.write();
        let index = index.min(tracks.len());
        tracks.insert(index, track.clone());
        tracing::debug!(index, length, "inserted track");
        Ok(track)
    }

    /// Remove the track at `index` from the signal.
    ///
    /// Open readers and writers keep the removed track alive until they are
    /// dropped.
    pub fn delete_track(&self, index: usize) -> StorageResult<Track> {
        let mut tracks = self.tracks.write();
        if index >= tracks.len() {
            return Err(StorageError::NoSuchTrack {
                index,
                tracks: tracks.len(),
            });
        }
        tracing::debug!(index, "deleted track");
        Ok(tracks.remove(index))
    }

    /// Open a reader on `[left, right]` of a track.
    pub fn open_sample_reader(
        &self,
        track: usize,
        left: usize,
        right: usize,
    ) -> StorageResult<SampleReader> {
        self.track(track)?.open_sample_reader(left, right)
    }

    /// Open a reader on `[left, right]` of a track in the given direction.
    pub fn open_sample_reader_with(
        &self,
        track: usize,
        direction: Direction,
        left: usize,
        right: usize,
    ) -> StorageResult<SampleReader> {
        self.track(track)?
            .open_sample_reader_with(direction, left, right)
    }

    /// Open a writer on a track, see [`Track::open_sample_writer`].
    pub fn open_sample_writer(
        &self,
        track: usize,
        mode: InsertMode,
        left: usize,
        right: usize,
    ) -> StorageResult<SampleWriter> {
        self.track(track)?.open_sample_writer(mode, left, right)
    }

    /// Delete `length` samples at `offset` from a track.
    pub fn delete_range(&self, track: usize, offset: usize, length: usize) -> StorageResult<()> {
        self.track(track)?.delete_range(offset, length)
    }

    /// Delete `length` samples at `offset` from every selected track.
    ///
    /// Selected tracks that end before `offset` are left alone.
    pub fn delete_range_selected(&self, offset: usize, length: usize) -> StorageResult<()> {
        let selected: Vec<Track> = self
            .tracks
            .read()
            .iter()
            .filter(|t| t.is_selected())
            .cloned()
            .collect();
        for track in selected {
            if offset < track.length() {
                track.delete_range(offset, length)?;
            }
        }
        Ok(())
    }

    /// Run `op` on the dedicated worker pool, or directly if there is none.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_management() {
        let signal = Signal::new(StorageConfig::default()).unwrap();
        signal.append_track(100).unwrap();
        signal.append_track(300).unwrap();
        let inserted = signal.insert_track(1, 200).unwrap();
        assert_eq!(signal.tracks(), 3);
        assert_eq!(signal.length(), 300);
        assert!(signal.track(1).unwrap().same_track(&inserted));
        assert_eq!(signal.track(2).unwrap().length(), 300);

        let removed = signal.delete_track(2).unwrap();
        assert_eq!(removed.length(), 300);
        assert_eq!(signal.length(), 200);
        assert!(matches!(
            signal.delete_track(2),
            Err(StorageError::NoSuchTrack { index: 2, tracks: 2 })
        ));
    }

    #[test]
    fn test_bad_track_index() {
        let signal = Signal::new(StorageConfig::default()).unwrap();
        assert!(signal.track(0).is_err());
        assert!(signal.open_sample_reader(0, 0, 10).is_err());
        assert!(
            signal
                .open_sample_writer(1, InsertMode::Append, 0, 0)
                .is_err()
        );
        assert!(signal.delete_range(0, 0, 1).is_err());
    }

    #[test]
    fn test_selection() {
        let signal = Signal::new(StorageConfig::default()).unwrap();
        for length in [10, 20, 5] {
            signal.append_track(length).unwrap();
        }
        signal.track(1).unwrap().select(false);
        assert_eq!(signal.selected_tracks(), vec![0, 2]);
        assert_eq!(signal.all_tracks(), vec![0, 1, 2]);

        signal.delete_range_selected(6, 100).unwrap();
        assert_eq!(signal.track(0).unwrap().length(), 6);
        assert_eq!(signal.track(1).unwrap().length(), 20);
        // ends before the offset, untouched
        assert_eq!(signal.track(2).unwrap().length(), 5);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = StorageConfig {
            block_size: 0,
            ..StorageConfig::default()
        };
        assert!(Signal::new(config).is_err());
    }

    #[test]
    fn test_install_on_dedicated_pool() {
        let config = StorageConfig {
            worker_threads: Some(1),
            ..StorageConfig::default()
        };
        let signal = Signal::new(config).unwrap();
        assert!(signal.pool().is_some());
        let name = signal.install(|| std::thread::current().name().map(str::to_string));
        assert_eq!(name.as_deref(), Some("sample-tracks-0"));
    }
}
