//! Cross-module tests for tracks, streams and locks.
//!
//! Module-level unit tests live next to their code. The tests here exercise
//! whole scenarios through the public API.

use crate::{InsertMode, MemoryManager, Sample, Signal, StorageConfig, Track};

mod concurrency_tests;

/// Create a track with one stripe holding `0, 1, 2, ...` up to `length`.
pub(crate) fn ramp_track(length: usize) -> Track {
    let track = Track::new(&MemoryManager::unlimited(), &StorageConfig::default());
    fill(&track, length);
    track
}

/// Append a ramp `0..length` to `track` through an append writer.
pub(crate) fn fill(track: &Track, length: usize) {
    let data: Vec<Sample> = (0..length as Sample).collect();
    let mut writer = track
        .open_sample_writer(InsertMode::Append, 0, 0)
        .expect("Failed to open append writer");
    writer.write(&data).expect("Failed to write ramp");
}

/// Create a signal with one ramp track per entry of `lengths`.
pub(crate) fn ramp_signal(lengths: &[usize]) -> Signal {
    let signal = Signal::new(StorageConfig::default()).expect("Failed to create signal");
    for &length in lengths {
        let track = signal.append_track(0).expect("Failed to append track");
        fill(&track, length);
    }
    signal
}

/// Read `[left, right]` of `track` into a vector.
pub(crate) fn read_range(track: &Track, left: usize, right: usize) -> Vec<Sample> {
    let mut reader = track
        .open_sample_reader(left, right)
        .expect("Failed to open reader");
    let mut out = vec![0; reader.len()];
    reader.read(&mut out);
    out
}

/// Assert that the stripes of `track` are ordered, contiguous and non-empty.
pub(crate) fn assert_contiguous(track: &Track) {
    let mut expected_start = 0;
    for (start, length) in track.stripe_layout() {
        assert_eq!(start, expected_start, "gap or overlap at {start}");
        assert!(length > 0, "empty stripe left at {start}");
        expected_start += length;
    }
    assert_eq!(expected_start, track.length());
}
