//! In-place reversal of a range on a set of tracks.
//!
//! The range is processed from both ends towards the middle. Each step reads
//! one block from the front with a forward reader and one from the back with
//! a reverse reader, then writes the back block to the front and the front
//! block, flipped, to the back. The reverse reader already delivers its
//! samples in descending order, so only the front block needs flipping. Once
//! less than two blocks are left, the middle is reversed in one piece.
//!
//! Every step runs one job per track in parallel and waits for all of them.
//! Cancellation is checked between steps, so a cancelled run leaves a
//! partially reversed range behind.

use std::time::Instant;

use rayon::prelude::*;

use crate::multi::{CancelToken, MultiTrackReader};
use crate::progress::{ProgressInfo, ProgressReporter};
use crate::sample::Sample;
use crate::stream::{Direction, SampleReader};
use crate::{Signal, StorageError, StorageResult, Track};

/// Reader blocks handled at each end per step.
const BLOCKS_PER_STEP: usize = 5;

/// What a [`reverse`] run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReverseSummary {
    /// Number of tracks the operation ran on.
    pub tracks: usize,
    /// Samples read, summed over all tracks.
    pub processed: u64,
    /// Number of block steps executed.
    pub steps: usize,
    /// True if the run stopped early because of cancellation.
    pub cancelled: bool,
}

// Per-track state of one reversal.
struct ReverseJob {
    track: Track,
    first: usize,
    last: usize,
    finished: bool,
    front: Vec<Sample>,
    back: Vec<Sample>,
}

impl ReverseJob {
    fn new(track: Track, reader: &SampleReader, block: usize) -> Self {
        Self {
            track,
            first: reader.first(),
            last: reader.last(),
            finished: reader.is_empty(),
            front: vec![0; block],
            back: vec![0; block],
        }
    }

    fn step(&mut self, ahead: &mut SampleReader, behind: &mut SampleReader) -> StorageResult<()> {
        if self.finished {
            return Ok(());
        }
        let block = self.front.len();
        let remaining = self.last - self.first + 1;

        if remaining >= 2 * block {
            ahead.read(&mut self.front);
            behind.read(&mut self.back);
            self.front.reverse();
            overwrite(&self.track, self.first, self.first + block - 1, &self.back)?;
            overwrite(&self.track, self.last + 1 - block, self.last, &self.front)?;
            self.first += block;
            self.last -= block;
            self.finished = self.first > self.last;
        } else {
            let mut middle = vec![0; remaining];
            ahead.read(&mut middle);
            middle.reverse();
            overwrite(&self.track, self.first, self.last, &middle)?;
            self.finished = true;
        }
        Ok(())
    }
}

fn overwrite(track: &Track, left: usize, right: usize, samples: &[Sample]) -> StorageResult<()> {
    let mut writer = track.open_overwrite_range(left, right)?;
    writer.write(samples)?;
    writer.flush()
}

/// Reverse the samples `[first, last]` of the given tracks in place.
///
/// The range is clipped per track to the track's length. Progress is
/// reported to `reporter` after every step, `cancel` is polled between
/// steps.
pub fn reverse(
    signal: &Signal,
    tracks: &[usize],
    first: usize,
    last: usize,
    reporter: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> StorageResult<ReverseSummary> {
    if last < first {
        return Err(StorageError::invalid_range(first, last, "last < first"));
    }
    if tracks.is_empty() {
        return Ok(ReverseSummary::default());
    }

    let mut ahead = MultiTrackReader::new(signal, tracks, first, last, Direction::Forward)?;
    let mut behind = MultiTrackReader::new(signal, tracks, first, last, Direction::Reverse)?;
    ahead.set_cancel_token(cancel.clone());
    behind.set_cancel_token(cancel.clone());

    let block = BLOCKS_PER_STEP * signal.config().block_size;
    let mut jobs = tracks
        .iter()
        .enumerate()
        .map(|(i, &index)| -> StorageResult<ReverseJob> {
            Ok(ReverseJob::new(signal.track(index)?, &ahead[i], block))
        })
        .collect::<StorageResult<Vec<_>>>()?;

    let total = ahead.total();
    let started = Instant::now();
    reporter.start("reverse", total);
    tracing::debug!(?tracks, first, last, block, "reverse started");

    let mut summary = ReverseSummary {
        tracks: tracks.len(),
        ..ReverseSummary::default()
    };
    while jobs.iter().any(|job| !job.finished) {
        if ahead.is_cancelled() {
            summary.cancelled = true;
            tracing::debug!(steps = summary.steps, "reverse cancelled");
            break;
        }
        signal.install(|| {
            ahead
                .readers_mut()
                .par_iter_mut()
                .zip(behind.readers_mut().par_iter_mut())
                .zip(jobs.par_iter_mut())
                .try_for_each(|((a, b), job)| job.step(a, b))
        })?;
        summary.steps += 1;
        summary.processed = ahead.proceeded() + behind.proceeded();
        reporter.report_progress(&ProgressInfo {
            operation: "reverse".to_string(),
            processed: summary.processed,
            total,
            elapsed: started.elapsed(),
        });
    }

    reporter.finish(started.elapsed());
    tracing::debug!(
        steps = summary.steps,
        processed = summary.processed,
        "reverse finished"
    );
    Ok(summary)
}

/// Reverse the whole length of all selected tracks of `signal`.
pub fn reverse_selection(
    signal: &Signal,
    reporter: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> StorageResult<ReverseSummary> {
    let tracks = signal.selected_tracks();
    let length = signal.length();
    if tracks.is_empty() || length == 0 {
        return Ok(ReverseSummary::default());
    }
    reverse(signal, &tracks, 0, length - 1, reporter, cancel)
}
