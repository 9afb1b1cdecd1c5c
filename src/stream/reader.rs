use std::fmt;

use super::ProgressHook;
use crate::lock::SampleLock;
use crate::sample::Sample;
use crate::Track;

/// Order in which a [`SampleReader`] delivers its samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From the first to the last sample of the range.
    #[default]
    Forward,
    /// From the last to the first sample of the range.
    Reverse,
}

/// Reads samples from a locked range of a track.
///
/// After the last sample of the range has been delivered, or if the track
/// content ends early, [`eof`](Self::eof) returns true and further reads
/// yield zeros.
///
/// Every block is fetched from the current stripes of the track, so writers
/// working next to the reader (including inserts that split a stripe) never
/// cut the range short.
pub struct SampleReader {
    track: Track,
    direction: Direction,
    first: usize,
    count: usize,
    consumed: usize,
    exhausted: bool,
    buffer: Vec<Sample>,
    buffer_pos: usize,
    block_size: usize,
    progress: Option<ProgressHook>,
    // declared last so it is released after everything else
    lock: SampleLock,
}

impl fmt::Debug for SampleReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleReader")
            .field("direction", &self.direction)
            .field("first", &self.first)
            .field("count", &self.count)
            .field("consumed", &self.consumed)
            .field("progress_hook", &self.progress.is_some())
            .field("lock", &self.lock)
            .finish()
    }
}

impl SampleReader {
    pub(crate) fn new(
        track: Track,
        lock: SampleLock,
        direction: Direction,
        first: usize,
        count: usize,
        block_size: usize,
    ) -> Self {
        Self {
            track,
            direction,
            first,
            count,
            consumed: 0,
            exhausted: false,
            buffer: Vec::with_capacity(block_size.min(count)),
            buffer_pos: 0,
            block_size,
            progress: None,
            lock,
        }
    }

    /// Call `hook` with the number of samples delivered by every read.
    pub fn set_progress_hook(&mut self, hook: ProgressHook) {
        self.progress = Some(hook);
    }

    /// The track this reader reads from.
    pub const fn track(&self) -> &Track {
        &self.track
    }

    /// Direction of this reader.
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// First sample of the range.
    pub const fn first(&self) -> usize {
        self.first
    }

    /// Last sample of the range, equal to `first` for an empty range.
    pub const fn last(&self) -> usize {
        self.first + self.count.saturating_sub(1)
    }

    /// Number of samples in the range.
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the range holds no samples.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of samples delivered so far.
    pub const fn consumed(&self) -> usize {
        self.consumed
    }

    /// Number of samples still to be delivered.
    pub const fn remaining(&self) -> usize {
        if self.exhausted {
            0
        } else {
            self.count - self.consumed
        }
    }

    /// Position of the next sample to be delivered.
    ///
    /// For a forward reader at eof this is one past the last sample, for a
    /// reverse reader at eof it is the first sample.
    pub const fn pos(&self) -> usize {
        match self.direction {
            Direction::Forward => self.first + self.consumed,
            Direction::Reverse => {
                if self.consumed >= self.count {
                    self.first
                } else {
                    self.first + self.count - 1 - self.consumed
                }
            }
        }
    }

    /// Returns true if no more samples can be delivered.
    pub const fn eof(&self) -> bool {
        self.exhausted || self.consumed >= self.count
    }

    /// Read samples into `out`, returns the number of samples delivered.
    ///
    /// Elements of `out` that could not be filled because the reader reached
    /// eof are set to zero.
    pub fn read(&mut self, out: &mut [Sample]) -> usize {
        let mut done = 0;
        while done < out.len() && !self.eof() {
            if self.buffer_pos >= self.buffer.len() && !self.refill() {
                self.exhausted = true;
                break;
            }
            let available = &self.buffer[self.buffer_pos..];
            let n = available.len().min(out.len() - done);
            out[done..done + n].copy_from_slice(&available[..n]);
            self.buffer_pos += n;
            self.consumed += n;
            done += n;
        }
        out[done..].fill(0);
        if done > 0 {
            if let Some(hook) = &self.progress {
                hook(done);
            }
        }
        done
    }

    /// Read a single sample, zero at eof.
    pub fn read_sample(&mut self) -> Sample {
        let mut sample = [0];
        self.read(&mut sample);
        sample[0]
    }

    /// Move to the absolute position `pos`, clipped to the range.
    pub fn seek(&mut self, pos: usize) {
        self.consumed = if self.count == 0 {
            0
        } else {
            let last = self.first + self.count - 1;
            match self.direction {
                Direction::Forward => pos.clamp(self.first, last + 1) - self.first,
                Direction::Reverse => {
                    if pos < self.first {
                        self.count
                    } else {
                        last - pos.min(last)
                    }
                }
            }
        };
        self.exhausted = false;
        self.buffer.clear();
        self.buffer_pos = 0;
    }

    // Fill the internal buffer with the next block in delivery order.
    fn refill(&mut self) -> bool {
        let wanted = self.block_size.min(self.count - self.consumed);
        if wanted == 0 {
            return false;
        }
        let start = match self.direction {
            Direction::Forward => self.first + self.consumed,
            Direction::Reverse => self.first + self.count - self.consumed - wanted,
        };

        self.buffer.clear();
        self.buffer.resize(wanted, 0);
        self.buffer_pos = 0;
        let got = self.track.read_at(start, &mut self.buffer);

        match self.direction {
            Direction::Forward => {
                self.buffer.truncate(got);
                got > 0
            }
            Direction::Reverse => {
                // the upper end of the block is missing, nothing to deliver
                if got < wanted {
                    self.buffer.clear();
                    return false;
                }
                self.buffer.reverse();
                true
            }
        }
    }
}
