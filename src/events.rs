//! Change notifications for stripes and tracks.
//!
//! A stripe mutation produces a [`StripeChange`] in stripe-local coordinates.
//! The owning track translates it into a [`TrackEvent`] with absolute sample
//! offsets and hands it to every registered [`TrackListener`], e.g. to
//! invalidate cached overview data.

use crossbeam::channel::Sender;

/// What happened to a range of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Samples were inserted, everything after them moved right.
    Inserted,
    /// Samples were removed, everything after them moved left.
    Deleted,
    /// Samples were overwritten in place.
    Modified,
}

/// A change of a stripe, in coordinates relative to the stripe start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeChange {
    /// Kind of the change.
    pub kind: ChangeKind,
    /// First affected sample, relative to the stripe start.
    pub offset: usize,
    /// Number of affected samples.
    pub length: usize,
}

impl StripeChange {
    pub(crate) const fn new(kind: ChangeKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
        }
    }

    /// Translate into track coordinates for a stripe starting at `start`.
    pub const fn to_track(self, start: usize) -> TrackEvent {
        TrackEvent {
            kind: self.kind,
            offset: start + self.offset,
            length: self.length,
        }
    }
}

/// A change of a track, in absolute sample offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEvent {
    /// Kind of the change.
    pub kind: ChangeKind,
    /// First affected sample of the track.
    pub offset: usize,
    /// Number of affected samples.
    pub length: usize,
}

impl TrackEvent {
    /// Create a new track event.
    pub const fn new(kind: ChangeKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
        }
    }
}

/// Receiver of track change notifications.
///
/// Listeners are called synchronously from the thread that performed the
/// change, after the affected range lock has been released where possible.
/// They must not call back into the mutating API of the same track.
pub trait TrackListener: Send + Sync {
    /// Called once per change.
    fn track_changed(&self, event: &TrackEvent);
}

impl TrackListener for Sender<TrackEvent> {
    fn track_changed(&self, event: &TrackEvent) {
        // a disconnected receiver just means nobody is interested any more
        let _ = self.send(*event);
    }
}

/// Identifies a registered listener, see [`Track::subscribe`](crate::Track::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
