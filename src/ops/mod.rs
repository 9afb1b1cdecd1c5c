//! Operations spanning several tracks of a [`Signal`](crate::Signal).

mod reverse;

pub use reverse::{ReverseSummary, reverse, reverse_selection};
