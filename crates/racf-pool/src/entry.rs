//! Queue entries: one per credential slot.

use tokio::time::Instant;

use crate::session::Session;

/// A credential slot and the session (if any) currently open on it.
///
/// Entries are created once per slot when a pool is built and move between
/// the pool's queues for the pool's whole life. While checked out the
/// session travels with the caller and `session` is `None`.
#[derive(Debug)]
pub struct QueueEntry {
    pub(crate) index: usize,
    pub(crate) session: Option<Box<dyn Session>>,
    pub(crate) last_returned_at: Instant,
}

impl QueueEntry {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            session: None,
            last_returned_at: Instant::now(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the entry has sat unused for longer than `threshold` as of `now`.
    pub(crate) fn idle_longer_than(&self, threshold: std::time::Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_returned_at) > threshold
    }
}
