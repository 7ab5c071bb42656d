//! Position ticker.
//!
//! Players whose engines do not report progress are polled while they play.
//! The ticker itself never sleeps: it only tracks when the next tick is due.
//! The session posts a tick task onto its queue once the deadline passes, so
//! ticks are serialized with every other piece of work.
//!
//! Each start or stop bumps a generation number. A tick task carries the
//! generation it was issued under and is discarded if the ticker has been
//! restarted or stopped since, which makes cancellation synchronous.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub(crate) struct PositionTicker {
    interval: Duration,
    generation: u64,
    next_due: Option<Instant>,
}

impl PositionTicker {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: 0,
            next_due: None,
        }
    }

    /// Cancel any pending tick and schedule an immediate one.
    pub(crate) fn start(&mut self, now: Instant) {
        self.generation += 1;
        self.next_due = Some(now);
    }

    pub(crate) fn stop(&mut self) {
        self.generation += 1;
        self.next_due = None;
    }

    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Claim the tick if it is due, returning the generation to stamp on the
    /// tick task.
    pub(crate) fn take_due(&mut self, now: Instant) -> Option<u64> {
        match self.next_due {
            Some(due) if due <= now => {
                self.next_due = None;
                Some(self.generation)
            }
            _ => None,
        }
    }

    /// Whether a tick task stamped with `generation` is still current.
    pub(crate) fn accepts(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub(crate) fn reschedule(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }
}
