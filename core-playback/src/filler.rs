//! # Filler
//!
//! A timer-driven stand-in player with a fixed length and no media. It
//! advances with the clock while playing, scaled by the playback speed, and
//! is used to pad a timeline (see [`offset`](crate::offset)).
//!
//! Time is measured with `tokio::time::Instant`, so paused test clocks drive
//! it deterministically.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub(crate) struct FillerClock {
    duration: u64,
    /// Position accumulated up to `running_since`.
    base: u64,
    /// Set while the clock runs.
    running_since: Option<Instant>,
}

impl FillerClock {
    pub(crate) fn new(duration: u64) -> Self {
        Self {
            duration,
            base: 0,
            running_since: None,
        }
    }

    pub(crate) fn duration(&self) -> u64 {
        self.duration
    }

    pub(crate) fn position(&self, speed: f32, now: Instant) -> u64 {
        let position = match self.running_since {
            Some(since) => self.base + scaled_elapsed(since, now, speed),
            None => self.base,
        };
        position.min(self.duration)
    }

    /// Start running. A clock that already runs keeps its origin.
    pub(crate) fn resume(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub(crate) fn suspend(&mut self, speed: f32, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.base = (self.base + scaled_elapsed(since, now, speed)).min(self.duration);
        }
    }

    pub(crate) fn seek(&mut self, position: u64, now: Instant) {
        self.base = position.min(self.duration);
        if self.running_since.is_some() {
            self.running_since = Some(now);
        }
    }

    /// Fold the time played at `old_speed` into the base before the speed
    /// changes.
    pub(crate) fn rebase(&mut self, old_speed: f32, now: Instant) {
        if let Some(since) = self.running_since {
            self.base = (self.base + scaled_elapsed(since, now, old_speed)).min(self.duration);
            self.running_since = Some(now);
        }
    }
}

fn scaled_elapsed(since: Instant, now: Instant, speed: f32) -> u64 {
    let elapsed: Duration = now.saturating_duration_since(since);
    (elapsed.as_millis() as f64 * f64::from(speed)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_advances_only_while_running() {
        let t0 = Instant::now();
        let mut clock = FillerClock::new(1000);
        assert_eq!(clock.position(1.0, t0 + ms(300)), 0);

        clock.resume(t0);
        assert_eq!(clock.position(1.0, t0 + ms(300)), 300);

        clock.suspend(1.0, t0 + ms(300));
        assert_eq!(clock.position(1.0, t0 + ms(900)), 300);
    }

    #[test]
    fn test_repeated_suspend_does_not_double_count() {
        let t0 = Instant::now();
        let mut clock = FillerClock::new(1000);
        clock.resume(t0);
        clock.suspend(1.0, t0 + ms(200));
        clock.suspend(1.0, t0 + ms(400));
        assert_eq!(clock.position(1.0, t0 + ms(400)), 200);
    }

    #[test]
    fn test_resume_while_running_keeps_origin() {
        let t0 = Instant::now();
        let mut clock = FillerClock::new(1000);
        clock.resume(t0);
        clock.resume(t0 + ms(100));
        assert_eq!(clock.position(1.0, t0 + ms(250)), 250);
    }

    #[test]
    fn test_position_is_clamped_to_duration() {
        let t0 = Instant::now();
        let mut clock = FillerClock::new(1000);
        clock.resume(t0);
        assert_eq!(clock.position(1.0, t0 + ms(5000)), 1000);
    }

    #[test]
    fn test_seek_restarts_origin_while_running() {
        let t0 = Instant::now();
        let mut clock = FillerClock::new(1000);
        clock.resume(t0);
        clock.seek(600, t0 + ms(100));
        assert_eq!(clock.position(1.0, t0 + ms(200)), 700);
    }

    #[test]
    fn test_speed_change_rebases() {
        let t0 = Instant::now();
        let mut clock = FillerClock::new(10_000);
        clock.resume(t0);
        clock.rebase(1.0, t0 + ms(1000));
        assert_eq!(clock.position(2.0, t0 + ms(1500)), 2000);
    }
}
