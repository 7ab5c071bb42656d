//! Playback engine contract.
//!
//! A [`PlaybackEngine`] is the host-side media renderer (a video decoder, a
//! whiteboard replayer, an audio sink) that the player core drives. Commands
//! flow into the engine through the trait methods; everything the engine
//! wants to report flows back as [`EngineEvent`]s, which the host pushes into
//! the core from whatever thread the engine calls back on.
//!
//! Engines never block: `prepare`, `play`, `pause` and `seek` only start the
//! work and report completion through events.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;

/// Why an engine's playback position jumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscontinuityReason {
    /// A seek requested through [`PlaybackEngine::seek`] completed.
    Seek,
    /// The engine advanced to the next item of its own playlist.
    AutoTransition,
    /// The engine skipped content on its own.
    Skip,
    /// Anything the engine does not classify.
    Internal,
}

/// Event reported by a playback engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine dropped back to an unprepared state.
    Idle,
    /// The engine stalled waiting for data.
    Buffering,
    /// The engine has enough data to start or resume rendering.
    Ready,
    /// Rendering started.
    Playing,
    /// Rendering paused on the engine's own initiative.
    Paused,
    /// The end of the media was reached.
    Ended,
    /// The engine failed.
    Error(EngineError),
    /// The rendering position jumped.
    PositionDiscontinuity(DiscontinuityReason),
    /// Progress report in milliseconds. Only meaningful for engines whose
    /// [`PlaybackEngine::reports_position`] returns `true`.
    PositionChanged(u64),
}

impl EngineEvent {
    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Buffering => "buffering",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Error(_) => "error",
            Self::PositionDiscontinuity(_) => "discontinuity",
            Self::PositionChanged(_) => "position",
        }
    }
}

/// Opaque handle to a host rendering surface.
///
/// The core never inspects the surface; it only routes it to the engines
/// that render into one. Engines downcast it to their concrete view type.
#[derive(Clone)]
pub struct ViewContainer {
    inner: Arc<dyn Any + Send + Sync>,
}

impl ViewContainer {
    pub fn new<T>(view: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            inner: Arc::new(view),
        }
    }

    /// Borrow the surface as its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Whether two containers wrap the same surface.
    pub fn same_surface(&self, other: &ViewContainer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ViewContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContainer").finish_non_exhaustive()
    }
}

/// Host media engine driven by the player core.
///
/// # Contract
///
/// - Commands are issued from the player's serial queue, one at a time.
/// - `seek` must eventually be answered with
///   `EngineEvent::PositionDiscontinuity(DiscontinuityReason::Seek)`.
/// - `prepare` is answered with `EngineEvent::Ready` (or `Error`).
/// - Positions and durations are milliseconds.
pub trait PlaybackEngine: Send + 'static {
    /// Start loading the media.
    fn prepare(&mut self);

    /// Start rendering. With `when_ready` the engine starts as soon as it has
    /// buffered enough data instead of immediately.
    fn play(&mut self, when_ready: bool);

    fn pause(&mut self);

    /// Jump to `position_ms`.
    fn seek(&mut self, position_ms: u64);

    /// Current rendering position in milliseconds.
    fn current_position(&self) -> u64;

    /// Total media length in milliseconds, `0` while unknown.
    fn duration(&self) -> u64;

    fn set_playback_speed(&mut self, _speed: f32) {}

    /// Attach a rendering surface. Audio-only engines ignore it.
    fn attach_view(&mut self, _container: &ViewContainer) {}

    /// Free engine resources. Called exactly once.
    fn release(&mut self) {}

    /// Engines that emit their own [`EngineEvent::PositionChanged`] events
    /// return `true`; the core then skips polling them.
    fn reports_position(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Surface(u32);

    #[test]
    fn test_view_container_downcast() {
        let container = ViewContainer::new(Surface(7));
        assert_eq!(container.downcast_ref::<Surface>(), Some(&Surface(7)));
        assert!(container.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_view_container_identity() {
        let a = ViewContainer::new(Surface(1));
        let b = a.clone();
        let c = ViewContainer::new(Surface(1));
        assert!(a.same_surface(&b));
        assert!(!a.same_surface(&c));
    }

    #[test]
    fn test_event_labels() {
        assert_eq!(EngineEvent::Ready.label(), "ready");
        assert_eq!(
            EngineEvent::Error(EngineError::Other("x".into())).label(),
            "error"
        );
        assert_eq!(
            EngineEvent::PositionDiscontinuity(DiscontinuityReason::Seek).label(),
            "discontinuity"
        );
    }

    #[test]
    fn test_default_capabilities() {
        struct Silent;
        impl PlaybackEngine for Silent {
            fn prepare(&mut self) {}
            fn play(&mut self, _when_ready: bool) {}
            fn pause(&mut self) {}
            fn seek(&mut self, _position_ms: u64) {}
            fn current_position(&self) -> u64 {
                0
            }
            fn duration(&self) -> u64 {
                0
            }
        }

        let mut engine = Silent;
        assert!(!engine.reports_position());
        engine.set_playback_speed(2.0);
        engine.attach_view(&ViewContainer::new(()));
        engine.release();
    }
}
