//! Engine-backed leaf players.
//!
//! Engines report through an [`EngineSink`], which only enqueues. The session
//! later translates each [`EngineEvent`] into a phase [`Signal`] or a
//! notification, on its own queue.

use bridge_traits::{DiscontinuityReason, EngineEvent};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{PlaybackError, Result};
use crate::events::{PlayerEventKind, PlayerId};
use crate::phase::{Phase, Signal, TargetPhase};
use crate::session::{Kind, Session, Task};

/// Thread-safe entry point for one engine's events.
#[derive(Clone)]
pub struct EngineSink {
    player: PlayerId,
    queue: mpsc::UnboundedSender<Task>,
}

impl EngineSink {
    pub(crate) fn new(player: PlayerId, queue: mpsc::UnboundedSender<Task>) -> Self {
        Self { player, queue }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Enqueue an event. Never blocks.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::SessionClosed`] once the session is gone.
    pub fn emit(&self, event: EngineEvent) -> Result<()> {
        self.queue
            .send(Task::Engine {
                player: self.player,
                event,
            })
            .map_err(|_| PlaybackError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl fmt::Debug for EngineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSink")
            .field("player", &self.player)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Session {
    pub(crate) fn on_engine_event(&mut self, id: PlayerId, event: EngineEvent) {
        let node = self.node(id);
        if node.released {
            debug!(player = %node.name, event = event.label(), "Event from released engine dropped");
            return;
        }
        let Kind::Engine(engine) = &node.kind else {
            return;
        };
        trace!(player = %node.name, event = event.label(), "Engine event");

        let state = node.state;
        let signal = match event {
            EngineEvent::Ready => match state.observed {
                Phase::Idle => Signal::Ready,
                // Recovered from a stall: resume whatever the caller wants.
                Phase::Buffering if state.intent == Some(TargetPhase::Paused) => Signal::Paused,
                Phase::Buffering => Signal::Playing,
                _ => {
                    debug!(player = %node.name, phase = %state.observed, "Engine ready while active");
                    return;
                }
            },
            EngineEvent::Buffering if state.observed == Phase::Idle => {
                debug!(player = %node.name, "Engine loading");
                return;
            }
            EngineEvent::Buffering => Signal::Buffering,
            EngineEvent::Playing => Signal::Playing,
            EngineEvent::Paused => Signal::Paused,
            EngineEvent::Ended => Signal::End,
            EngineEvent::Error(error) => Signal::Error(error),
            EngineEvent::Idle => {
                debug!(player = %node.name, "Engine went idle");
                return;
            }
            EngineEvent::PositionDiscontinuity(DiscontinuityReason::Seek) => {
                let position = engine.current_position();
                self.notify(id, PlayerEventKind::SeekTo(position));
                return;
            }
            EngineEvent::PositionDiscontinuity(reason) => {
                debug!(player = %node.name, reason = ?reason, "Position discontinuity");
                return;
            }
            EngineEvent::PositionChanged(position) => {
                if engine.reports_position() {
                    self.notify(id, PlayerEventKind::PositionChanged(position));
                }
                return;
            }
        };

        self.apply_signal(id, signal);
    }
}
