//! # Phase State Machine
//!
//! Every player, leaf or composite, runs the same two-track state machine:
//!
//! - the **observed** [`Phase`] is what the player is actually doing and is
//!   the only thing subscribers are told about;
//! - the **intent** ([`TargetPhase`]) is what the caller last asked for.
//!
//! Caller commands ([`Intent`]) and engine-originated [`Signal`]s are folded
//! into a [`PhaseState`] by pure reducers that return the [`Effect`]s the
//! session must carry out, in order. Keeping the reducers free of I/O lets
//! the whole table be unit tested without a session.

use bridge_traits::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed playback phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Not prepared, or fell back after an error.
    #[default]
    Idle,
    /// Prepared and waiting for a play or pause decision.
    Ready,
    Paused,
    Playing,
    /// Wants to play but is stalled.
    Buffering,
    /// Reached the end of its timeline.
    End,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Paused => "paused",
            Self::Playing => "playing",
            Self::Buffering => "buffering",
            Self::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase the caller last asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPhase {
    Ready,
    Playing,
    Paused,
}

impl From<TargetPhase> for Phase {
    fn from(target: TargetPhase) -> Self {
        match target {
            TargetPhase::Ready => Phase::Ready,
            TargetPhase::Playing => Phase::Playing,
            TargetPhase::Paused => Phase::Paused,
        }
    }
}

/// Observed phase plus caller intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseState {
    pub observed: Phase,
    pub intent: Option<TargetPhase>,
}

impl PhaseState {
    /// Preparation was requested and has not completed yet.
    pub fn is_preparing(&self) -> bool {
        self.observed == Phase::Idle && self.intent == Some(TargetPhase::Ready)
    }

    pub fn is_playing(&self) -> bool {
        self.observed == Phase::Playing
    }
}

/// Caller command folded into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Prepare,
    Play,
    Pause,
    SeekTo(u64),
    Stop,
}

/// Internal signal raised by an engine (after marshalling) or by a composite
/// that has aggregated its children.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Ready,
    Playing,
    Buffering,
    Paused,
    End,
    Error(EngineError),
}

impl Signal {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Buffering => "buffering",
            Self::Paused => "paused",
            Self::End => "end",
            Self::Error(_) => "error",
        }
    }
}

/// Position and length the reducers need for range decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeline {
    pub position: u64,
    pub duration: u64,
}

/// Why an input produced no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// `pause` before the player was ever prepared.
    PauseWhileIdle,
    /// `play` at the end with nothing left to play.
    PlayAtEnd,
    /// A second readiness report after preparation finished.
    RepeatedReady,
    /// Playback resumed after the caller already paused.
    StalePlaying,
    /// A signal that has no transition from the current phase.
    Unexpected,
}

impl Ignored {
    /// Whether the input points at a misbehaving caller or engine.
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Self::PauseWhileIdle | Self::Unexpected)
    }
}

/// Side effect the session carries out after a reduction, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ClearError,
    RecordError(EngineError),
    /// Run the player's prepare hook.
    Prepare,
    /// Run the player's play hook.
    Play,
    /// Run the player's pause hook.
    Pause,
    /// Run the player's seek hook.
    Seek(u64),
    /// Change the observed phase and notify subscribers.
    Transition(Phase),
    /// Notify subscribers of a seek without waiting for an engine echo.
    EchoSeek(u64),
    Ignore(Ignored),
}

/// Result of a reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: PhaseState,
    pub effects: Vec<Effect>,
}

struct Reduction {
    state: PhaseState,
    effects: Vec<Effect>,
}

impl Reduction {
    fn new(state: PhaseState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn transition(&mut self, phase: Phase) {
        if self.state.observed != phase {
            self.state.observed = phase;
            self.effects.push(Effect::Transition(phase));
        }
    }

    fn prepare(&mut self) {
        if self.state.is_preparing() || self.state.observed != Phase::Idle {
            return;
        }
        self.state.intent = Some(TargetPhase::Ready);
        self.push(Effect::ClearError);
        self.push(Effect::Prepare);
    }

    /// Park the player at the end of its timeline.
    fn park_at_end(&mut self, duration: u64) {
        self.push(Effect::Seek(duration));
        self.push(Effect::Pause);
        self.transition(Phase::End);
    }

    fn finish(self) -> Step {
        Step {
            state: self.state,
            effects: self.effects,
        }
    }
}

/// Fold a caller command into the state.
pub fn reduce_intent(state: PhaseState, intent: Intent, timeline: Timeline) -> Step {
    let mut r = Reduction::new(state);

    match intent {
        Intent::Prepare => r.prepare(),
        Intent::Play => {
            match state.observed {
                Phase::Idle => r.prepare(),
                Phase::Ready | Phase::Paused | Phase::Buffering => {
                    r.push(Effect::Play);
                    r.transition(Phase::Playing);
                }
                // Nudge the engine; no phase change.
                Phase::Playing => r.push(Effect::Play),
                Phase::End if timeline.position < timeline.duration => {
                    r.push(Effect::Play);
                    r.transition(Phase::Playing);
                }
                Phase::End => r.push(Effect::Ignore(Ignored::PlayAtEnd)),
            }
            r.state.intent = Some(TargetPhase::Playing);
        }
        Intent::Pause => {
            if state.observed == Phase::Idle {
                r.push(Effect::Ignore(Ignored::PauseWhileIdle));
            } else {
                r.push(Effect::Pause);
                r.transition(Phase::Paused);
            }
            r.state.intent = Some(TargetPhase::Paused);
        }
        Intent::SeekTo(position) => {
            if state.observed != Phase::Idle && position <= timeline.duration {
                r.push(Effect::Seek(position));
            } else {
                if state.observed != Phase::End {
                    r.park_at_end(timeline.duration);
                }
                r.push(Effect::EchoSeek(position));
            }
        }
        Intent::Stop => {
            if state.observed != Phase::End {
                r.park_at_end(timeline.duration);
            }
            r.state.intent = Some(TargetPhase::Paused);
        }
    }

    r.finish()
}

/// Fold an internal signal into the state.
pub fn reduce_signal(state: PhaseState, signal: &Signal) -> Step {
    let mut r = Reduction::new(state);

    match signal {
        Signal::Ready => {
            if state.observed != Phase::Idle {
                r.push(Effect::Ignore(Ignored::RepeatedReady));
            } else {
                r.transition(Phase::Ready);
                match state.intent {
                    Some(TargetPhase::Playing) => {
                        r.push(Effect::Play);
                        r.transition(Phase::Playing);
                    }
                    Some(TargetPhase::Paused) => {
                        r.push(Effect::Pause);
                        r.transition(Phase::Paused);
                    }
                    Some(TargetPhase::Ready) | None => {}
                }
            }
        }
        Signal::Playing => match state.observed {
            Phase::Buffering => r.transition(Phase::Playing),
            Phase::Playing => {}
            Phase::Paused => r.push(Effect::Ignore(Ignored::StalePlaying)),
            _ if state.intent == Some(TargetPhase::Paused) => r.push(Effect::Pause),
            _ => r.push(Effect::Ignore(Ignored::Unexpected)),
        },
        Signal::Paused => match state.observed {
            Phase::Buffering => r.transition(Phase::Paused),
            // A child paused on our behalf, or an engine confirming its end.
            Phase::Paused | Phase::End => {}
            _ => r.push(Effect::Ignore(Ignored::Unexpected)),
        },
        Signal::Buffering => match state.observed {
            Phase::Playing => r.transition(Phase::Buffering),
            // The engine started loading on its own; hold it paused.
            Phase::Paused => r.push(Effect::Pause),
            _ => r.push(Effect::Ignore(Ignored::Unexpected)),
        },
        Signal::End => r.transition(Phase::End),
        Signal::Error(error) => {
            r.push(Effect::RecordError(error.clone()));
            r.transition(Phase::Idle);
            // A failed preparation is over; the next prepare must reach the hook.
            if r.state.intent == Some(TargetPhase::Ready) {
                r.state.intent = None;
            }
        }
    }

    r.finish()
}
