//! Shared fixtures for the player integration tests.

#![allow(dead_code)]

use bridge_traits::{DiscontinuityReason, EngineEvent, PlaybackEngine, ViewContainer};
use core_playback::{EngineSink, Phase, PlayerEvent, PlayerEventKind, PlayerId, Session};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

// ============================================================================
// Scripted Engine
// ============================================================================

#[derive(Debug)]
pub struct EngineState {
    pub calls: Vec<String>,
    pub position: u64,
    pub duration: u64,
    pub playing: bool,
    pub speed: f32,
    pub views: usize,
    pub reports_position: bool,
    /// Answer `prepare` with `Ready` right away.
    pub auto_ready: bool,
}

/// Engine that records every command and answers like a well-behaved
/// backend: `Ready` after `prepare`, a seek discontinuity after `seek`.
/// Its position only moves when a test sets it.
pub struct ScriptedEngine {
    sink: EngineSink,
    state: Arc<Mutex<EngineState>>,
}

impl ScriptedEngine {
    fn record(&self, call: impl Into<String>) {
        self.state.lock().calls.push(call.into());
    }

    fn emit(&self, event: EngineEvent) {
        self.sink.emit(event).expect("session alive");
    }
}

impl PlaybackEngine for ScriptedEngine {
    fn prepare(&mut self) {
        self.record("prepare");
        if self.state.lock().auto_ready {
            self.emit(EngineEvent::Ready);
        }
    }

    fn play(&mut self, when_ready: bool) {
        self.record(format!("play:{}", when_ready));
        self.state.lock().playing = true;
    }

    fn pause(&mut self) {
        self.record("pause");
        self.state.lock().playing = false;
    }

    fn seek(&mut self, position_ms: u64) {
        self.record(format!("seek:{}", position_ms));
        {
            let mut state = self.state.lock();
            state.position = position_ms.min(state.duration);
        }
        self.emit(EngineEvent::PositionDiscontinuity(DiscontinuityReason::Seek));
    }

    fn current_position(&self) -> u64 {
        self.state.lock().position
    }

    fn duration(&self) -> u64 {
        self.state.lock().duration
    }

    fn set_playback_speed(&mut self, speed: f32) {
        self.record(format!("speed:{}", speed));
        self.state.lock().speed = speed;
    }

    fn attach_view(&mut self, _container: &ViewContainer) {
        self.record("attach_view");
        self.state.lock().views += 1;
    }

    fn release(&mut self) {
        self.record("release");
        self.state.lock().playing = false;
    }

    fn reports_position(&self) -> bool {
        self.state.lock().reports_position
    }
}

/// Test-side view of a [`ScriptedEngine`].
#[derive(Clone)]
pub struct EngineProbe {
    pub player: PlayerId,
    sink: EngineSink,
    state: Arc<Mutex<EngineState>>,
}

impl EngineProbe {
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn count(&self, call: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn set_position(&self, position: u64) {
        self.state.lock().position = position;
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn speed(&self) -> f32 {
        self.state.lock().speed
    }

    pub fn views(&self) -> usize {
        self.state.lock().views
    }

    pub fn set_auto_ready(&self, auto_ready: bool) {
        self.state.lock().auto_ready = auto_ready;
    }

    /// Push an event as the engine would from its own thread.
    pub fn emit(&self, event: EngineEvent) {
        self.sink.emit(event).expect("session alive");
    }
}

fn add_engine(
    session: &mut Session,
    name: &str,
    duration: u64,
    reports_position: bool,
) -> (PlayerId, EngineProbe) {
    let state = Arc::new(Mutex::new(EngineState {
        calls: Vec::new(),
        position: 0,
        duration,
        playing: false,
        speed: 1.0,
        views: 0,
        reports_position,
        auto_ready: true,
    }));

    let engine_state = Arc::clone(&state);
    let id = session.add_engine_with(name, move |sink| ScriptedEngine {
        sink,
        state: engine_state,
    });
    let sink = session.engine_sink(id).expect("engine sink");

    (
        id,
        EngineProbe {
            player: id,
            sink,
            state,
        },
    )
}

/// Polled engine of `duration` ms.
pub fn scripted(session: &mut Session, name: &str, duration: u64) -> (PlayerId, EngineProbe) {
    add_engine(session, name, duration, false)
}

/// Engine that pushes its own `PositionChanged` events.
pub fn self_reporting(session: &mut Session, name: &str, duration: u64) -> (PlayerId, EngineProbe) {
    add_engine(session, name, duration, true)
}

// ============================================================================
// Event Helpers
// ============================================================================

/// Everything currently buffered on a subscription.
pub fn drain(events: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEventKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

pub fn phases(kinds: &[PlayerEventKind]) -> Vec<Phase> {
    kinds
        .iter()
        .filter_map(|kind| match kind {
            PlayerEventKind::PhaseChanged(phase) => Some(*phase),
            _ => None,
        })
        .collect()
}

pub fn positions(kinds: &[PlayerEventKind]) -> Vec<u64> {
    kinds
        .iter()
        .filter_map(|kind| match kind {
            PlayerEventKind::PositionChanged(position) => Some(*position),
            _ => None,
        })
        .collect()
}

pub fn seeks(kinds: &[PlayerEventKind]) -> Vec<u64> {
    kinds
        .iter()
        .filter_map(|kind| match kind {
            PlayerEventKind::SeekTo(position) => Some(*position),
            _ => None,
        })
        .collect()
}
