//! # Offset
//!
//! Delays a player by a fixed amount of silence. The composite owns an
//! internal [filler](crate::filler) as long as the offset, followed by the
//! wrapped player:
//!
//! ```text
//! 0 ........ offset ................... offset + inner duration
//! |  filler  |        wrapped player         |
//! ```
//!
//! Exactly one child is active at a time. The switch happens when playback
//! or a seek crosses `offset`; a position equal to `offset` belongs to the
//! wrapped player.

use tracing::debug;

use crate::events::{PlayerEventKind, PlayerId};
use crate::phase::{Phase, Signal};
use crate::seek::{SeekLedger, SeekOrigin};
use crate::session::{Kind, Session};

/// Which side of the offset the timeline is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Crossing {
    Before,
    After,
}

/// What moved the timeline across the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Playback,
    Seek,
}

#[derive(Debug)]
pub(crate) struct OffsetState {
    pub(crate) filler: PlayerId,
    pub(crate) inner: PlayerId,
    pub(crate) offset: u64,
    crossing: Crossing,
    filler_seeks: SeekLedger,
    inner_seeks: SeekLedger,
}

impl OffsetState {
    pub(crate) fn new(filler: PlayerId, inner: PlayerId, offset: u64) -> Self {
        Self {
            filler,
            inner,
            offset,
            crossing: Self::crossing_at(offset, 0),
            filler_seeks: SeekLedger::default(),
            inner_seeks: SeekLedger::default(),
        }
    }

    fn crossing_at(offset: u64, position: u64) -> Crossing {
        if position < offset {
            Crossing::Before
        } else {
            Crossing::After
        }
    }

    pub(crate) fn active_child(&self) -> PlayerId {
        match self.crossing {
            Crossing::Before => self.filler,
            Crossing::After => self.inner,
        }
    }

    /// No seek is waiting for its echo on either child.
    fn seeks_settled(&self) -> bool {
        self.filler_seeks.is_settled() && self.inner_seeks.is_settled()
    }

    fn seeks(&mut self, child: PlayerId) -> &mut SeekLedger {
        if child == self.filler {
            &mut self.filler_seeks
        } else {
            &mut self.inner_seeks
        }
    }

    /// Composite timeline position of a child-local position.
    fn absolute(&self, child: PlayerId, position: u64) -> u64 {
        if child == self.filler {
            position
        } else {
            position + self.offset
        }
    }
}

impl Session {
    fn offset_state(&self, id: PlayerId) -> Option<&OffsetState> {
        match &self.node(id).kind {
            Kind::Offset(offset) => Some(offset),
            _ => None,
        }
    }

    fn offset_state_mut(&mut self, id: PlayerId) -> Option<&mut OffsetState> {
        match &mut self.node_mut(id).kind {
            Kind::Offset(offset) => Some(offset),
            _ => None,
        }
    }

    pub(crate) fn offset_seek(&mut self, id: PlayerId, position: u64) {
        let Some(state) = self.offset_state_mut(id) else {
            return;
        };
        let (target, local) = if position < state.offset {
            (state.filler, position)
        } else {
            (state.inner, position - state.offset)
        };
        state.seeks(target).issue(SeekOrigin::Caller);

        self.seek_player(target, local);
        self.offset_adjust(id, position, Cause::Seek);
    }

    pub(crate) fn offset_on_child(&mut self, id: PlayerId, child: PlayerId, kind: PlayerEventKind) {
        let Some(state) = self.offset_state(id) else {
            return;
        };
        let active = state.active_child();

        match kind {
            PlayerEventKind::PhaseChanged(phase) => self.offset_on_child_phase(id, child, phase),
            PlayerEventKind::PositionChanged(position) => {
                if !state.seeks_settled() {
                    debug!(player = %self.node(id).name, child = %child, position, "Position before seek echo dropped");
                    return;
                }
                let absolute = state.absolute(child, position);
                if child == active {
                    self.notify(id, PlayerEventKind::PositionChanged(absolute));
                }
                self.offset_adjust(id, absolute, Cause::Playback);
            }
            PlayerEventKind::SeekTo(position) => {
                let absolute = state.absolute(child, position);
                let origin = self
                    .offset_state_mut(id)
                    .and_then(|state| state.seeks(child).settle());
                match origin {
                    Some(SeekOrigin::Caller) => {
                        self.offset_adjust(id, absolute, Cause::Seek);
                        self.notify(id, PlayerEventKind::SeekTo(absolute));
                    }
                    Some(SeekOrigin::Internal) => {}
                    None => debug!(player = %self.node(id).name, position, "Unsolicited seek echo"),
                }
            }
        }
    }

    fn offset_on_child_phase(&mut self, id: PlayerId, child: PlayerId, phase: Phase) {
        if self.phase_of(child) != phase {
            debug!(player = %self.node(id).name, child = %child, phase = %phase, "Stale child phase skipped");
            return;
        }
        let Some(state) = self.offset_state(id) else {
            return;
        };
        let (filler, inner, crossing) = (state.filler, state.inner, state.crossing);
        let active = state.active_child();

        match phase {
            Phase::Ready => {
                if self.phase_of(filler) != Phase::Idle && self.phase_of(inner) != Phase::Idle {
                    self.post_signal(id, Signal::Ready);
                }
            }
            Phase::End if child == filler => {
                if crossing == Crossing::Before {
                    self.offset_enter_inner(id);
                }
            }
            Phase::End => self.post_signal(id, Signal::End),
            Phase::Idle => {
                if let Some(error) = self.node(child).error.clone() {
                    let sibling = if child == filler { inner } else { filler };
                    if self.node(sibling).state.is_playing() {
                        self.pause_player(sibling);
                    }
                    self.post_signal(id, Signal::Error(error));
                }
            }
            Phase::Playing if child == active => self.post_signal(id, Signal::Playing),
            Phase::Paused if child == active => self.post_signal(id, Signal::Paused),
            Phase::Buffering if child == active => self.post_signal(id, Signal::Buffering),
            Phase::Playing | Phase::Paused | Phase::Buffering => {}
        }
    }

    /// Re-evaluate which child is active for `position` and hand playback
    /// over if the composite is playing.
    fn offset_adjust(&mut self, id: PlayerId, position: u64, cause: Cause) {
        let Some(state) = self.offset_state_mut(id) else {
            return;
        };
        let wanted = OffsetState::crossing_at(state.offset, position);
        if wanted == state.crossing {
            return;
        }
        if wanted == Crossing::After && cause == Cause::Playback {
            self.offset_enter_inner(id);
            return;
        }

        state.crossing = wanted;
        let (filler, inner) = (state.filler, state.inner);
        debug!(player = %self.node(id).name, crossing = ?wanted, "Offset crossing");

        if !self.node(id).state.is_playing() {
            return;
        }
        match wanted {
            Crossing::After => {
                self.pause_player(filler);
                self.play_player(inner);
            }
            Crossing::Before => {
                self.pause_player(inner);
                self.play_player(filler);
            }
        }
    }

    /// The filler ran out: start the wrapped player from its beginning.
    fn offset_enter_inner(&mut self, id: PlayerId) {
        let Some(state) = self.offset_state_mut(id) else {
            return;
        };
        state.crossing = Crossing::After;
        state.inner_seeks.issue(SeekOrigin::Internal);
        let (filler, inner) = (state.filler, state.inner);
        debug!(player = %self.node(id).name, "Offset elapsed");

        self.seek_player(inner, 0);
        if self.node(id).state.is_playing() {
            self.pause_player(filler);
            self.play_player(inner);
        }
    }
}
