//! # Cluster
//!
//! Plays several players in lockstep on one shared timeline, e.g. a lecture
//! video next to its whiteboard replay.
//!
//! - **Readiness and end** are joins: the cluster is ready when every member
//!   is, and ends when every member has ended.
//! - **Stalls propagate**: when one member buffers, every playing sibling is
//!   paused and marked as held. Held siblings resume when the member plays
//!   again, and their pause is never surfaced as a cluster pause.
//! - **Seeks fan out**: a seek goes to every member and the cluster announces
//!   it once, after the last member has answered.
//! - **Drift is corrected**: the cluster position is the furthest member
//!   position; a member that falls behind by more than the configured
//!   threshold is seeked forward.

use tracing::{debug, warn};

use crate::error::{PlaybackError, Result};
use crate::events::{PlayerEventKind, PlayerId};
use crate::phase::{Phase, Signal};
use crate::session::{Kind, Session};

#[derive(Debug)]
pub(crate) struct ClusterState {
    pub(crate) members: Vec<PlayerId>,
    pub(crate) position: u64,
    /// Paused because a sibling is buffering.
    held: Vec<bool>,
    /// Target of the fan-out seek in flight.
    seek_target: Option<u64>,
    awaiting_seek: Vec<bool>,
    /// Drift seek in flight.
    correcting: Vec<bool>,
}

impl ClusterState {
    pub(crate) fn new(members: Vec<PlayerId>) -> Self {
        let count = members.len();
        Self {
            members,
            position: 0,
            held: vec![false; count],
            seek_target: None,
            awaiting_seek: vec![false; count],
            correcting: vec![false; count],
        }
    }

    fn index_of(&self, member: PlayerId) -> Option<usize> {
        self.members.iter().position(|candidate| *candidate == member)
    }

    fn begin_seek(&mut self, target: u64) {
        self.seek_target = Some(target);
        self.awaiting_seek.iter_mut().for_each(|flag| *flag = true);
        self.correcting.iter_mut().for_each(|flag| *flag = false);
    }

    /// Record a member's seek answer. Returns the target once every member
    /// has answered.
    fn settle_seek(&mut self, index: usize) -> Option<u64> {
        self.seek_target?;
        self.awaiting_seek[index] = false;
        if self.awaiting_seek.iter().any(|flag| *flag) {
            return None;
        }
        self.seek_target.take()
    }

    fn is_seeking(&self) -> bool {
        self.seek_target.is_some()
    }
}

impl Session {
    fn cluster_state(&self, id: PlayerId) -> Option<&ClusterState> {
        match &self.node(id).kind {
            Kind::Cluster(cluster) => Some(cluster),
            _ => None,
        }
    }

    fn cluster_state_mut(&mut self, id: PlayerId) -> Option<&mut ClusterState> {
        match &mut self.node_mut(id).kind {
            Kind::Cluster(cluster) => Some(cluster),
            _ => None,
        }
    }

    /// Whether `member` is currently paused because a sibling is buffering.
    pub fn is_held_for_buffering(&self, cluster: PlayerId, member: PlayerId) -> Result<bool> {
        self.live(cluster)?;
        let state = self.cluster_state(cluster).ok_or(PlaybackError::WrongKind {
            player: cluster,
            expected: "cluster",
        })?;
        let index = state
            .index_of(member)
            .ok_or(PlaybackError::UnknownPlayer(member))?;
        Ok(state.held[index])
    }

    pub(crate) fn cluster_seek(&mut self, id: PlayerId, position: u64) {
        let Some(state) = self.cluster_state_mut(id) else {
            return;
        };
        state.begin_seek(position);
        let members = state.members.clone();

        debug!(player = %self.node(id).name, position, members = members.len(), "Cluster seek");
        for member in members {
            self.seek_player(member, position);
        }
    }

    pub(crate) fn cluster_on_child(&mut self, id: PlayerId, member: PlayerId, kind: PlayerEventKind) {
        let Some(index) = self.cluster_state(id).and_then(|state| state.index_of(member)) else {
            return;
        };
        match kind {
            PlayerEventKind::PhaseChanged(phase) => self.cluster_on_member_phase(id, index, phase),
            PlayerEventKind::PositionChanged(position) => {
                self.cluster_on_member_position(id, index, position)
            }
            PlayerEventKind::SeekTo(_) => self.cluster_on_member_seek(id, index),
        }
    }

    fn cluster_on_member_phase(&mut self, id: PlayerId, index: usize, phase: Phase) {
        let Some(state) = self.cluster_state(id) else {
            return;
        };
        let members = state.members.clone();
        let member = members[index];

        if self.phase_of(member) != phase {
            debug!(player = %self.node(id).name, member = %member, phase = %phase, "Stale member phase skipped");
            return;
        }

        let parked = self.phase_of(id) == Phase::End;

        match phase {
            // Parking pauses every member; that must not unpark the cluster.
            Phase::Paused | Phase::Playing | Phase::Buffering if parked => {
                debug!(player = %self.node(id).name, member = %member, phase = %phase, "Member phase ignored at end");
            }
            Phase::Ready => {
                if members.iter().all(|m| self.phase_of(*m) != Phase::Idle) {
                    self.post_signal(id, Signal::Ready);
                }
            }
            Phase::End => {
                if members.iter().all(|m| self.phase_of(*m) == Phase::End) {
                    self.post_signal(id, Signal::End);
                }
            }
            Phase::Paused => {
                if state.held[index] {
                    debug!(player = %self.node(id).name, member = %member, "Member held for sibling buffering");
                    return;
                }
                for (_, sibling) in siblings(&members, index) {
                    if self.node(sibling).state.is_playing() {
                        self.pause_player(sibling);
                    }
                }
                self.transition(id, Phase::Paused);
            }
            Phase::Playing => {
                let resumable: Vec<(usize, PlayerId)> = siblings(&members, index)
                    .filter(|(_, sibling)| {
                        let node = self.node(*sibling);
                        node.error.is_none()
                            && !matches!(
                                node.state.observed,
                                Phase::Playing | Phase::Buffering | Phase::End
                            )
                    })
                    .collect();

                if let Some(state) = self.cluster_state_mut(id) {
                    state.held[index] = false;
                    for (sibling_index, _) in &resumable {
                        state.held[*sibling_index] = false;
                    }
                }
                for (_, sibling) in resumable {
                    self.play_player(sibling);
                }
                self.transition(id, Phase::Playing);
            }
            Phase::Buffering => {
                let stalled: Vec<(usize, PlayerId)> = siblings(&members, index)
                    .filter(|(_, sibling)| self.node(*sibling).state.is_playing())
                    .collect();

                if let Some(state) = self.cluster_state_mut(id) {
                    for (sibling_index, _) in &stalled {
                        state.held[*sibling_index] = true;
                    }
                }
                for (_, sibling) in stalled {
                    self.pause_player(sibling);
                }
                self.transition(id, Phase::Buffering);
            }
            Phase::Idle => {
                if let Some(error) = &self.node(member).error {
                    warn!(player = %self.node(id).name, member = %member, error = %error, "Cluster member failed");
                }
            }
        }
    }

    fn cluster_on_member_position(&mut self, id: PlayerId, index: usize, position: u64) {
        let drift_threshold = self.config.drift_threshold_ms;
        let Some(state) = self.cluster_state_mut(id) else {
            return;
        };
        if state.is_seeking() {
            return;
        }

        if position > state.position {
            state.position = position;
            self.notify(id, PlayerEventKind::PositionChanged(position));
        } else if state.position > position + drift_threshold && !state.correcting[index] {
            state.correcting[index] = true;
            let (member, target) = (state.members[index], state.position);
            debug!(
                player = %self.node(id).name,
                member = %member,
                behind = target - position,
                "Correcting member drift"
            );
            self.seek_player(member, target);
        }
    }

    fn cluster_on_member_seek(&mut self, id: PlayerId, index: usize) {
        let Some(state) = self.cluster_state_mut(id) else {
            return;
        };
        state.correcting[index] = false;

        if let Some(target) = state.settle_seek(index) {
            state.position = target;
            let members = state.members.clone();
            self.notify(id, PlayerEventKind::SeekTo(target));

            if self.phase_of(id) == Phase::Playing {
                self.cluster_resume_finished(id, &members);
            }
        }
    }

    /// Restart members that had ended but were seeked back into their media.
    fn cluster_resume_finished(&mut self, id: PlayerId, members: &[PlayerId]) {
        for &member in members {
            let node = self.node(member);
            if node.state.observed != Phase::End || node.error.is_some() {
                continue;
            }
            if self.position_of(member) < self.duration_of(member) {
                debug!(player = %self.node(id).name, member = %member, "Resuming finished member");
                self.play_player(member);
            }
        }
    }
}

fn siblings(members: &[PlayerId], index: usize) -> impl Iterator<Item = (usize, PlayerId)> + '_ {
    members
        .iter()
        .copied()
        .enumerate()
        .filter(move |(other, _)| *other != index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(count: usize) -> Vec<PlayerId> {
        (0..count).map(PlayerId::from_index).collect()
    }

    #[test]
    fn test_seek_settles_after_every_member() {
        let mut state = ClusterState::new(ids(3));
        state.begin_seek(1200);
        assert!(state.is_seeking());
        assert_eq!(state.settle_seek(0), None);
        assert_eq!(state.settle_seek(2), None);
        assert_eq!(state.settle_seek(1), Some(1200));
        assert!(!state.is_seeking());
    }

    #[test]
    fn test_repeated_answer_from_one_member_does_not_settle() {
        let mut state = ClusterState::new(ids(2));
        state.begin_seek(500);
        assert_eq!(state.settle_seek(0), None);
        assert_eq!(state.settle_seek(0), None);
        assert_eq!(state.settle_seek(1), Some(500));
    }

    #[test]
    fn test_answer_without_seek_is_ignored() {
        let mut state = ClusterState::new(ids(2));
        assert_eq!(state.settle_seek(0), None);
    }

    #[test]
    fn test_siblings_skip_self() {
        let members = ids(3);
        let others: Vec<usize> = siblings(&members, 1).map(|(index, _)| index).collect();
        assert_eq!(others, vec![0, 2]);
    }
}
