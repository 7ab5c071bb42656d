//! # Selection
//!
//! Plays only chosen ranges of a child player, stitched into one contiguous
//! timeline.
//!
//! ```text
//! inner:  [0, 1000)        [3000, 4000)
//! outer:  [0, 1000)[1000, 2000)
//! ```
//!
//! The composite seeks the child over the gaps as playback reaches them, and
//! translates positions and seeks between the two timelines.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlaybackError, Result};
use crate::events::{PlayerEventKind, PlayerId};
use crate::phase::{Phase, Signal};
use crate::seek::{SeekLedger, SeekOrigin};
use crate::session::{Kind, Session};

/// Half-open range `[start, end)` in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub start: u64,
    pub end: u64,
}

impl Selection {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Inclusive on both ends.
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }
}

/// Validated list of child ranges together with their stitched layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMap {
    inner: Vec<Selection>,
    outer: Vec<Selection>,
}

impl SelectionMap {
    pub fn new(selections: Vec<Selection>) -> Result<Self> {
        if selections.is_empty() {
            return Err(PlaybackError::EmptySelection);
        }

        for (index, selection) in selections.iter().enumerate() {
            if selection.start >= selection.end {
                return Err(PlaybackError::InvalidSelection {
                    index,
                    start: selection.start,
                    end: selection.end,
                });
            }
            if index > 0 && selections[index - 1].end > selection.start {
                return Err(PlaybackError::UnsortedSelection { index });
            }
        }

        let mut cursor = 0;
        let outer = selections
            .iter()
            .map(|selection| {
                let stitched = Selection::new(cursor, cursor + selection.duration());
                cursor = stitched.end;
                stitched
            })
            .collect();

        Ok(Self {
            inner: selections,
            outer,
        })
    }

    /// Ranges in the child's timeline.
    pub fn inner(&self) -> &[Selection] {
        &self.inner
    }

    /// Ranges in the stitched timeline.
    pub fn outer(&self) -> &[Selection] {
        &self.outer
    }

    /// Sum of all range lengths.
    pub fn duration(&self) -> u64 {
        self.outer.last().map_or(0, |selection| selection.end)
    }

    /// First range whose child-timeline end lies after `position`.
    pub fn inner_index(&self, position: u64) -> Option<usize> {
        self.inner.iter().position(|selection| position < selection.end)
    }

    fn outer_index(&self, position: u64) -> Option<usize> {
        self.outer.iter().position(|selection| position < selection.end)
    }

    /// Stitched position to child position. Positions at or past the end map
    /// to the end of the last range.
    pub fn in_from_out(&self, position: u64) -> u64 {
        match self.outer_index(position) {
            Some(index) => self.inner[index].start + (position - self.outer[index].start),
            None => self.last_inner_end(),
        }
    }

    /// Child position to stitched position. A position inside a gap maps to
    /// the start of the range that follows it.
    pub fn out_from_in(&self, position: u64) -> u64 {
        match self.inner_index(position) {
            Some(index) => {
                let range = self.inner[index];
                self.outer[index].start + position.saturating_sub(range.start)
            }
            None => self.duration(),
        }
    }

    fn last_inner_end(&self) -> u64 {
        self.inner.last().map_or(0, |selection| selection.end)
    }

    /// Range the child is inside of, or the range just before the gap it is
    /// in. `None` before the first range.
    fn landing_index(&self, position: u64) -> Option<usize> {
        let index = self.inner_index(position)?;
        if position < self.inner[index].start {
            index.checked_sub(1)
        } else {
            Some(index)
        }
    }
}

#[derive(Debug)]
pub(crate) struct SelectionState {
    pub(crate) child: PlayerId,
    pub(crate) map: SelectionMap,
    current: Option<usize>,
    seeks: SeekLedger,
}

impl SelectionState {
    pub(crate) fn new(child: PlayerId, map: SelectionMap) -> Self {
        Self {
            child,
            map,
            current: None,
            seeks: SeekLedger::default(),
        }
    }
}

/// What to do with a child position report.
enum Advance {
    /// A seek is in flight; the report predates it.
    Drop,
    PastEnd,
    SkipTo(u64),
    Forward(u64),
}

impl Session {
    fn selection_state(&self, id: PlayerId) -> Option<&SelectionState> {
        match &self.node(id).kind {
            Kind::Selection(selection) => Some(selection),
            _ => None,
        }
    }

    fn selection_state_mut(&mut self, id: PlayerId) -> Option<&mut SelectionState> {
        match &mut self.node_mut(id).kind {
            Kind::Selection(selection) => Some(selection),
            _ => None,
        }
    }

    pub(crate) fn selection_seek(&mut self, id: PlayerId, position: u64) {
        let Some(state) = self.selection_state_mut(id) else {
            return;
        };
        let target = state.map.in_from_out(position);
        state.seeks.issue(SeekOrigin::Caller);
        let child = state.child;

        self.seek_player(child, target);
    }

    pub(crate) fn selection_on_child(&mut self, id: PlayerId, child: PlayerId, kind: PlayerEventKind) {
        match kind {
            PlayerEventKind::PhaseChanged(phase) => self.selection_on_child_phase(id, child, phase),
            PlayerEventKind::PositionChanged(position) => self.selection_on_position(id, child, position),
            PlayerEventKind::SeekTo(position) => self.selection_on_seek_echo(id, position),
        }
    }

    fn selection_on_child_phase(&mut self, id: PlayerId, child: PlayerId, phase: Phase) {
        if self.phase_of(child) != phase {
            debug!(player = %self.node(id).name, phase = %phase, "Stale child phase skipped");
            return;
        }

        let signal = match phase {
            Phase::Ready => {
                let Some(state) = self.selection_state_mut(id) else {
                    return;
                };
                let start = state.map.inner()[0].start;
                state.current = Some(0);
                state.seeks.issue(SeekOrigin::Internal);

                self.seek_player(child, start);
                Signal::Ready
            }
            Phase::Playing => Signal::Playing,
            Phase::Paused => Signal::Paused,
            Phase::Buffering => Signal::Buffering,
            Phase::End => Signal::End,
            Phase::Idle => match self.node(child).error.clone() {
                Some(error) => Signal::Error(error),
                None => return,
            },
        };
        self.post_signal(id, signal);
    }

    fn selection_on_seek_echo(&mut self, id: PlayerId, position: u64) {
        let Some(state) = self.selection_state_mut(id) else {
            return;
        };
        state.current = state.map.landing_index(position);

        match state.seeks.settle() {
            Some(SeekOrigin::Caller) if !state.seeks.caller_pending() => {
                let stitched = state.map.out_from_in(position);
                self.notify(id, PlayerEventKind::SeekTo(stitched));
            }
            Some(SeekOrigin::Caller) => {
                debug!(player = %self.node(id).name, position, "Superseded seek echo dropped");
            }
            Some(SeekOrigin::Internal) => {}
            None => debug!(player = %self.node(id).name, position, "Unsolicited seek echo"),
        }
    }

    fn selection_on_position(&mut self, id: PlayerId, child: PlayerId, position: u64) {
        let Some(state) = self.selection_state_mut(id) else {
            return;
        };

        let advance = if !state.seeks.is_settled() {
            Advance::Drop
        } else {
            let ranges = state.map.inner();
            match state.map.inner_index(position) {
                None => Advance::PastEnd,
                Some(index) => {
                    let next = state.current.map_or(0, |current| current + 1);
                    if index == next && position < ranges[index].start {
                        state.seeks.issue(SeekOrigin::Internal);
                        Advance::SkipTo(ranges[index].start)
                    } else {
                        if index == next {
                            state.current = Some(index);
                        }
                        Advance::Forward(state.map.out_from_in(position))
                    }
                }
            }
        };

        match advance {
            Advance::Drop => {}
            Advance::PastEnd => {
                if self.phase_of(id) != Phase::End {
                    debug!(player = %self.node(id).name, position, "Selection finished");
                    self.pause_player(child);
                    self.transition(id, Phase::End);
                }
            }
            Advance::SkipTo(start) => {
                debug!(player = %self.node(id).name, from = position, to = start, "Skipping gap");
                self.seek_player(child, start);
            }
            Advance::Forward(stitched) => self.notify(id, PlayerEventKind::PositionChanged(stitched)),
        }
    }

    /// Range layout of a selection player, for hosts that draw its timeline.
    pub fn selection_map(&self, id: PlayerId) -> Result<&SelectionMap> {
        self.live(id)?;
        self.selection_state(id)
            .map(|state| &state.map)
            .ok_or(PlaybackError::WrongKind {
                player: id,
                expected: "selection",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(ranges: &[(u64, u64)]) -> SelectionMap {
        SelectionMap::new(
            ranges
                .iter()
                .map(|&(start, end)| Selection::new(start, end))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_outer_layout_is_prefix_sum() {
        let map = map(&[(0, 1000), (3000, 4000), (6000, 6500)]);
        assert_eq!(
            map.outer(),
            &[
                Selection::new(0, 1000),
                Selection::new(1000, 2000),
                Selection::new(2000, 2500)
            ]
        );
        assert_eq!(map.duration(), 2500);
    }

    #[test]
    fn test_in_from_out() {
        let map = map(&[(0, 1000), (3000, 4000)]);
        assert_eq!(map.in_from_out(0), 0);
        assert_eq!(map.in_from_out(999), 999);
        assert_eq!(map.in_from_out(1000), 3000);
        assert_eq!(map.in_from_out(1500), 3500);
        assert_eq!(map.in_from_out(2000), 4000);
        assert_eq!(map.in_from_out(9000), 4000);
    }

    #[test]
    fn test_out_from_in_snaps_gaps_forward() {
        let map = map(&[(500, 1000), (3000, 4000)]);
        assert_eq!(map.out_from_in(0), 0);
        assert_eq!(map.out_from_in(700), 200);
        assert_eq!(map.out_from_in(2000), 500);
        assert_eq!(map.out_from_in(3250), 750);
        assert_eq!(map.out_from_in(4000), 1500);
    }

    #[test]
    fn test_round_trip_within_range() {
        let map = map(&[(100, 900), (1200, 1300), (5000, 8000)]);
        for position in (0..map.duration()).step_by(37) {
            assert_eq!(map.out_from_in(map.in_from_out(position)), position);
        }
    }

    #[test]
    fn test_landing_index() {
        let map = map(&[(500, 1000), (3000, 4000)]);
        assert_eq!(map.landing_index(100), None);
        assert_eq!(map.landing_index(600), Some(0));
        assert_eq!(map.landing_index(2000), Some(0));
        assert_eq!(map.landing_index(3000), Some(1));
        assert_eq!(map.landing_index(4000), None);
    }

    #[test]
    fn test_validation() {
        assert_eq!(SelectionMap::new(vec![]), Err(PlaybackError::EmptySelection));
        assert_eq!(
            SelectionMap::new(vec![Selection::new(10, 10)]),
            Err(PlaybackError::InvalidSelection {
                index: 0,
                start: 10,
                end: 10
            })
        );
        assert_eq!(
            SelectionMap::new(vec![Selection::new(0, 100), Selection::new(50, 200)]),
            Err(PlaybackError::UnsortedSelection { index: 1 })
        );
        assert!(SelectionMap::new(vec![Selection::new(0, 100), Selection::new(100, 200)]).is_ok());
    }

    #[test]
    fn test_selection_helpers() {
        let selection = Selection::new(3000, 4000);
        assert_eq!(selection.duration(), 1000);
        assert!(selection.contains(3000));
        assert!(selection.contains(4000));
        assert!(!selection.contains(4001));
    }
}
