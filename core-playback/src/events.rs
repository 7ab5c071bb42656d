//! # Player Events
//!
//! Notifications a player publishes to its subscribers and to its parent
//! composite. Every player owns a `tokio::sync::broadcast` channel; the
//! parent composite is always notified first, directly on the session queue.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::phase::Phase;

/// Stable identifier of a player inside its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(usize);

impl PlayerId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlayerEventKind {
    /// The observed phase changed. Never emitted twice in a row for the same
    /// phase.
    PhaseChanged(Phase),
    /// Periodic progress report, in the player's own timeline (ms).
    PositionChanged(u64),
    /// A seek completed at this position (ms).
    SeekTo(u64),
}

/// Notification published by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEvent {
    pub player: PlayerId,
    /// Player name, for logs and host UIs.
    pub name: String,
    pub kind: PlayerEventKind,
}

impl PlayerEvent {
    pub fn phase(&self) -> Option<Phase> {
        match self.kind {
            PlayerEventKind::PhaseChanged(phase) => Some(phase),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<u64> {
        match self.kind {
            PlayerEventKind::PositionChanged(position) => Some(position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let event = PlayerEvent {
            player: PlayerId::from_index(2),
            name: "video".to_string(),
            kind: PlayerEventKind::PhaseChanged(Phase::Ready),
        };
        assert_eq!(event.phase(), Some(Phase::Ready));
        assert_eq!(event.position(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(PlayerEventKind::SeekTo(1500)).unwrap();
        assert_eq!(json["type"], "seek_to");
        assert_eq!(json["value"], 1500);
    }
}
