//! # Playback Error Types
//!
//! Errors returned by the player session and its handles.

use bridge_traits::EngineError;
use thiserror::Error;

use crate::events::PlayerId;

/// Errors that can occur while building or driving players.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// No player with this id exists in the session.
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    /// The player was released and accepts no further operations.
    #[error("Player {0} has been released")]
    Released(PlayerId),

    /// The operation only applies to another kind of player.
    #[error("Player {player} is not a {expected} player")]
    WrongKind {
        player: PlayerId,
        expected: &'static str,
    },

    // ========================================================================
    // Ownership Errors
    // ========================================================================
    /// Commands must go to the root composite, not to one of its children.
    #[error("Player {child} is owned by composite {parent}")]
    Owned { child: PlayerId, parent: PlayerId },

    /// A player can belong to at most one composite.
    #[error("Player {0} already belongs to a composite")]
    AlreadyOwned(PlayerId),

    /// The same player was listed twice for one cluster.
    #[error("Player {0} appears more than once in the cluster")]
    DuplicateMember(PlayerId),

    // ========================================================================
    // Construction Errors
    // ========================================================================
    #[error("Cluster requires at least one member")]
    EmptyCluster,

    #[error("Selection list is empty")]
    EmptySelection,

    /// A selection whose end does not lie after its start.
    #[error("Selection {index} is empty or inverted: [{start}, {end})")]
    InvalidSelection { index: usize, start: u64, end: u64 },

    /// Selections must be sorted by start and must not overlap.
    #[error("Selection {index} overlaps or precedes the previous selection")]
    UnsortedSelection { index: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// The session task has stopped; the handle is dangling.
    #[error("Player session has shut down")]
    SessionClosed,

    /// The player recorded an engine failure.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl PlaybackError {
    /// Whether the error is caused by the caller rather than by an engine.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, Self::Engine(_) | Self::SessionClosed)
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_classification() {
        assert!(PlaybackError::EmptyCluster.is_usage_error());
        assert!(PlaybackError::Released(PlayerId::from_index(3)).is_usage_error());
        assert!(!PlaybackError::SessionClosed.is_usage_error());
        assert!(!PlaybackError::from(EngineError::Network("reset".into())).is_usage_error());
    }

    #[test]
    fn test_messages_name_players() {
        let err = PlaybackError::Owned {
            child: PlayerId::from_index(1),
            parent: PlayerId::from_index(4),
        };
        assert_eq!(err.to_string(), "Player #1 is owned by composite #4");
    }
}
