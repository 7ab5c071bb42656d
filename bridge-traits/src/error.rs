use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a host playback engine.
///
/// Engines surface these through [`EngineEvent::Error`](crate::engine::EngineEvent::Error);
/// the player core records the most recent one and drops back to `Idle`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum EngineError {
    #[error("Decode failure: {0}")]
    Decode(String),

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Source unavailable: {0}")]
    Source(String),

    #[error("Engine error: {0}")]
    Other(String),
}

impl EngineError {
    /// Human-readable message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Decode(msg) | Self::Network(msg) | Self::Source(msg) | Self::Other(msg) => msg,
        }
    }

    /// Network failures are usually transient; hosts may choose to re-prepare.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = EngineError::Network("connection reset".to_string());
        assert_eq!(err.to_string(), "Network failure: connection reset");
        assert_eq!(err.message(), "connection reset");
    }

    #[test]
    fn test_transient_classification() {
        assert!(EngineError::Network("timeout".into()).is_transient());
        assert!(!EngineError::Decode("bad frame".into()).is_transient());
        assert!(!EngineError::Source("404".into()).is_transient());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(EngineError::Decode("bad header".into())).unwrap();
        assert_eq!(json["kind"], "decode");
        assert_eq!(json["message"], "bad header");
    }
}
