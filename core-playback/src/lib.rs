//! # Synchronized Playback Core
//!
//! Composable media players that share one phase model.
//!
//! ## Overview
//!
//! This crate provides:
//! - A phase state machine shared by every player (Idle, Ready, Paused,
//!   Playing, Buffering, End) that tracks caller intent separately from
//!   what the player is actually doing
//! - Engine-backed leaves driven through [`bridge_traits::PlaybackEngine`]
//! - Fillers: silent, timer-driven players of fixed length
//! - Composites that are players themselves:
//!   - **Offset**: delays a player by a stretch of silence
//!   - **Selection**: plays chosen ranges of a player back to back
//!   - **Cluster**: plays several players in lockstep
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{Session, Selection};
//!
//! let mut session = Session::new();
//! let video = session.add_engine("video", host_video_engine);
//! let board = session.add_engine("whiteboard", host_board_engine);
//! let delayed = session.add_offset("whiteboard+2s", board, 2000)?;
//! let lecture = session.add_cluster("lecture", vec![video, delayed])?;
//!
//! let handle = session.spawn(lecture)?;
//! handle.play()?;
//! ```

mod atom;
mod cluster;
pub mod config;
pub mod error;
pub mod events;
mod filler;
pub mod handle;
mod offset;
pub mod phase;
mod seek;
pub mod selection;
pub mod session;
mod ticker;

pub use atom::EngineSink;
pub use config::SessionConfig;
pub use error::{PlaybackError, Result};
pub use events::{PlayerEvent, PlayerEventKind, PlayerId};
pub use handle::PlayerHandle;
pub use phase::{Phase, TargetPhase};
pub use selection::{Selection, SelectionMap};
pub use session::{PlayerSnapshot, Session};
