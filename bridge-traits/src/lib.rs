//! # Host Bridge Traits
//!
//! The contract between the synchronized player core and the host media
//! engines it drives.
//!
//! ## Overview
//!
//! Every concrete renderer (a video decoder, a whiteboard replayer) lives in
//! the host application. The core only sees it through [`PlaybackEngine`]
//! and hears back from it through [`EngineEvent`]s.
//!
//! ## Error Handling
//!
//! Engines report failures as [`EngineError`]. Hosts should:
//!
//! - Convert platform-specific errors to `EngineError`
//! - Provide actionable error messages
//!
//! ## Thread Safety
//!
//! Engines are moved into the player session and must be `Send`. Events may
//! be emitted from any thread; the core marshals them onto its own queue.

pub mod engine;
pub mod error;

pub use engine::{DiscontinuityReason, EngineEvent, PlaybackEngine, ViewContainer};
pub use error::EngineError;
