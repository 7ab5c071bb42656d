//! Workspace placeholder crate.
//!
//! This crate exposes shared feature flags that map to the individual
//! workspace crates (`core-playback`, `core-runtime`, `bridge-traits`).
//! Host applications can depend on `syncplay-workspace` and enable the
//! documented features without wiring each crate individually.

#[cfg(feature = "playback")]
pub use bridge_traits as engine;
#[cfg(feature = "playback")]
pub use core_playback as playback;
#[cfg(feature = "logging")]
pub use core_runtime as runtime;
