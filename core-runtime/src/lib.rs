//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the player crates:
//! - Logging and tracing setup
//! - Forwarding of log records to a host logger
//!
//! ## Overview
//!
//! The player core only emits `tracing` events. This crate decides where they
//! go: stdout in one of three formats, and optionally a host [`LogSink`]
//! (`os_log`, Logcat, a browser console bridge).

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LogRecord, LogSink, LoggingConfig};
