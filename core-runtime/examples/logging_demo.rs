//! Logging system demonstration
//!
//! Shows the output formats and how a host sink sees player events.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example logging_demo
//!
//! # JSON format
//! cargo run --example logging_demo -- json
//!
//! # Compact format with a custom filter
//! cargo run --example logging_demo -- compact "core_runtime=trace"
//! ```

use core_runtime::logging::{
    default_directives, init_logging, LogFormat, LogLevel, LogRecord, LogSink, LoggingConfig,
};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, info_span, trace, warn};

/// Mirrors warnings and errors to stderr, the way a mobile host forwards
/// them to its native logger.
struct StderrSink;

impl LogSink for StderrSink {
    fn log(&self, record: LogRecord) {
        let fields: Vec<String> = record
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        eprintln!(
            "[host] {:?} {}: {} {}",
            record.level,
            record.target,
            record.message,
            fields.join(" ")
        );
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_sink(Arc::new(StderrSink));

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    println!("Default directives: {}", default_directives(LogLevel::Trace));

    if let Err(error) = init_logging(config) {
        eprintln!("Failed to initialize logging: {}", error);
        return;
    }

    info!(format = ?format, "Logging initialized");

    let span = info_span!("session", root = "lecture");
    let _enter = span.enter();

    debug!(player = "video", kind = "engine", "Player created");
    info!(player = "video", from = "Idle", to = "Ready", "Phase transition");
    trace!(player = "video", position = 250, "Tick");
    warn!(player = "whiteboard", reason = "PauseWhileIdle", "Input ignored");

    info!("Demo complete");
}
