//! Player diagnostics forwarded to a host log sink.
//!
//! Installs the global subscriber, so this binary holds a single test.

mod common;

use common::scripted;
use core_playback::Session;
use core_runtime::{init_logging, LogFormat, LogLevel, LogRecord, LogSink, LoggingConfig};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct HostSink {
    records: Mutex<Vec<LogRecord>>,
}

impl LogSink for HostSink {
    fn log(&self, record: LogRecord) {
        self.records.lock().push(record);
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

#[tokio::test(start_paused = true)]
async fn test_player_diagnostics_reach_host_sink() {
    let sink = Arc::new(HostSink::default());
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug)
            .with_sink(sink.clone()),
    )
    .unwrap();

    let mut session = Session::new();
    let (video, _probe) = scripted(&mut session, "video", 10_000);
    session.pause(video).unwrap();
    session.run_until_idle();

    let records = sink.records.lock();
    let created = records
        .iter()
        .find(|record| record.message == "Player created")
        .expect("creation logged");
    assert_eq!(created.level, LogLevel::Debug);
    assert_eq!(created.target, "core_playback::session");
    assert_eq!(created.fields.get("kind").map(String::as_str), Some("engine"));

    let ignored = records
        .iter()
        .find(|record| record.message == "Input ignored")
        .expect("ignored pause logged");
    assert_eq!(ignored.level, LogLevel::Warn);
    assert_eq!(ignored.fields.get("player").map(String::as_str), Some("video"));
    assert_eq!(
        ignored.fields.get("reason").map(String::as_str),
        Some("PauseWhileIdle")
    );
}
