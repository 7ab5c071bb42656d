//! # Lecture Playback Example
//!
//! Plays a lecture video next to a whiteboard replay that starts one second
//! later, driven from a background task through a `PlayerHandle`.
//!
//! Run with: `cargo run --example lecture_demo --package core-playback`

use bridge_traits::{DiscontinuityReason, EngineEvent, PlaybackEngine};
use core_playback::{EngineSink, PlayerEventKind, Result, Session, SessionConfig};
use core_runtime::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Wall-Clock Engine (for demonstration)
// ============================================================================

/// Engine that renders nothing and advances with the clock while playing.
struct ClockEngine {
    sink: EngineSink,
    duration: u64,
    base: u64,
    started: Option<Instant>,
}

impl ClockEngine {
    fn new(sink: EngineSink, duration: u64) -> Self {
        Self {
            sink,
            duration,
            base: 0,
            started: None,
        }
    }

    fn report(&self, event: EngineEvent) {
        if let Err(error) = self.sink.emit(event) {
            eprintln!("engine event dropped: {}", error);
        }
    }
}

impl PlaybackEngine for ClockEngine {
    fn prepare(&mut self) {
        self.report(EngineEvent::Ready);
    }

    fn play(&mut self, _when_ready: bool) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.base = self.current_position();
        self.started = None;
    }

    fn seek(&mut self, position_ms: u64) {
        self.base = position_ms.min(self.duration);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
        self.report(EngineEvent::PositionDiscontinuity(DiscontinuityReason::Seek));
    }

    fn current_position(&self) -> u64 {
        let elapsed = self
            .started
            .map_or(0, |since| since.elapsed().as_millis() as u64);
        (self.base + elapsed).min(self.duration)
    }

    fn duration(&self) -> u64 {
        self.duration
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let logging = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Info);
    if let Err(error) = init_logging(logging) {
        eprintln!("logging disabled: {}", error);
    }

    println!("=== Lecture Playback Demo ===\n");

    let mut session = Session::with_config(SessionConfig::responsive())?;
    let video = session.add_engine_with("video", |sink| ClockEngine::new(sink, 4000));
    let board = session.add_engine_with("whiteboard", |sink| ClockEngine::new(sink, 3000));
    let delayed = session.add_offset("whiteboard+1s", board, 1000)?;
    let lecture = session.add_cluster("lecture", vec![video, delayed])?;

    println!("Lecture duration: {} ms", session.duration(lecture)?);

    let handle = session.spawn(lecture)?;
    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.kind {
                PlayerEventKind::PhaseChanged(phase) => println!("  phase    -> {}", phase),
                PlayerEventKind::PositionChanged(position) => {
                    println!("  position -> {:>5} ms", position)
                }
                PlayerEventKind::SeekTo(position) => println!("  seek     -> {:>5} ms", position),
            }
        }
    });

    println!("\n▶️  Playing...");
    handle.play()?;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    println!("\n⏩ Seeking to 2500 ms...");
    handle.seek_to(2500)?;
    tokio::time::sleep(Duration::from_millis(2000)).await;

    let snapshot = handle.snapshot().await?;
    println!(
        "\n📊 {} is {} at {} / {} ms",
        snapshot.name, snapshot.phase, snapshot.position, snapshot.duration
    );

    println!("\n⏹️  Releasing...");
    handle.release()?;
    drop(handle);
    let _ = printer.await;

    println!("\n✅ Demo complete!");
    Ok(())
}
