//! Selection composite: chosen ranges of a player, back to back.

mod common;

use bridge_traits::{EngineError, EngineEvent};
use common::{drain, phases, positions, scripted, seeks, EngineProbe};
use core_playback::{Phase, PlaybackError, PlayerId, Selection, Session};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(250);

fn highlights(session: &mut Session) -> (PlayerId, EngineProbe) {
    let (video, probe) = scripted(session, "video", 10_000);
    let selection = session
        .add_selection(
            "highlights",
            video,
            vec![Selection::new(0, 1000), Selection::new(3000, 4000)],
        )
        .unwrap();
    (selection, probe)
}

#[tokio::test(start_paused = true)]
async fn test_selection_duration_is_sum_of_ranges() {
    let mut session = Session::new();
    let (selection, probe) = highlights(&mut session);

    assert_eq!(session.duration(selection).unwrap(), 2000);
    assert_eq!(session.children(selection).unwrap(), vec![probe.player]);

    let map = session.selection_map(selection).unwrap();
    assert_eq!(map.outer()[1], Selection::new(1000, 2000));
    assert!(matches!(
        session.selection_map(probe.player),
        Err(PlaybackError::WrongKind { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_selections_are_rejected() {
    let mut session = Session::new();
    let (video, _probe) = scripted(&mut session, "video", 10_000);

    assert_eq!(
        session.add_selection("empty", video, vec![]),
        Err(PlaybackError::EmptySelection)
    );
    assert_eq!(
        session.add_selection(
            "overlap",
            video,
            vec![Selection::new(0, 2000), Selection::new(1500, 3000)]
        ),
        Err(PlaybackError::UnsortedSelection { index: 1 })
    );
    // A failed construction leaves the child free.
    assert_eq!(session.parent(video).unwrap(), None);
    assert!(session
        .add_selection("ok", video, vec![Selection::new(0, 10)])
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_ready_positions_child_at_first_range() {
    let mut session = Session::new();
    let (video, probe) = scripted(&mut session, "video", 10_000);
    let selection = session
        .add_selection("late start", video, vec![Selection::new(2000, 3000)])
        .unwrap();

    session.prepare(selection).unwrap();
    session.run_until_idle();

    assert_eq!(session.phase(selection).unwrap(), Phase::Ready);
    assert!(probe.calls().contains(&"seek:2000".to_string()));
    assert_eq!(session.position(selection).unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_seek_maps_into_second_range() {
    let mut session = Session::new();
    let (selection, probe) = highlights(&mut session);
    let mut events = session.subscribe(selection).unwrap();

    session.play(selection).unwrap();
    session.run_until_idle();
    drain(&mut events);

    session.seek_to(selection, 1500).unwrap();
    session.run_until_idle();

    assert!(probe.calls().contains(&"seek:3500".to_string()));
    assert_eq!(seeks(&drain(&mut events)), vec![1500]);
    assert_eq!(session.position(selection).unwrap(), 1500);
}

#[tokio::test(start_paused = true)]
async fn test_playback_skips_the_gap() {
    let mut session = Session::new();
    let (selection, probe) = highlights(&mut session);
    let mut events = session.subscribe(selection).unwrap();

    session.play(selection).unwrap();
    session.run_until_idle();

    probe.set_position(600);
    session.run_for(TICK).await;
    probe.set_position(1000);
    session.run_for(TICK).await;
    assert!(probe.calls().contains(&"seek:3000".to_string()));

    probe.set_position(3400);
    session.run_for(TICK).await;

    let kinds = drain(&mut events);
    assert_eq!(positions(&kinds), vec![0, 600, 1400]);
    assert!(seeks(&kinds).is_empty());
    assert_eq!(session.phase(selection).unwrap(), Phase::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_selection_ends_after_last_range() {
    let mut session = Session::new();
    let (selection, probe) = highlights(&mut session);
    let mut events = session.subscribe(selection).unwrap();

    session.play(selection).unwrap();
    session.run_until_idle();
    session.seek_to(selection, 1800).unwrap();
    session.run_until_idle();

    probe.set_position(4000);
    session.run_for(TICK).await;

    assert_eq!(session.phase(selection).unwrap(), Phase::End);
    assert!(!probe.is_playing());
    let seen = phases(&drain(&mut events));
    assert_eq!(seen, vec![Phase::Ready, Phase::Playing, Phase::End]);
}

#[tokio::test(start_paused = true)]
async fn test_seek_past_end_parks_selection() {
    let mut session = Session::new();
    let (selection, _probe) = highlights(&mut session);

    session.play(selection).unwrap();
    session.run_until_idle();
    session.seek_to(selection, 5000).unwrap();
    session.run_until_idle();

    assert_eq!(session.phase(selection).unwrap(), Phase::End);
    assert_eq!(session.position(selection).unwrap(), 2000);
}

#[tokio::test(start_paused = true)]
async fn test_only_last_of_rapid_seeks_is_announced() {
    let mut session = Session::new();
    let (selection, _probe) = highlights(&mut session);
    let mut events = session.subscribe(selection).unwrap();

    session.play(selection).unwrap();
    session.run_until_idle();
    drain(&mut events);

    session.seek_to(selection, 200).unwrap();
    session.seek_to(selection, 1200).unwrap();
    session.run_until_idle();

    assert_eq!(seeks(&drain(&mut events)), vec![1200]);
    assert_eq!(session.position(selection).unwrap(), 1200);
}

#[tokio::test(start_paused = true)]
async fn test_child_error_surfaces_on_selection() {
    let mut session = Session::new();
    let (selection, probe) = highlights(&mut session);

    session.play(selection).unwrap();
    session.run_until_idle();
    probe.emit(EngineEvent::Error(EngineError::Source("gone".into())));
    session.run_until_idle();

    assert_eq!(session.phase(selection).unwrap(), Phase::Idle);
    assert_eq!(
        session.error(selection).unwrap(),
        Some(EngineError::Source("gone".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_child_buffering_is_mirrored() {
    let mut session = Session::new();
    let (selection, probe) = highlights(&mut session);

    session.play(selection).unwrap();
    session.run_until_idle();

    probe.emit(EngineEvent::Buffering);
    session.run_until_idle();
    assert_eq!(session.phase(selection).unwrap(), Phase::Buffering);

    probe.emit(EngineEvent::Ready);
    session.run_until_idle();
    assert_eq!(session.phase(selection).unwrap(), Phase::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_stop_parks_selection_at_end() {
    let mut session = Session::new();
    let (selection, probe) = highlights(&mut session);
    let mut events = session.subscribe(selection).unwrap();

    session.play(selection).unwrap();
    session.run_until_idle();
    drain(&mut events);

    session.stop(selection).unwrap();
    session.run_until_idle();

    assert_eq!(session.phase(selection).unwrap(), Phase::End);
    assert_eq!(session.position(selection).unwrap(), 2000);
    assert!(!probe.is_playing());
    assert_eq!(phases(&drain(&mut events)), vec![Phase::End]);
}
