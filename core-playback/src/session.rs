//! # Player Session
//!
//! A session owns a tree of players (engine leaves, fillers and composites)
//! and a single serial queue. Everything that changes player state runs on
//! that queue, one task at a time:
//!
//! - engine events pushed through an [`EngineSink`]
//! - phase, position and seek notifications on their way to parents and
//!   subscribers
//! - internal signals raised by composites
//! - position ticks
//!
//! Caller commands are applied synchronously against the current state and
//! only enqueue follow-up work, so they never block.
//!
//! ## Ownership
//!
//! A player belongs to at most one composite. Only root players (those
//! without a parent) accept commands; queries work on any player.
//!
//! ## Driving the queue
//!
//! Tests and hosts that own the session call [`Session::run_until_idle`] or
//! [`Session::run_for`]. Hosts that want a background task call
//! [`Session::spawn`](crate::handle) and talk to the returned
//! [`PlayerHandle`](crate::handle::PlayerHandle).

use bridge_traits::{EngineError, PlaybackEngine, ViewContainer};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::atom::EngineSink;
use crate::cluster::ClusterState;
use crate::config::SessionConfig;
use crate::error::{PlaybackError, Result};
use crate::events::{PlayerEvent, PlayerEventKind, PlayerId};
use crate::filler::FillerClock;
use crate::offset::OffsetState;
use crate::phase::{
    reduce_intent, reduce_signal, Effect, Intent, Phase, PhaseState, Signal, Step, TargetPhase,
    Timeline,
};
use crate::selection::{Selection, SelectionMap, SelectionState};
use crate::ticker::PositionTicker;

// ============================================================================
// Queue & Arena
// ============================================================================

/// Unit of work on the session queue.
#[derive(Debug)]
pub(crate) enum Task {
    /// Hand a notification to the parent composite, then to subscribers.
    Deliver {
        player: PlayerId,
        kind: PlayerEventKind,
    },
    /// Fold an internal signal into a player's state.
    Signal { player: PlayerId, signal: Signal },
    /// Interpret an event reported by an engine.
    Engine {
        player: PlayerId,
        event: bridge_traits::EngineEvent,
    },
    /// Position tick for a polled player.
    Tick { player: PlayerId, generation: u64 },
}

pub(crate) enum Kind {
    Engine(Box<dyn PlaybackEngine>),
    Filler(FillerClock),
    Offset(OffsetState),
    Selection(SelectionState),
    Cluster(ClusterState),
}

impl Kind {
    fn label(&self) -> &'static str {
        match self {
            Self::Engine(_) => "engine",
            Self::Filler(_) => "filler",
            Self::Offset(_) => "offset",
            Self::Selection(_) => "selection",
            Self::Cluster(_) => "cluster",
        }
    }

    fn children(&self) -> Vec<PlayerId> {
        match self {
            Self::Engine(_) | Self::Filler(_) => Vec::new(),
            Self::Offset(offset) => vec![offset.filler, offset.inner],
            Self::Selection(selection) => vec![selection.child],
            Self::Cluster(cluster) => cluster.members.clone(),
        }
    }

    /// Whether the session has to poll this player for its position.
    fn polls_position(&self) -> bool {
        match self {
            Self::Engine(engine) => !engine.reports_position(),
            Self::Filler(_) => true,
            _ => false,
        }
    }
}

pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) state: PhaseState,
    pub(crate) error: Option<EngineError>,
    pub(crate) speed: f32,
    pub(crate) parent: Option<PlayerId>,
    pub(crate) released: bool,
    pub(crate) ticker: PositionTicker,
    pub(crate) events: broadcast::Sender<PlayerEvent>,
    pub(crate) kind: Kind,
}

/// Point-in-time view of one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub player: PlayerId,
    pub name: String,
    pub phase: Phase,
    pub target: Option<TargetPhase>,
    pub position: u64,
    pub duration: u64,
    pub playback_speed: f32,
    pub error: Option<EngineError>,
}

impl PlayerSnapshot {
    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Owner of a tree of players and their serial queue.
pub struct Session {
    pub(crate) config: SessionConfig,
    nodes: Vec<Node>,
    queue_tx: mpsc::UnboundedSender<Task>,
    pub(crate) queue_rx: mpsc::UnboundedReceiver<Task>,
}

impl Default for Session {
    fn default() -> Self {
        Self::build(SessionConfig::default())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("players", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with custom timing.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidConfig`] if the configuration is out of range.
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        Ok(Self::build(config.validated()?))
    }

    fn build(config: SessionConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            config,
            nodes: Vec::new(),
            queue_tx,
            queue_rx,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Add a leaf player backed by a host engine.
    pub fn add_engine<E>(&mut self, name: impl Into<String>, engine: E) -> PlayerId
    where
        E: PlaybackEngine,
    {
        self.insert(name.into(), Kind::Engine(Box::new(engine)))
    }

    /// Add a leaf player whose engine needs its event sink at construction.
    pub fn add_engine_with<E, F>(&mut self, name: impl Into<String>, build: F) -> PlayerId
    where
        E: PlaybackEngine,
        F: FnOnce(EngineSink) -> E,
    {
        let id = PlayerId::from_index(self.nodes.len());
        let engine = build(EngineSink::new(id, self.queue_tx.clone()));
        self.insert(name.into(), Kind::Engine(Box::new(engine)))
    }

    /// Sink through which the engine behind `id` reports its events.
    pub fn engine_sink(&self, id: PlayerId) -> Result<EngineSink> {
        match self.live(id)?.kind {
            Kind::Engine(_) => Ok(EngineSink::new(id, self.queue_tx.clone())),
            _ => Err(PlaybackError::WrongKind {
                player: id,
                expected: "engine",
            }),
        }
    }

    /// Add a silent timer-driven player of fixed length.
    pub fn add_filler(&mut self, name: impl Into<String>, duration_ms: u64) -> PlayerId {
        self.insert(name.into(), Kind::Filler(FillerClock::new(duration_ms)))
    }

    /// Delay `player` by `offset_ms` of silence.
    pub fn add_offset(
        &mut self,
        name: impl Into<String>,
        player: PlayerId,
        offset_ms: u64,
    ) -> Result<PlayerId> {
        let name = name.into();
        self.ensure_adoptable(player)?;

        let filler = self.add_filler(format!("{}/filler", name), offset_ms);
        let id = self.insert(name, Kind::Offset(OffsetState::new(filler, player, offset_ms)));
        self.adopt(id, filler);
        self.adopt(id, player);
        Ok(id)
    }

    /// Play only the given ranges of `player`, back to back.
    ///
    /// # Errors
    ///
    /// Selections must be non-empty, each with `start < end`, sorted and
    /// non-overlapping.
    pub fn add_selection(
        &mut self,
        name: impl Into<String>,
        player: PlayerId,
        selections: Vec<Selection>,
    ) -> Result<PlayerId> {
        let map = SelectionMap::new(selections)?;
        self.ensure_adoptable(player)?;

        let id = self.insert(name.into(), Kind::Selection(SelectionState::new(player, map)));
        self.adopt(id, player);
        Ok(id)
    }

    /// Play `members` in lockstep.
    pub fn add_cluster(&mut self, name: impl Into<String>, members: Vec<PlayerId>) -> Result<PlayerId> {
        if members.is_empty() {
            return Err(PlaybackError::EmptyCluster);
        }

        let mut seen = HashSet::new();
        for &member in &members {
            if !seen.insert(member) {
                return Err(PlaybackError::DuplicateMember(member));
            }
            self.ensure_adoptable(member)?;
        }

        let id = self.insert(name.into(), Kind::Cluster(ClusterState::new(members.clone())));
        for member in members {
            self.adopt(id, member);
        }
        Ok(id)
    }

    fn insert(&mut self, name: String, kind: Kind) -> PlayerId {
        let id = PlayerId::from_index(self.nodes.len());
        let (events, _) = broadcast::channel(self.config.event_buffer);
        debug!(player = %name, id = %id, kind = kind.label(), "Player created");

        self.nodes.push(Node {
            name,
            state: PhaseState::default(),
            error: None,
            speed: 1.0,
            parent: None,
            released: false,
            ticker: PositionTicker::new(self.config.tick_interval),
            events,
            kind,
        });
        id
    }

    fn ensure_adoptable(&self, child: PlayerId) -> Result<()> {
        if self.live(child)?.parent.is_some() {
            return Err(PlaybackError::AlreadyOwned(child));
        }
        Ok(())
    }

    fn adopt(&mut self, parent: PlayerId, child: PlayerId) {
        self.node_mut(child).parent = Some(parent);
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub(crate) fn node(&self, id: PlayerId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: PlayerId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    fn lookup(&self, id: PlayerId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .ok_or(PlaybackError::UnknownPlayer(id))
    }

    pub(crate) fn live(&self, id: PlayerId) -> Result<&Node> {
        let node = self.lookup(id)?;
        if node.released {
            return Err(PlaybackError::Released(id));
        }
        Ok(node)
    }

    pub(crate) fn ensure_root(&self, id: PlayerId) -> Result<()> {
        match self.live(id)?.parent {
            Some(parent) => Err(PlaybackError::Owned { child: id, parent }),
            None => Ok(()),
        }
    }

    pub(crate) fn phase_of(&self, id: PlayerId) -> Phase {
        self.node(id).state.observed
    }

    pub(crate) fn is_released(&self, id: PlayerId) -> bool {
        self.lookup(id).map_or(true, |node| node.released)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start loading. No-op if already preparing or prepared.
    pub fn prepare(&mut self, id: PlayerId) -> Result<()> {
        self.ensure_root(id)?;
        self.apply_intent(id, Intent::Prepare);
        Ok(())
    }

    /// Play, preparing first if needed.
    pub fn play(&mut self, id: PlayerId) -> Result<()> {
        self.ensure_root(id)?;
        self.apply_intent(id, Intent::Play);
        Ok(())
    }

    pub fn pause(&mut self, id: PlayerId) -> Result<()> {
        self.ensure_root(id)?;
        self.apply_intent(id, Intent::Pause);
        Ok(())
    }

    /// Seek and park at the end of the timeline.
    pub fn stop(&mut self, id: PlayerId) -> Result<()> {
        self.ensure_root(id)?;
        self.apply_intent(id, Intent::Stop);
        Ok(())
    }

    /// Seek to `position_ms`. Completion is announced with a
    /// [`PlayerEventKind::SeekTo`] notification.
    pub fn seek_to(&mut self, id: PlayerId, position_ms: u64) -> Result<()> {
        self.ensure_root(id)?;
        self.apply_intent(id, Intent::SeekTo(position_ms));
        Ok(())
    }

    /// Release the player and everything it owns. Further operations on any
    /// of them fail with [`PlaybackError::Released`].
    pub fn release(&mut self, id: PlayerId) -> Result<()> {
        self.ensure_root(id)?;
        self.release_player(id);
        Ok(())
    }

    pub fn set_playback_speed(&mut self, id: PlayerId, speed: f32) -> Result<()> {
        self.ensure_root(id)?;
        if !(speed.is_finite() && speed > 0.0) {
            return Err(PlaybackError::InvalidConfig(format!(
                "playback speed must be positive, got {}",
                speed
            )));
        }
        self.apply_speed(id, speed);
        Ok(())
    }

    /// Route a rendering surface to every engine under `id`.
    pub fn attach_view(&mut self, id: PlayerId, container: ViewContainer) -> Result<()> {
        self.ensure_root(id)?;
        self.route_view(id, &container);
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn phase(&self, id: PlayerId) -> Result<Phase> {
        Ok(self.live(id)?.state.observed)
    }

    pub fn target_phase(&self, id: PlayerId) -> Result<Option<TargetPhase>> {
        Ok(self.live(id)?.state.intent)
    }

    pub fn is_playing(&self, id: PlayerId) -> Result<bool> {
        Ok(self.live(id)?.state.is_playing())
    }

    /// Whether this player recorded an error. Composites only report their
    /// own error, not a member's.
    pub fn is_error(&self, id: PlayerId) -> Result<bool> {
        Ok(self.live(id)?.error.is_some())
    }

    pub fn error(&self, id: PlayerId) -> Result<Option<EngineError>> {
        Ok(self.live(id)?.error.clone())
    }

    /// `Err(PlaybackError::Engine)` if the player recorded an error.
    pub fn ensure_healthy(&self, id: PlayerId) -> Result<()> {
        match &self.live(id)?.error {
            Some(error) => Err(PlaybackError::Engine(error.clone())),
            None => Ok(()),
        }
    }

    pub fn position(&self, id: PlayerId) -> Result<u64> {
        self.live(id)?;
        Ok(self.position_of(id))
    }

    pub fn duration(&self, id: PlayerId) -> Result<u64> {
        self.live(id)?;
        Ok(self.duration_of(id))
    }

    pub fn playback_speed(&self, id: PlayerId) -> Result<f32> {
        Ok(self.live(id)?.speed)
    }

    pub fn name(&self, id: PlayerId) -> Result<&str> {
        Ok(self.live(id)?.name.as_str())
    }

    pub fn parent(&self, id: PlayerId) -> Result<Option<PlayerId>> {
        Ok(self.live(id)?.parent)
    }

    /// Players owned by `id`. For an offset: the internal filler, then the
    /// wrapped player.
    pub fn children(&self, id: PlayerId) -> Result<Vec<PlayerId>> {
        Ok(self.live(id)?.kind.children())
    }

    /// Subscribe to the player's notifications.
    pub fn subscribe(&self, id: PlayerId) -> Result<broadcast::Receiver<PlayerEvent>> {
        Ok(self.live(id)?.events.subscribe())
    }

    pub fn snapshot(&self, id: PlayerId) -> Result<PlayerSnapshot> {
        let node = self.live(id)?;
        Ok(PlayerSnapshot {
            player: id,
            name: node.name.clone(),
            phase: node.state.observed,
            target: node.state.intent,
            position: self.position_of(id),
            duration: self.duration_of(id),
            playback_speed: node.speed,
            error: node.error.clone(),
        })
    }

    pub(crate) fn position_of(&self, id: PlayerId) -> u64 {
        let node = self.node(id);
        match &node.kind {
            Kind::Engine(engine) => engine.current_position(),
            Kind::Filler(clock) => clock.position(node.speed, Instant::now()),
            Kind::Offset(offset) => match offset.active_child() {
                child if child == offset.filler => self.position_of(child),
                child => self.position_of(child) + offset.offset,
            },
            Kind::Selection(selection) => selection.map.out_from_in(self.position_of(selection.child)),
            Kind::Cluster(cluster) => cluster.position,
        }
    }

    pub(crate) fn duration_of(&self, id: PlayerId) -> u64 {
        match &self.node(id).kind {
            Kind::Engine(engine) => engine.duration(),
            Kind::Filler(clock) => clock.duration(),
            Kind::Offset(offset) => self.duration_of(offset.inner) + offset.offset,
            Kind::Selection(selection) => selection.map.duration(),
            Kind::Cluster(cluster) => cluster
                .members
                .iter()
                .map(|member| self.duration_of(*member))
                .max()
                .unwrap_or(0),
        }
    }

    // ========================================================================
    // Base Contract
    // ========================================================================

    pub(crate) fn prepare_player(&mut self, id: PlayerId) {
        self.apply_intent(id, Intent::Prepare);
    }

    pub(crate) fn play_player(&mut self, id: PlayerId) {
        self.apply_intent(id, Intent::Play);
    }

    pub(crate) fn pause_player(&mut self, id: PlayerId) {
        self.apply_intent(id, Intent::Pause);
    }

    pub(crate) fn seek_player(&mut self, id: PlayerId, position: u64) {
        self.apply_intent(id, Intent::SeekTo(position));
    }

    fn apply_intent(&mut self, id: PlayerId, intent: Intent) {
        let node = self.node(id);
        if node.released {
            debug!(player = %node.name, intent = ?intent, "Command on released player dropped");
            return;
        }

        let timeline = Timeline {
            position: self.position_of(id),
            duration: self.duration_of(id),
        };
        debug!(
            player = %node.name,
            intent = ?intent,
            phase = %node.state.observed,
            "Command"
        );
        let step = reduce_intent(node.state, intent, timeline);
        self.apply_step(id, step);
    }

    pub(crate) fn apply_signal(&mut self, id: PlayerId, signal: Signal) {
        let node = self.node(id);
        if node.released {
            return;
        }
        debug!(
            player = %node.name,
            signal = signal.label(),
            phase = %node.state.observed,
            "Signal"
        );
        let step = reduce_signal(node.state, &signal);
        self.apply_step(id, step);
    }

    fn apply_step(&mut self, id: PlayerId, step: Step) {
        for effect in step.effects {
            match effect {
                Effect::ClearError => self.node_mut(id).error = None,
                Effect::RecordError(error) => {
                    let node = self.node_mut(id);
                    warn!(player = %node.name, error = %error, "Player failed");
                    node.error = Some(error);
                }
                Effect::Prepare => self.prepare_hook(id),
                Effect::Play => self.play_hook(id),
                Effect::Pause => self.pause_hook(id),
                Effect::Seek(position) => self.seek_hook(id, position),
                Effect::Transition(phase) => self.transition(id, phase),
                Effect::EchoSeek(position) => self.notify(id, PlayerEventKind::SeekTo(position)),
                Effect::Ignore(reason) => {
                    let node = self.node(id);
                    if reason.is_suspicious() {
                        warn!(player = %node.name, reason = ?reason, phase = %node.state.observed, "Input ignored");
                    } else {
                        debug!(player = %node.name, reason = ?reason, phase = %node.state.observed, "Input ignored");
                    }
                }
            }
        }
        self.node_mut(id).state.intent = step.state.intent;
    }

    /// Change the observed phase and notify. Starts or stops the position
    /// ticker of polled leaves.
    pub(crate) fn transition(&mut self, id: PlayerId, phase: Phase) {
        let now = Instant::now();
        let node = self.node_mut(id);
        let previous = node.state.observed;
        if previous == phase {
            return;
        }
        node.state.observed = phase;

        if node.kind.polls_position() {
            if phase == Phase::Playing {
                node.ticker.start(now);
            } else if previous == Phase::Playing {
                node.ticker.stop();
            }
        }

        debug!(player = %node.name, from = %previous, to = %phase, "Phase transition");
        self.notify(id, PlayerEventKind::PhaseChanged(phase));
    }

    fn prepare_hook(&mut self, id: PlayerId) {
        let children = match &mut self.node_mut(id).kind {
            Kind::Engine(engine) => {
                engine.prepare();
                return;
            }
            // Nothing to load.
            Kind::Filler(_) => {
                self.post_signal(id, Signal::Ready);
                return;
            }
            composite => composite.children(),
        };
        for child in children {
            self.prepare_player(child);
        }
    }

    fn play_hook(&mut self, id: PlayerId) {
        let now = Instant::now();
        let targets = match &mut self.node_mut(id).kind {
            Kind::Engine(engine) => {
                engine.play(true);
                return;
            }
            Kind::Filler(clock) => {
                clock.resume(now);
                return;
            }
            Kind::Offset(offset) => vec![offset.active_child()],
            Kind::Selection(selection) => vec![selection.child],
            Kind::Cluster(cluster) => cluster.members.clone(),
        };
        for target in targets {
            self.play_player(target);
        }
    }

    fn pause_hook(&mut self, id: PlayerId) {
        let now = Instant::now();
        let node = self.node_mut(id);
        let speed = node.speed;
        let targets = match &mut node.kind {
            Kind::Engine(engine) => {
                engine.pause();
                return;
            }
            Kind::Filler(clock) => {
                clock.suspend(speed, now);
                return;
            }
            composite => composite.children(),
        };
        for target in targets {
            self.pause_player(target);
        }
    }

    fn seek_hook(&mut self, id: PlayerId, position: u64) {
        let now = Instant::now();
        match &mut self.node_mut(id).kind {
            Kind::Engine(engine) => engine.seek(position),
            Kind::Filler(clock) => {
                clock.seek(position, now);
                self.notify(id, PlayerEventKind::SeekTo(position));
            }
            Kind::Offset(_) => self.offset_seek(id, position),
            Kind::Selection(_) => self.selection_seek(id, position),
            Kind::Cluster(_) => self.cluster_seek(id, position),
        }
    }

    pub(crate) fn release_player(&mut self, id: PlayerId) {
        let node = self.node_mut(id);
        if node.released {
            return;
        }
        node.released = true;
        node.ticker.stop();
        info!(player = %node.name, "Player released");

        let children = match &mut node.kind {
            Kind::Engine(engine) => {
                engine.release();
                return;
            }
            other => other.children(),
        };
        for child in children {
            self.release_player(child);
        }
    }

    fn apply_speed(&mut self, id: PlayerId, speed: f32) {
        let now = Instant::now();
        let node = self.node_mut(id);
        if node.released {
            return;
        }
        let previous = node.speed;
        node.speed = speed;

        let children = match &mut node.kind {
            Kind::Engine(engine) => {
                engine.set_playback_speed(speed);
                return;
            }
            Kind::Filler(clock) => {
                clock.rebase(previous, now);
                return;
            }
            composite => composite.children(),
        };
        for child in children {
            self.apply_speed(child, speed);
        }
    }

    fn route_view(&mut self, id: PlayerId, container: &ViewContainer) {
        let targets = match &mut self.node_mut(id).kind {
            Kind::Engine(engine) => {
                engine.attach_view(container);
                return;
            }
            Kind::Filler(_) => return,
            Kind::Offset(offset) => vec![offset.inner],
            Kind::Selection(selection) => vec![selection.child],
            Kind::Cluster(cluster) => cluster.members.clone(),
        };
        for target in targets {
            self.route_view(target, container);
        }
    }

    // ========================================================================
    // Queue
    // ========================================================================

    fn post(&self, task: Task) {
        // The receiving half lives in `self`, so the send cannot fail.
        let _ = self.queue_tx.send(task);
    }

    pub(crate) fn notify(&self, id: PlayerId, kind: PlayerEventKind) {
        self.post(Task::Deliver { player: id, kind });
    }

    pub(crate) fn post_signal(&self, id: PlayerId, signal: Signal) {
        self.post(Task::Signal { player: id, signal });
    }

    pub(crate) fn handle_task(&mut self, task: Task) {
        match task {
            Task::Deliver { player, kind } => self.deliver(player, kind),
            Task::Signal { player, signal } => self.apply_signal(player, signal),
            Task::Engine { player, event } => self.on_engine_event(player, event),
            Task::Tick { player, generation } => self.on_tick(player, generation),
        }
    }

    fn deliver(&mut self, id: PlayerId, kind: PlayerEventKind) {
        let node = self.node(id);
        if node.released {
            return;
        }

        let is_filler = matches!(node.kind, Kind::Filler(_));
        if let PlayerEventKind::PositionChanged(position) = kind {
            if is_filler {
                self.filler_check_end(id, position);
            }
        }

        if let Some(parent) = self.node(id).parent {
            self.on_child_event(parent, id, kind);
        }

        let node = self.node(id);
        // Nobody listening is fine.
        let _ = node.events.send(PlayerEvent {
            player: id,
            name: node.name.clone(),
            kind,
        });
    }

    fn on_child_event(&mut self, parent: PlayerId, child: PlayerId, kind: PlayerEventKind) {
        if self.node(parent).released {
            return;
        }
        match self.node(parent).kind {
            Kind::Offset(_) => self.offset_on_child(parent, child, kind),
            Kind::Selection(_) => self.selection_on_child(parent, child, kind),
            Kind::Cluster(_) => self.cluster_on_child(parent, child, kind),
            Kind::Engine(_) | Kind::Filler(_) => {}
        }
    }

    /// A filler that played to its length ends itself.
    fn filler_check_end(&mut self, id: PlayerId, position: u64) {
        let now = Instant::now();
        let node = self.node_mut(id);
        let speed = node.speed;
        let Kind::Filler(clock) = &mut node.kind else {
            return;
        };
        if position < clock.duration() || node.state.observed == Phase::End {
            return;
        }
        clock.suspend(speed, now);
        self.transition(id, Phase::End);
    }

    fn on_tick(&mut self, id: PlayerId, generation: u64) {
        let node = self.node(id);
        if node.released || !node.ticker.accepts(generation) || !node.state.is_playing() {
            return;
        }
        let position = self.position_of(id);
        self.notify(id, PlayerEventKind::PositionChanged(position));
        self.node_mut(id).ticker.reschedule(Instant::now());
    }

    fn schedule_due_ticks(&mut self, now: Instant) {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            if node.released {
                continue;
            }
            if let Some(generation) = node.ticker.take_due(now) {
                let _ = self.queue_tx.send(Task::Tick {
                    player: PlayerId::from_index(index),
                    generation,
                });
            }
        }
    }

    pub(crate) fn next_tick_deadline(&self) -> Option<Instant> {
        self.nodes
            .iter()
            .filter(|node| !node.released)
            .filter_map(|node| node.ticker.next_due())
            .min()
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Process queued work, including ticks due now, until the queue is
    /// empty. Returns the number of tasks processed.
    pub fn run_until_idle(&mut self) -> usize {
        let mut processed = 0;
        loop {
            self.schedule_due_ticks(Instant::now());
            match self.queue_rx.try_recv() {
                Ok(task) => {
                    self.handle_task(task);
                    processed += 1;
                }
                Err(_) => return processed,
            }
        }
    }

    /// Process work for `duration` of (tokio) time, waking for ticks and for
    /// engine events pushed from other tasks.
    pub async fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            self.run_until_idle();
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let wake = self
                .next_tick_deadline()
                .map_or(deadline, |due| due.min(deadline))
                .max(now);

            tokio::select! {
                Some(task) = self.queue_rx.recv() => self.handle_task(task),
                _ = sleep_until(wake) => {}
            }
        }
    }
}
