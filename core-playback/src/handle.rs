//! # Player Handle
//!
//! Runs a [`Session`] on a background tokio task and exposes its root player
//! through a cloneable [`PlayerHandle`].
//!
//! Commands are fire-and-forget: they are queued to the task and applied in
//! order, interleaved with engine events and position ticks. Queries round
//! trip through the task and see the state after every earlier command.
//!
//! The task stops when the root player is released, or when the last handle
//! is dropped (which releases the root first).

use bridge_traits::ViewContainer;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::error::{PlaybackError, Result};
use crate::events::{PlayerEvent, PlayerId};
use crate::phase::Phase;
use crate::session::{PlayerSnapshot, Session};

#[derive(Debug)]
enum Command {
    Prepare,
    Play,
    Pause,
    Stop,
    SeekTo(u64),
    SetPlaybackSpeed(f32),
    AttachView(ViewContainer),
    Release,
    Snapshot(oneshot::Sender<Result<PlayerSnapshot>>),
}

impl Command {
    fn label(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::SeekTo(_) => "seek_to",
            Self::SetPlaybackSpeed(_) => "set_playback_speed",
            Self::AttachView(_) => "attach_view",
            Self::Release => "release",
            Self::Snapshot(_) => "snapshot",
        }
    }
}

/// Cloneable front end of a spawned session's root player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    root: PlayerId,
    commands: mpsc::UnboundedSender<Command>,
    phase: watch::Receiver<Phase>,
    events: broadcast::Sender<PlayerEvent>,
}

impl PlayerHandle {
    pub fn player(&self) -> PlayerId {
        self.root
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::SessionClosed)
    }

    pub fn prepare(&self) -> Result<()> {
        self.send(Command::Prepare)
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.send(Command::SeekTo(position_ms))
    }

    /// # Errors
    ///
    /// [`PlaybackError::InvalidConfig`] for a speed that is not a positive
    /// finite number; nothing is queued in that case.
    pub fn set_playback_speed(&self, speed: f32) -> Result<()> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(PlaybackError::InvalidConfig(format!(
                "playback speed must be positive, got {}",
                speed
            )));
        }
        self.send(Command::SetPlaybackSpeed(speed))
    }

    pub fn attach_view(&self, container: ViewContainer) -> Result<()> {
        self.send(Command::AttachView(container))
    }

    /// Release the root player and stop the background task.
    pub fn release(&self) -> Result<()> {
        self.send(Command::Release)
    }

    /// Last observed phase published by the task.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Stream of observed phases, deduplicated.
    pub fn phase_updates(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        response.await.map_err(|_| PlaybackError::SessionClosed)?
    }

    pub async fn position(&self) -> Result<u64> {
        Ok(self.snapshot().await?.position)
    }

    pub async fn duration(&self) -> Result<u64> {
        Ok(self.snapshot().await?.duration)
    }

    pub async fn is_playing(&self) -> Result<bool> {
        Ok(self.snapshot().await?.is_playing())
    }

    pub async fn is_error(&self) -> Result<bool> {
        Ok(self.snapshot().await?.is_error())
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

impl Session {
    /// Move the session onto a background task driving `root`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `root` must be a live player without a parent.
    pub fn spawn(self, root: PlayerId) -> Result<PlayerHandle> {
        self.ensure_root(root)?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase) = watch::channel(self.phase_of(root));
        let events = self.node(root).events.clone();

        info!(player = %self.node(root).name, "Player session started");
        tokio::spawn(drive(self, root, command_rx, phase_tx));

        Ok(PlayerHandle {
            root,
            commands,
            phase,
            events,
        })
    }

    fn execute(&mut self, root: PlayerId, command: Command) {
        let label = command.label();
        let outcome = match command {
            Command::Prepare => self.prepare(root),
            Command::Play => self.play(root),
            Command::Pause => self.pause(root),
            Command::Stop => self.stop(root),
            Command::SeekTo(position) => self.seek_to(root, position),
            Command::SetPlaybackSpeed(speed) => self.set_playback_speed(root, speed),
            Command::AttachView(container) => self.attach_view(root, container),
            Command::Release => self.release(root),
            Command::Snapshot(reply) => {
                // The caller may have stopped waiting.
                let _ = reply.send(self.snapshot(root));
                Ok(())
            }
        };
        if let Err(error) = outcome {
            warn!(command = label, error = %error, "Player command failed");
        }
    }
}

async fn drive(
    mut session: Session,
    root: PlayerId,
    mut commands: mpsc::UnboundedReceiver<Command>,
    phase: watch::Sender<Phase>,
) {
    loop {
        session.run_until_idle();

        let observed = session.phase_of(root);
        phase.send_if_modified(|current| {
            let changed = *current != observed;
            *current = observed;
            changed
        });
        if session.is_released(root) {
            break;
        }

        let tick = session.next_tick_deadline();
        let due = tick.unwrap_or_else(Instant::now);

        tokio::select! {
            biased;

            Some(task) = session.queue_rx.recv() => session.handle_task(task),
            command = commands.recv() => match command {
                Some(command) => session.execute(root, command),
                None => {
                    debug!("All player handles dropped");
                    session.release_player(root);
                    break;
                }
            },
            _ = sleep_until(due), if tick.is_some() => {}
        }
    }

    info!(player = %session.node(root).name, "Player session stopped");
}
