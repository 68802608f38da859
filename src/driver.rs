//! Tokio driver for a [`GameSession`].
//!
//! The session itself is synchronous and wants a single owner. In an async
//! application the camera, classifier and UI usually live on other tasks, so
//! [`spawn`] moves the session onto its own task, advances it from a
//! [`tokio::time::interval`] and marshals everything else through channels:
//!
//! - commands (start, stop, new game, classifications, camera failures) go in
//!   through a bounded `mpsc` channel,
//! - [`GameEvent`]s come out through an unbounded `mpsc` channel.
//!
//! ```no_run
//! use rps_referee::driver;
//! use rps_referee::{Classification, DetachedCamera, GameEvent, SessionBuilder};
//! use web_time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionBuilder::new().start_session(DetachedCamera)?;
//!     let mut handle = driver::spawn(session, Duration::from_millis(16));
//!
//!     handle.start_round().await?;
//!     handle.submit_classification(Classification::new("Paper", 0.9)).await?;
//!
//!     while let Some(event) = handle.next_event().await {
//!         if let GameEvent::RoundResolved { outcome, .. } = event {
//!             println!("{outcome}");
//!             break;
//!         }
//!     }
//!     let _session = handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};
use web_time::Duration;

use crate::rng::Rng;
use crate::{CaptureDevice, Classification, GameEvent, GameSession, RpsError, RpsResult};

/// Pending commands the driver buffers before senders wait.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

enum Command {
    StartRound(oneshot::Sender<RpsResult<()>>),
    StopRound(oneshot::Sender<bool>),
    NewGame,
    Classification(Classification),
    CameraFailed(String),
}

/// Handle to a session running on a tokio task.
///
/// Dropping the handle stops the task; use [`shutdown`](Self::shutdown) to get
/// the session back.
pub struct DriverHandle<K, R> {
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<GameEvent>,
    task: JoinHandle<GameSession<K, R>>,
}

impl<K, R> std::fmt::Debug for DriverHandle<K, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("closed", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}

fn stopped() -> RpsError {
    RpsError::InternalError {
        context: "session driver task has stopped".to_owned(),
    }
}

/// Moves `session` onto a new tokio task that advances it every `tick`.
///
/// Must be called from within a tokio runtime.
pub fn spawn<K, R>(session: GameSession<K, R>, tick: Duration) -> DriverHandle<K, R>
where
    K: CaptureDevice + Send + 'static,
    R: Rng + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(session, tick, command_rx, event_tx));
    DriverHandle {
        commands: command_tx,
        events: event_rx,
        task,
    }
}

async fn run<K: CaptureDevice, R: Rng>(
    mut session: GameSession<K, R>,
    tick: Duration,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<GameEvent>,
) -> GameSession<K, R> {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();
    debug!(?tick, "session driver started");

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                apply(&mut session, command);
            }
            now = interval.tick() => {
                let elapsed = now.saturating_duration_since(last);
                last = now;
                trace!(?elapsed, "driver tick");
                if let Err(err) = session.advance(elapsed) {
                    crate::report_violation!(
                        crate::telemetry::ViolationSeverity::Critical,
                        crate::telemetry::ViolationKind::InternalError,
                        "session failed to advance: {}",
                        err
                    );
                    break;
                }
            }
        }

        let mut receiver_gone = false;
        for event in session.events() {
            if events.send(event).is_err() {
                receiver_gone = true;
                break;
            }
        }
        if receiver_gone {
            debug!("event receiver dropped");
            break;
        }
    }

    debug!("session driver stopped");
    session
}

fn apply<K: CaptureDevice, R: Rng>(session: &mut GameSession<K, R>, command: Command) {
    match command {
        Command::StartRound(reply) => {
            let _ = reply.send(session.start_round());
        },
        Command::StopRound(reply) => {
            let _ = reply.send(session.stop_round());
        },
        Command::NewGame => session.new_game(),
        Command::Classification(classification) => {
            session.submit_classification(classification);
        },
        Command::CameraFailed(message) => session.report_camera_failure(message),
    }
}

impl<K, R> DriverHandle<K, R> {
    async fn send(&self, command: Command) -> RpsResult<()> {
        self.commands.send(command).await.map_err(|_closed| stopped())
    }

    /// Starts a round; see [`GameSession::start_round`].
    pub async fn start_round(&self) -> RpsResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::StartRound(reply)).await?;
        response.await.map_err(|_closed| stopped())?
    }

    /// Stops the running round; see [`GameSession::stop_round`].
    pub async fn stop_round(&self) -> RpsResult<bool> {
        let (reply, response) = oneshot::channel();
        self.send(Command::StopRound(reply)).await?;
        response.await.map_err(|_closed| stopped())
    }

    /// Starts a new match; see [`GameSession::new_game`].
    pub async fn new_game(&self) -> RpsResult<()> {
        self.send(Command::NewGame).await
    }

    /// Delivers a classifier result from any task.
    pub async fn submit_classification(&self, classification: Classification) -> RpsResult<()> {
        self.send(Command::Classification(classification)).await
    }

    /// Reports a camera failure from any task.
    pub async fn report_camera_failure(&self, message: impl Into<String>) -> RpsResult<()> {
        self.send(Command::CameraFailed(message.into())).await
    }

    /// Waits for the next event. Returns `None` once the driver has stopped
    /// and every event was received.
    pub async fn next_event(&mut self) -> Option<GameEvent> {
        self.events.recv().await
    }

    /// Returns an already delivered event without waiting.
    pub fn try_next_event(&mut self) -> Option<GameEvent> {
        self.events.try_recv().ok()
    }

    /// Stops the driver and hands the session back.
    pub async fn shutdown(self) -> RpsResult<GameSession<K, R>> {
        let Self {
            commands,
            events,
            task,
        } = self;
        drop(commands);
        drop(events);
        task.await.map_err(|err| RpsError::InternalError {
            context: format!("session driver task failed: {err}"),
        })
    }
}
