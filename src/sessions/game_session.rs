use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info};
use web_time::Duration;

use crate::cpu::CpuChooser;
use crate::error::{InvalidRequestKind, RpsError, RpsResult};
use crate::report_violation_to;
use crate::rng::{Pcg32, Rng};
use crate::round::{CountdownValue, RoundPhase, RoundReport, RoundSession};
use crate::scheduler::{Firing, Scheduler, TimerKind};
use crate::scoring::{MatchScorer, MatchState};
use crate::sessions::config::TimingConfig;
use crate::sessions::event_drain::EventDrain;
use crate::stabilizer::{PredictionSample, PredictionStabilizer, SampleVerdict};
use crate::telemetry::{
    InvariantChecker, InvariantViolation, ViolationKind, ViolationObserver, ViolationSeverity,
};
use crate::{
    BorderColor, CaptureDevice, Classification, GameEvent, Gesture, GestureClassifier,
};

/// A rock/paper/scissors match against the CPU.
///
/// The session is driven entirely by its owner: [`start_round`] begins a
/// countdown, [`advance`] moves virtual time forward (firing the countdown, CPU
/// animation and border pulse timers), and classifier output is fed with
/// [`submit_classification`] or [`process_frame`]. Everything that happens is
/// reported as a [`GameEvent`], collected with [`events`].
///
/// Build one with [`SessionBuilder`].
///
/// ```
/// use rps_referee::{Classification, DetachedCamera, GameEvent, SessionBuilder};
/// use web_time::Duration;
///
/// let mut session = SessionBuilder::new().with_seed(42).start_session(DetachedCamera)?;
/// session.start_round()?;
/// for _ in 0..4 {
///     session.submit_classification(Classification::new("Rock", 0.9));
/// }
/// session.advance(Duration::from_secs(3))?;
///
/// let resolved = session
///     .events()
///     .find(|e| matches!(e, GameEvent::RoundResolved { .. }));
/// assert!(resolved.is_some());
/// assert_eq!(session.match_state().rounds_played, 1);
/// # Ok::<(), rps_referee::RpsError>(())
/// ```
///
/// [`start_round`]: Self::start_round
/// [`advance`]: Self::advance
/// [`submit_classification`]: Self::submit_classification
/// [`process_frame`]: Self::process_frame
/// [`events`]: Self::events
/// [`SessionBuilder`]: crate::SessionBuilder
pub struct GameSession<K, R = Pcg32> {
    camera: K,
    timing: TimingConfig,
    stabilizer: PredictionStabilizer,
    cpu: CpuChooser<R>,
    scorer: MatchScorer,
    scheduler: Scheduler,
    round: RoundSession,
    last_round: Option<RoundReport>,
    event_queue: VecDeque<GameEvent>,
    max_event_queue_size: usize,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl<K: std::fmt::Debug, R> std::fmt::Debug for GameSession<K, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("camera", &self.camera)
            .field("timing", &self.timing)
            .field("phase", &self.round.phase())
            .field("match_state", &self.scorer.state())
            .field("pending_events", &self.event_queue.len())
            .field("has_violation_observer", &self.violation_observer.is_some())
            .finish_non_exhaustive()
    }
}

impl<K: CaptureDevice, R: Rng> GameSession<K, R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        camera: K,
        timing: TimingConfig,
        stabilizer: PredictionStabilizer,
        cpu: CpuChooser<R>,
        scorer: MatchScorer,
        max_event_queue_size: usize,
        violation_observer: Option<Arc<dyn ViolationObserver>>,
    ) -> Self {
        Self {
            camera,
            timing,
            stabilizer,
            cpu,
            scorer,
            scheduler: Scheduler::new(),
            round: RoundSession::idle(),
            last_round: None,
            event_queue: VecDeque::new(),
            max_event_queue_size,
            violation_observer,
        }
    }

    /// Starts the next round: switches the camera on, shows the first
    /// countdown value and arms the round timers.
    ///
    /// # Errors
    /// - [`InvalidRequestKind::RoundInProgress`] while a countdown runs.
    /// - [`InvalidRequestKind::MatchOver`] once the match is decided; call
    ///   [`new_game`](Self::new_game) first.
    /// - [`RpsError::Camera`] if the camera refuses to start. A
    ///   [`GameEvent::CameraFailed`] is queued, the round is not counted and
    ///   the session stays idle.
    pub fn start_round(&mut self) -> RpsResult<()> {
        if self.round.phase().is_counting() {
            return Err(InvalidRequestKind::RoundInProgress.into());
        }
        if self.scorer.state().match_over {
            return Err(InvalidRequestKind::MatchOver.into());
        }

        if let Err(err) = self.camera.start() {
            report_violation_to!(
                &self.violation_observer,
                ViolationSeverity::Warning,
                ViolationKind::Collaborator,
                "camera failed to start: {}",
                err
            );
            self.push_event(GameEvent::CameraFailed {
                message: err.context().to_owned(),
            });
            return Err(RpsError::Camera(err));
        }

        let number = self.scorer.state().rounds_played.saturating_add(1);
        self.stabilizer.reset();
        self.cpu.reset();
        self.scheduler.cancel_all();
        let first = self.round.begin(number, self.timing.countdown_ticks)?;

        let ticks = u32::from(self.timing.countdown_ticks.max(1));
        self.scheduler
            .schedule(TimerKind::Countdown, self.timing.countdown_interval, Some(ticks));
        self.scheduler
            .schedule(TimerKind::CpuAnimation, self.timing.cpu_animation_interval, None);
        self.scheduler
            .schedule(TimerKind::BorderPulse, self.timing.border_pulse_interval, None);

        info!(round = number, "round started");
        self.push_event(GameEvent::RoundStarted { round: number });
        self.push_event(GameEvent::CountdownTick { value: first });
        crate::debug_check_invariants!(self, "after start_round");
        Ok(())
    }

    /// Abandons the running round without scoring it.
    ///
    /// Returns false (and does nothing) if no countdown was running.
    pub fn stop_round(&mut self) -> bool {
        if !self.round.phase().is_counting() {
            return false;
        }
        self.teardown_round();
        true
    }

    fn teardown_round(&mut self) {
        let number = self.round.round();
        self.scheduler.cancel_all();
        self.camera.stop();
        self.stabilizer.reset();
        self.cpu.reset();
        self.round.abandon();
        self.push_event(GameEvent::RoundAbandoned { round: number });
        self.push_event(GameEvent::BorderColorChanged {
            color: BorderColor::White,
        });
    }

    /// Moves virtual time forward by `elapsed` and handles every timer that
    /// comes due, in chronological order.
    ///
    /// When the countdown reaches "Go" the round locks and resolves inside
    /// this call; every later firing in the same step is dropped.
    ///
    /// # Errors
    /// Returns [`RpsError::InternalError`] if the round state machine refuses
    /// a transition, which indicates a bug.
    pub fn advance(&mut self, elapsed: Duration) -> RpsResult<()> {
        self.scheduler.advance(elapsed);
        while let Some(firing) = self.scheduler.pop_due() {
            self.handle_firing(firing)?;
        }
        crate::debug_check_invariants!(self, "after advance");
        Ok(())
    }

    fn handle_firing(&mut self, firing: Firing) -> RpsResult<()> {
        if !self.round.phase().is_counting() {
            report_violation_to!(
                &self.violation_observer,
                round = self.last_round.map(|r| r.round),
                ViolationSeverity::Error,
                ViolationKind::Scheduler,
                "{:?} timer fired at {:?} outside a countdown",
                firing.kind,
                firing.at
            );
            self.scheduler.cancel_all();
            return Ok(());
        }

        match firing.kind {
            TimerKind::Countdown => {
                let value = self.round.countdown_tick()?;
                self.push_event(GameEvent::CountdownTick { value });
                if value == CountdownValue::Go {
                    self.lock_and_resolve()?;
                }
            },
            TimerKind::CpuAnimation => {
                let gesture = self.cpu.tick();
                self.push_event(GameEvent::CpuChoiceChanged { gesture });
            },
            TimerKind::BorderPulse => {
                let color = self.round.next_pulse();
                self.push_event(GameEvent::BorderColorChanged { color });
            },
        }
        Ok(())
    }

    fn lock_and_resolve(&mut self) -> RpsResult<()> {
        let player = self.stabilizer.current_stable();
        let cpu = self.cpu.finalize();
        self.scheduler.cancel_all();
        self.camera.stop();
        self.round.lock(player, cpu)?;

        let report = self.round.resolve(self.cpu.displayed())?;
        let state = self.scorer.apply(report.outcome);
        info!(
            round = report.round,
            player = ?report.player,
            %cpu,
            outcome = ?report.outcome,
            score = %state,
            "round resolved"
        );

        self.push_event(GameEvent::RoundResolved {
            outcome: report.outcome,
            state,
            player,
            cpu,
        });
        self.push_event(GameEvent::BorderColorChanged {
            color: report.outcome.tint(),
        });
        if let Some(player_won) = state.player_won() {
            self.push_event(GameEvent::MatchEnded { player_won });
        }

        self.last_round = Some(report);
        self.round.settle();
        Ok(())
    }

    /// Feeds one classifier result to the stabilizer.
    ///
    /// Returns `None` (and ignores the sample) unless a countdown is running.
    /// Queues a [`GameEvent::PredictionChanged`] when the stabilized gesture changes.
    pub fn submit_classification(&mut self, classification: Classification) -> Option<SampleVerdict> {
        if !self.round.phase().is_counting() {
            return None;
        }
        let verdict = self.stabilizer.observe(PredictionSample::from(classification));
        let stable = self.stabilizer.current_stable();
        if self.round.note_prediction(stable) {
            debug!(prediction = ?stable, "stabilized prediction changed");
            self.push_event(GameEvent::PredictionChanged { gesture: stable });
        }
        Some(verdict)
    }

    /// Runs `classifier` on `frame` and submits the result.
    ///
    /// Frames are not classified outside a countdown. Classifier errors and
    /// empty results count as "no sample".
    pub fn process_frame<C: GestureClassifier>(
        &mut self,
        classifier: &mut C,
        frame: &C::Frame,
    ) -> Option<SampleVerdict> {
        if !self.round.phase().is_counting() {
            return None;
        }
        match classifier.classify(frame) {
            Ok(Some(classification)) => self.submit_classification(classification),
            Ok(None) => None,
            Err(err) => {
                debug!(error = %err, "classifier failed, frame skipped");
                None
            },
        }
    }

    /// Reports that the camera stopped working.
    ///
    /// Queues [`GameEvent::CameraFailed`]; a running round is abandoned
    /// without being scored.
    pub fn report_camera_failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        report_violation_to!(
            &self.violation_observer,
            round = self.active_round(),
            ViolationSeverity::Warning,
            ViolationKind::Collaborator,
            "camera failure: {}",
            message
        );
        self.push_event(GameEvent::CameraFailed { message });
        if self.round.phase().is_counting() {
            self.teardown_round();
        }
    }

    /// Starts a fresh match at 0-0, abandoning any running round.
    pub fn new_game(&mut self) {
        if self.round.phase().is_counting() {
            self.teardown_round();
        }
        self.scorer.reset_match();
        self.round.clear();
        self.last_round = None;
        info!("new match");
        self.push_event(GameEvent::MatchReset);
    }

    fn active_round(&self) -> Option<u32> {
        self.round.phase().is_counting().then(|| self.round.round())
    }

    fn push_event(&mut self, event: GameEvent) {
        self.event_queue.push_back(event);
        while self.event_queue.len() > self.max_event_queue_size {
            self.event_queue.pop_front();
        }
    }

    /// Drains every event queued since the last call. Once more than the
    /// configured queue size are pending, the oldest are dropped.
    pub fn events(&mut self) -> EventDrain<'_> {
        EventDrain::from_drain(self.event_queue.drain(..))
    }

    /// Where the current round is.
    #[must_use]
    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    /// The running score.
    #[must_use]
    pub fn match_state(&self) -> MatchState {
        self.scorer.state()
    }

    /// Summary of the last resolved round of this match.
    #[must_use]
    pub fn last_round(&self) -> Option<&RoundReport> {
        self.last_round.as_ref()
    }

    /// The stabilized gesture right now. Always `None` outside a countdown.
    #[must_use]
    pub fn current_prediction(&self) -> Option<Gesture> {
        if self.round.phase().is_counting() {
            self.stabilizer.current_stable()
        } else {
            None
        }
    }

    /// What the CPU animation currently shows.
    #[must_use]
    pub fn displayed_cpu(&self) -> Option<Gesture> {
        self.cpu.displayed()
    }

    /// The current border colour.
    #[must_use]
    pub fn border(&self) -> BorderColor {
        self.round.border()
    }

    /// Virtual time elapsed since the session was built.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// The timing in use.
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// The camera collaborator.
    pub fn camera(&self) -> &K {
        &self.camera
    }

    /// Mutable access to the camera collaborator.
    pub fn camera_mut(&mut self) -> &mut K {
        &mut self.camera
    }
}

impl<K, R> InvariantChecker for GameSession<K, R> {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.stabilizer.check_invariants()?;
        self.scorer.check_invariants()?;
        if !self.round.phase().is_counting() && !self.scheduler.is_empty() {
            return Err(
                InvariantViolation::new("GameSession", "timers alive outside a countdown")
                    .with_details(format!(
                        "phase={:?}, timers={}",
                        self.round.phase(),
                        self.scheduler.len()
                    )),
            );
        }
        if self.event_queue.len() > self.max_event_queue_size {
            return Err(InvariantViolation::new(
                "GameSession",
                "event queue exceeds its bound",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::telemetry::CollectingObserver;
    use crate::{CameraError, DetachedCamera, RoundOutcome, SessionBuilder};

    fn session() -> GameSession<DetachedCamera> {
        SessionBuilder::new()
            .with_seed(7)
            .start_session(DetachedCamera)
            .unwrap()
    }

    fn show(session: &mut GameSession<DetachedCamera>, label: &str, times: usize) {
        for _ in 0..times {
            session.submit_classification(Classification::new(label, 0.9));
        }
    }

    #[test]
    fn start_emits_round_started_and_three() {
        let mut s = session();
        s.start_round().unwrap();
        let events: Vec<_> = s.events().collect();
        assert_eq!(
            events,
            [
                GameEvent::RoundStarted { round: 1 },
                GameEvent::CountdownTick {
                    value: CountdownValue::Count(3)
                }
            ]
        );
        assert_eq!(s.phase(), RoundPhase::Counting { ticks_remaining: 3 });
    }

    #[test]
    fn countdown_runs_three_two_one_go() {
        let mut s = session();
        s.start_round().unwrap();
        s.advance(Duration::from_secs(3)).unwrap();
        let ticks: Vec<_> = s
            .events()
            .filter_map(|e| match e {
                GameEvent::CountdownTick { value } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(
            ticks,
            [
                CountdownValue::Count(3),
                CountdownValue::Count(2),
                CountdownValue::Count(1),
                CountdownValue::Go
            ]
        );
        assert_eq!(s.phase(), RoundPhase::Idle);
    }

    #[test]
    fn cpu_animates_every_300ms() {
        let mut s = session();
        s.start_round().unwrap();
        s.advance(Duration::from_millis(2999)).unwrap();
        let frames = s
            .events()
            .filter(|e| matches!(e, GameEvent::CpuChoiceChanged { .. }))
            .count();
        assert_eq!(frames, 9);
        assert!(s.displayed_cpu().is_some());
    }

    #[test]
    fn nothing_fires_after_lock() {
        let mut s = session();
        s.start_round().unwrap();
        s.advance(Duration::from_secs(10)).unwrap();
        let events: Vec<_> = s.events().collect();
        let resolved_at = events
            .iter()
            .position(|e| matches!(e, GameEvent::RoundResolved { .. }))
            .unwrap();
        assert!(events[resolved_at..]
            .iter()
            .all(|e| !matches!(e, GameEvent::CpuChoiceChanged { .. } | GameEvent::CountdownTick { .. })));
        assert!(s.scheduler.is_empty());
    }

    #[test]
    fn locked_gesture_is_scored() {
        let mut s = session();
        s.start_round().unwrap();
        show(&mut s, "Rock", 3);
        s.advance(Duration::from_secs(3)).unwrap();

        let report = *s.last_round().unwrap();
        assert_eq!(report.player, Some(Gesture::Rock));
        assert_eq!(report.outcome, RoundOutcome::resolve(Some(Gesture::Rock), report.cpu));
        assert_eq!(s.match_state().rounds_played, 1);
    }

    #[test]
    fn no_hand_means_no_detection() {
        let mut s = session();
        s.start_round().unwrap();
        s.advance(Duration::from_secs(3)).unwrap();
        let state = s.match_state();
        assert_eq!(s.last_round().unwrap().outcome, RoundOutcome::NoDetection);
        assert_eq!((state.player_score, state.cpu_score, state.rounds_played), (0, 0, 1));
        assert_eq!(s.border(), BorderColor::Gray);
    }

    #[test]
    fn second_start_while_counting_is_refused() {
        let mut s = session();
        s.start_round().unwrap();
        assert_eq!(
            s.start_round(),
            Err(RpsError::InvalidRequest {
                kind: InvalidRequestKind::RoundInProgress
            })
        );
    }

    #[test]
    fn samples_outside_countdown_are_ignored() {
        let mut s = session();
        assert_eq!(s.submit_classification(Classification::new("Rock", 0.9)), None);
        assert_eq!(s.current_prediction(), None);
    }

    #[test]
    fn prediction_changes_are_announced() {
        let mut s = session();
        s.start_round().unwrap();
        let _ = s.events().count();
        show(&mut s, "Paper", 3);
        let events: Vec<_> = s.events().collect();
        assert_eq!(
            events,
            [GameEvent::PredictionChanged {
                gesture: Some(Gesture::Paper)
            }]
        );
        assert_eq!(s.current_prediction(), Some(Gesture::Paper));
    }

    #[test]
    fn stop_abandons_without_scoring() {
        let mut s = session();
        s.start_round().unwrap();
        show(&mut s, "Rock", 3);
        assert!(s.stop_round());
        assert!(!s.stop_round());
        s.advance(Duration::from_secs(5)).unwrap();

        assert_eq!(s.match_state(), MatchState::default());
        assert!(s.events().any(|e| e == GameEvent::RoundAbandoned { round: 1 }));
        assert_eq!(s.border(), BorderColor::White);
    }

    #[test]
    fn camera_refusal_leaves_session_idle() {
        struct Busy;
        impl CaptureDevice for Busy {
            fn start(&mut self) -> Result<(), CameraError> {
                Err(CameraError::new("device busy"))
            }
            fn stop(&mut self) {}
        }

        let observer = Arc::new(CollectingObserver::new());
        let mut s = SessionBuilder::new()
            .with_violation_observer(observer.clone())
            .start_session(Busy)
            .unwrap();

        let err = s.start_round().unwrap_err();
        assert!(matches!(err, RpsError::Camera(_)));
        assert_eq!(s.phase(), RoundPhase::Idle);
        assert_eq!(s.match_state(), MatchState::default());
        assert_eq!(
            s.events().collect::<Vec<_>>(),
            [GameEvent::CameraFailed {
                message: "device busy".to_owned()
            }]
        );
        crate::assert_violation!(observer, ViolationKind::Collaborator);
    }

    #[test]
    fn camera_failure_mid_round_is_tagged_with_the_round() {
        let observer = Arc::new(CollectingObserver::new());
        let mut s = SessionBuilder::new()
            .with_violation_observer(observer.clone())
            .start_session(DetachedCamera)
            .unwrap();
        s.report_camera_failure("unplugged");
        s.start_round().unwrap();
        s.report_camera_failure("unplugged again");

        let rounds: Vec<_> = observer
            .violations_of_kind(ViolationKind::Collaborator)
            .iter()
            .map(|v| v.round)
            .collect();
        assert_eq!(rounds, [None, Some(1)]);
        assert_eq!(s.phase(), RoundPhase::Idle);
    }

    #[test]
    fn event_queue_drops_oldest() {
        let mut s = SessionBuilder::new()
            .with_event_queue_size(10)
            .unwrap()
            .start_session(DetachedCamera)
            .unwrap();
        s.start_round().unwrap();
        s.advance(Duration::from_secs(3)).unwrap();
        let events: Vec<_> = s.events().collect();
        assert_eq!(events.len(), 10);
        assert!(!events.contains(&GameEvent::RoundStarted { round: 1 }));
    }

    #[test]
    fn new_game_resets_everything() {
        let mut s = session();
        s.start_round().unwrap();
        s.advance(Duration::from_secs(3)).unwrap();
        s.start_round().unwrap();
        s.new_game();

        assert_eq!(s.match_state(), MatchState::default());
        assert_eq!(s.phase(), RoundPhase::Idle);
        assert!(s.last_round().is_none());
        assert_eq!(s.events().last(), Some(GameEvent::MatchReset));
        assert!(s.check_invariants().is_ok());
    }
}
