use std::sync::Arc;

use crate::{
    cpu::CpuChooser,
    error::InvalidRequestKind,
    rng::{Pcg32, Rng, SeedableRng},
    scoring::MatchScorer,
    sessions::config::{MatchConfig, StabilizerConfig, TimingConfig},
    stabilizer::PredictionStabilizer,
    telemetry::ViolationObserver,
    CaptureDevice, GameSession, RpsError,
};

/// Default event queue size.
/// Events older than this threshold are dropped if not polled.
const DEFAULT_EVENT_QUEUE_SIZE: usize = 100;
const MIN_EVENT_QUEUE_SIZE: usize = 10;
const MAX_EVENT_QUEUE_SIZE: usize = 10_000;

/// The [`SessionBuilder`] builds [`GameSession`]s.
///
/// After setting all appropriate values, use [`start_session`] to validate the
/// configuration and consume the builder.
///
/// ```
/// use rps_referee::{DetachedCamera, MatchConfig, SessionBuilder, StabilizerConfig, TimingConfig};
///
/// let session = SessionBuilder::new()
///     .with_timing_config(TimingConfig::quick())
///     .with_stabilizer_config(StabilizerConfig::strict())
///     .with_match_config(MatchConfig::best_of(5))
///     .with_seed(2024)
///     .start_session(DetachedCamera)?;
/// assert_eq!(session.match_state().rounds_played, 0);
/// # Ok::<(), rps_referee::RpsError>(())
/// ```
///
/// [`start_session`]: Self::start_session
#[must_use = "SessionBuilder must be consumed by calling start_session"]
pub struct SessionBuilder {
    timing: TimingConfig,
    stabilizer: StabilizerConfig,
    match_config: MatchConfig,
    seed: Option<u64>,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
    event_queue_size: usize,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure to ensure all fields are included when new fields are added.
        let Self {
            timing,
            stabilizer,
            match_config,
            seed,
            violation_observer,
            event_queue_size,
        } = self;

        f.debug_struct("SessionBuilder")
            .field("timing", timing)
            .field("stabilizer", stabilizer)
            .field("match_config", match_config)
            .field("seed", seed)
            .field("has_violation_observer", &violation_observer.is_some())
            .field("event_queue_size", event_queue_size)
            .finish()
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Construct a new builder with all values set to their defaults.
    pub fn new() -> Self {
        Self {
            timing: TimingConfig::default(),
            stabilizer: StabilizerConfig::default(),
            match_config: MatchConfig::default(),
            seed: None,
            violation_observer: None,
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
        }
    }

    /// Sets the countdown, CPU animation and border pulse timing.
    pub fn with_timing_config(mut self, config: TimingConfig) -> Self {
        self.timing = config;
        self
    }

    /// Sets how classifier output is smoothed.
    pub fn with_stabilizer_config(mut self, config: StabilizerConfig) -> Self {
        self.stabilizer = config;
        self
    }

    /// Sets how many round wins decide the match.
    pub fn with_match_config(mut self, config: MatchConfig) -> Self {
        self.match_config = config;
        self
    }

    /// Seeds the CPU chooser so every pick is reproducible. Without a seed the
    /// CPU is seeded from entropy.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets a custom observer for reported violations.
    ///
    /// If no observer is set, violations are logged via the `tracing` crate.
    ///
    /// ```
    /// use rps_referee::{SessionBuilder, telemetry::CollectingObserver};
    /// use std::sync::Arc;
    ///
    /// let observer = Arc::new(CollectingObserver::new());
    /// let builder = SessionBuilder::new().with_violation_observer(observer.clone());
    /// ```
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    /// Sets the maximum number of pending events. Older events are dropped
    /// when the queue is full. Defaults to 100.
    ///
    /// # Errors
    /// Returns [`RpsError::InvalidRequest`] if `size` is outside `10..=10000`.
    pub fn with_event_queue_size(mut self, size: usize) -> Result<Self, RpsError> {
        if !(MIN_EVENT_QUEUE_SIZE..=MAX_EVENT_QUEUE_SIZE).contains(&size) {
            return Err(InvalidRequestKind::ConfigValueOutOfRange {
                field: "event_queue_size",
                min: MIN_EVENT_QUEUE_SIZE as u64,
                max: MAX_EVENT_QUEUE_SIZE as u64,
                actual: size as u64,
            }
            .into());
        }
        self.event_queue_size = size;
        Ok(self)
    }

    /// Validates every configuration and builds a session around `camera`.
    ///
    /// # Errors
    /// Returns [`RpsError::InvalidRequest`] if a configuration is invalid.
    pub fn start_session<K: CaptureDevice>(self, camera: K) -> Result<GameSession<K>, RpsError> {
        let rng = match self.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_entropy(),
        };
        self.start_session_with_rng(camera, rng)
    }

    /// Like [`start_session`](Self::start_session) but with a caller-supplied
    /// random number generator. Any seed set on the builder is ignored.
    ///
    /// # Errors
    /// Returns [`RpsError::InvalidRequest`] if a configuration is invalid.
    pub fn start_session_with_rng<K: CaptureDevice, R: Rng>(
        self,
        camera: K,
        rng: R,
    ) -> Result<GameSession<K, R>, RpsError> {
        self.timing.validate()?;
        self.stabilizer.validate()?;
        self.match_config.validate()?;

        let stabilizer = PredictionStabilizer::new(self.stabilizer)
            .with_violation_observer(self.violation_observer.clone());
        let scorer = MatchScorer::new(self.match_config)
            .with_violation_observer(self.violation_observer.clone());

        Ok(GameSession::new(
            camera,
            self.timing,
            stabilizer,
            CpuChooser::new(rng),
            scorer,
            self.event_queue_size,
            self.violation_observer,
        ))
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
    use crate::DetachedCamera;
    use web_time::Duration;

    #[test]
    fn defaults_build() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.event_queue_size, DEFAULT_EVENT_QUEUE_SIZE);
        assert!(builder.start_session(DetachedCamera).is_ok());
    }

    #[test]
    fn event_queue_size_bounds() {
        assert!(SessionBuilder::new().with_event_queue_size(9).is_err());
        assert!(SessionBuilder::new().with_event_queue_size(10).is_ok());
        assert!(SessionBuilder::new().with_event_queue_size(10_001).is_err());
    }

    #[test]
    fn invalid_timing_is_rejected_at_start() {
        let timing = TimingConfig {
            countdown_interval: Duration::ZERO,
            ..TimingConfig::default()
        };
        let err = SessionBuilder::new()
            .with_timing_config(timing)
            .start_session(DetachedCamera)
            .unwrap_err();
        assert!(matches!(
            err,
            RpsError::InvalidRequest {
                kind: InvalidRequestKind::DurationConfigOutOfRange { .. }
            }
        ));
    }

    #[test]
    fn invalid_stabilizer_is_rejected_at_start() {
        let stabilizer = StabilizerConfig {
            min_samples: 9,
            ..StabilizerConfig::default()
        };
        assert!(SessionBuilder::new()
            .with_stabilizer_config(stabilizer)
            .start_session(DetachedCamera)
            .is_err());
    }

    #[test]
    fn seeded_sessions_pick_identically() {
        let mut a = SessionBuilder::new().with_seed(5).start_session(DetachedCamera).unwrap();
        let mut b = SessionBuilder::new().with_seed(5).start_session(DetachedCamera).unwrap();
        for session in [&mut a, &mut b] {
            session.start_round().unwrap();
            session.advance(Duration::from_secs(3)).unwrap();
        }
        assert_eq!(a.last_round(), b.last_round());
        assert_eq!(a.events().collect::<Vec<_>>(), b.events().collect::<Vec<_>>());
    }

    #[test]
    fn debug_hides_observer() {
        let text = format!("{:?}", SessionBuilder::new().with_seed(3));
        assert!(text.contains("has_violation_observer: false"));
        assert!(text.contains("seed: Some(3)"));
    }
}
