//! # rps-referee
//!
//! The decision core of a camera-driven rock/paper/scissors game. The player
//! shows a hand gesture to a camera, an external classifier labels frames, the
//! CPU's choice is animated while a countdown runs, and when the countdown
//! reaches "Go" the player's stabilized gesture is locked, compared against the
//! CPU's and scored in a best-of-three match.
//!
//! Nothing here renders, opens a camera or runs a model. Those are
//! collaborators behind the [`CaptureDevice`] and [`GestureClassifier`] traits,
//! and everything the presentation layer needs is reported as a [`GameEvent`].
//! Time is virtual: the owner calls [`GameSession::advance`] with the elapsed
//! time and the session fires its timers in order.
//!
//! ```
//! use rps_referee::prelude::*;
//! use web_time::Duration;
//!
//! let mut session = SessionBuilder::new().with_seed(9).start_session(DetachedCamera)?;
//! session.start_round()?;
//! session.advance(Duration::from_millis(1500))?;
//! for _ in 0..3 {
//!     session.submit_classification(Classification::new("Scissors", 0.8));
//! }
//! session.advance(Duration::from_millis(1500))?;
//!
//! for event in session.events() {
//!     if let GameEvent::RoundResolved { outcome, state, .. } = event {
//!         println!("{outcome} {state}");
//!     }
//! }
//! # Ok::<(), RpsError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use collaborators::{
    CameraError, CaptureDevice, Classification, ClassifierError, DetachedCamera,
    GestureClassifier,
};
pub use cpu::CpuChooser;
pub use error::{InvalidRequestKind, RpsError, RpsResult};
pub use gesture::{BorderColor, Gesture, RoundOutcome};
pub use round::{CountdownValue, RoundPhase, RoundReport};
pub use scoring::{MatchScorer, MatchState};
pub use sessions::builder::SessionBuilder;
pub use sessions::config::{MatchConfig, StabilizerConfig, TimingConfig};
pub use sessions::event_drain::EventDrain;
pub use sessions::game_session::GameSession;
pub use stabilizer::{PredictionSample, PredictionStabilizer, SampleVerdict};

pub mod collaborators;
pub mod cpu;
#[cfg(feature = "tokio")]
pub mod driver;
#[doc(hidden)]
pub mod error;
pub mod gesture;
pub mod prelude;
/// Internal random number generator module based on PCG32.
///
/// Drives the CPU chooser; seedable so whole matches can be replayed.
pub mod rng;
pub mod round;
pub mod scheduler;
pub mod scoring;
pub mod stabilizer;
pub mod telemetry;
#[doc(hidden)]
pub mod sessions {
    #[doc(hidden)]
    pub mod builder;
    pub mod config;
    #[doc(hidden)]
    pub mod event_drain;
    #[doc(hidden)]
    pub mod game_session;
}
#[cfg(test)]
pub(crate) mod test_config;

/// Notifications for the presentation layer.
///
/// Collected with [`GameSession::events`], oldest first.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum GameEvent {
    /// A round began counting down.
    RoundStarted {
        /// 1-based round number within the match.
        round: u32,
    },
    /// The countdown shows a new value. The first one is emitted on start.
    CountdownTick {
        /// The value to show.
        value: CountdownValue,
    },
    /// The CPU animation shows a new gesture.
    CpuChoiceChanged {
        /// The gesture shown.
        gesture: Gesture,
    },
    /// The stabilized player gesture changed during the countdown.
    PredictionChanged {
        /// The new stabilized gesture, `None` while evidence is insufficient.
        gesture: Option<Gesture>,
    },
    /// The camera border changes colour.
    BorderColorChanged {
        /// The new colour.
        color: BorderColor,
    },
    /// A round was locked and scored.
    RoundResolved {
        /// How the round ended.
        outcome: RoundOutcome,
        /// The score after this round.
        state: MatchState,
        /// Locked player gesture.
        player: Option<Gesture>,
        /// Committed CPU gesture.
        cpu: Gesture,
    },
    /// A player reached the win threshold. Sent right after the deciding [`GameEvent::RoundResolved`].
    MatchEnded {
        /// True if the player won the match.
        player_won: bool,
    },
    /// A round was stopped before the lock and not scored.
    RoundAbandoned {
        /// The abandoned round's number.
        round: u32,
    },
    /// The camera collaborator failed.
    CameraFailed {
        /// What the camera reported.
        message: String,
    },
    /// The score was reset for a new match.
    MatchReset,
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

    #[test]
    fn events_serialize_with_variant_names() {
        let event = GameEvent::MatchEnded { player_won: true };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"MatchEnded":{"player_won":true}}"#);
    }

    #[test]
    fn resolved_event_carries_the_score() {
        let event = GameEvent::RoundResolved {
            outcome: RoundOutcome::Tie,
            state: MatchState {
                player_score: 1,
                cpu_score: 0,
                rounds_played: 2,
                match_over: false,
            },
            player: Some(Gesture::Rock),
            cpu: Gesture::Rock,
        };
        let back: GameEvent = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(back, event);
    }
}
