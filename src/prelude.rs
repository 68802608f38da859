//! Convenient re-exports for common usage.
//!
//! ```rust
//! use rps_referee::prelude::*;
//! ```
//!
//! Brings in the session and its builder, the event type, the collaborator
//! traits with their data types, the configuration structs and the error
//! types.

pub use crate::sessions::builder::SessionBuilder;
pub use crate::sessions::game_session::GameSession;

pub use crate::collaborators::{
    CameraError, CaptureDevice, Classification, ClassifierError, DetachedCamera,
    GestureClassifier,
};

pub use crate::gesture::{BorderColor, Gesture, RoundOutcome};
pub use crate::round::{CountdownValue, RoundPhase, RoundReport};
pub use crate::scoring::MatchState;
pub use crate::GameEvent;

pub use crate::sessions::config::{MatchConfig, StabilizerConfig, TimingConfig};

pub use crate::error::{RpsError, RpsResult};

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn prelude_is_enough_to_play_a_round() {
        let mut session = SessionBuilder::new()
            .with_timing_config(TimingConfig::quick())
            .with_seed(1)
            .start_session(DetachedCamera)
            .unwrap();
        session.start_round().unwrap();
        session
            .advance(session.timing().capture_window())
            .unwrap();
        assert_eq!(session.phase(), RoundPhase::Idle);
        assert_eq!(session.match_state().rounds_played, 1);
    }
}
