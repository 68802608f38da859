//! Common test infrastructure shared across integration tests.
//!
//! - `stubs`: scripted camera, classifier and CPU random source
//! - helpers below to build sessions and play whole rounds
//!
//! # Usage
//!
//! ```ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! use common::{play_round, rigged_session};
//! ```

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod stubs;

use rps_referee::{Classification, GameEvent, GameSession, Gesture, RoundReport, SessionBuilder};

use stubs::{RiggedCpu, ScriptedCamera};

/// Number of cases for property tests that drive whole sessions.
///
/// Lower than the crate's unit-level `case_count()` (256): every case here
/// builds a session and plays up to dozens of rounds of virtual time.
/// Drops to 5 under Miri.
#[must_use]
pub const fn session_case_count() -> u32 {
    if cfg!(miri) {
        5
    } else {
        64
    }
}

/// A session whose CPU always throws `cpu`.
pub fn rigged_session(cpu: Gesture) -> GameSession<ScriptedCamera, RiggedCpu> {
    rigged_builder(SessionBuilder::new(), cpu)
}

/// Builds `builder` around a scripted camera and a CPU that always throws `cpu`.
pub fn rigged_builder(
    builder: SessionBuilder,
    cpu: Gesture,
) -> GameSession<ScriptedCamera, RiggedCpu> {
    builder
        .start_session_with_rng(ScriptedCamera::new(), RiggedCpu::always(cpu))
        .expect("default configuration is valid")
}

/// Plays one round to completion, showing `label` (with high confidence) three
/// times halfway through the countdown, or nothing for `None`.
pub fn play_round<K, R>(session: &mut GameSession<K, R>, label: Option<&str>) -> RoundReport
where
    K: rps_referee::CaptureDevice,
    R: rps_referee::rng::Rng,
{
    session.start_round().expect("round should start");
    let window = session.timing().capture_window();
    session.advance(window / 2).unwrap();
    if let Some(label) = label {
        for _ in 0..3 {
            session.submit_classification(Classification::new(label, 0.9));
        }
    }
    session.advance(window - window / 2).unwrap();
    *session.last_round().expect("round should have resolved")
}

/// Drains all pending events.
pub fn drain<K, R>(session: &mut GameSession<K, R>) -> Vec<GameEvent>
where
    K: rps_referee::CaptureDevice,
    R: rps_referee::rng::Rng,
{
    session.events().collect()
}
