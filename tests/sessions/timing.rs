//! Countdown, animation and border pulse cadence.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use web_time::Duration;

use crate::common::{drain, rigged_builder, rigged_session};
use rps_referee::{
    BorderColor, Classification, CountdownValue, GameEvent, Gesture, InvalidRequestKind,
    RoundPhase, RpsError, SessionBuilder, TimingConfig,
};

fn countdown_values(events: &[GameEvent]) -> Vec<CountdownValue> {
    events
        .iter()
        .filter_map(|e| match e {
            GameEvent::CountdownTick { value } => Some(*value),
            _ => None,
        })
        .collect()
}

#[test]
fn countdown_fires_once_per_second() {
    let mut session = rigged_session(Gesture::Rock);
    session.start_round().unwrap();
    assert_eq!(countdown_values(&drain(&mut session)), [CountdownValue::Count(3)]);

    session.advance(Duration::from_millis(999)).unwrap();
    assert!(countdown_values(&drain(&mut session)).is_empty());

    session.advance(Duration::from_millis(1)).unwrap();
    assert_eq!(countdown_values(&drain(&mut session)), [CountdownValue::Count(2)]);

    session.advance(Duration::from_secs(1)).unwrap();
    assert_eq!(countdown_values(&drain(&mut session)), [CountdownValue::Count(1)]);
    assert!(session.phase().is_counting());

    session.advance(Duration::from_secs(1)).unwrap();
    assert_eq!(countdown_values(&drain(&mut session)), [CountdownValue::Go]);
    assert_eq!(session.phase(), RoundPhase::Idle);
}

#[test]
fn border_pulses_through_the_cycle_then_takes_the_outcome_tint() {
    let mut session = rigged_session(Gesture::Scissors);
    session.start_round().unwrap();
    for _ in 0..3 {
        session.submit_classification(Classification::new("Rock", 0.9));
    }
    session.advance(Duration::from_secs(3)).unwrap();

    let colours: Vec<BorderColor> = drain(&mut session)
        .into_iter()
        .filter_map(|e| match e {
            GameEvent::BorderColorChanged { color } => Some(color),
            _ => None,
        })
        .collect();
    // Pulses at 0.8s, 1.6s and 2.4s, then the win tint
    assert_eq!(
        colours,
        [
            BorderColor::Red,
            BorderColor::Yellow,
            BorderColor::Green,
            BorderColor::Green
        ]
    );
    assert_eq!(session.border(), BorderColor::Green);
}

#[test]
fn tiny_steps_and_one_big_step_agree() {
    let mut whole = rigged_session(Gesture::Paper);
    let mut pieces = rigged_session(Gesture::Paper);
    whole.start_round().unwrap();
    pieces.start_round().unwrap();

    whole.advance(Duration::from_secs(3)).unwrap();
    for _ in 0..300 {
        pieces.advance(Duration::from_millis(10)).unwrap();
    }
    assert_eq!(drain(&mut whole), drain(&mut pieces));
}

#[test]
fn samples_after_the_lock_are_ignored() {
    let mut session = rigged_session(Gesture::Rock);
    session.start_round().unwrap();
    session.advance(Duration::from_secs(3)).unwrap();
    assert_eq!(
        session.submit_classification(Classification::new("Paper", 0.9)),
        None
    );
    assert_eq!(session.last_round().unwrap().player, None);
}

#[test]
fn stop_cancels_every_timer() {
    let mut session = rigged_session(Gesture::Rock);
    session.start_round().unwrap();
    session.advance(Duration::from_millis(1500)).unwrap();
    assert!(session.stop_round());
    let _ = drain(&mut session);

    session.advance(Duration::from_secs(10)).unwrap();
    assert!(drain(&mut session).is_empty());
    assert_eq!(session.match_state().rounds_played, 0);
    assert_eq!(session.displayed_cpu(), None);
}

#[test]
fn restarting_after_stop_begins_a_fresh_countdown() {
    let mut session = rigged_session(Gesture::Rock);
    session.start_round().unwrap();
    session.advance(Duration::from_millis(2500)).unwrap();
    session.stop_round();
    let _ = drain(&mut session);

    session.start_round().unwrap();
    session.advance(Duration::from_millis(2500)).unwrap();
    assert!(session.phase().is_counting());
    session.advance(Duration::from_millis(500)).unwrap();
    assert_eq!(session.phase(), RoundPhase::Idle);
}

#[test]
fn start_while_counting_is_refused() {
    let mut session = rigged_session(Gesture::Rock);
    session.start_round().unwrap();
    assert_eq!(
        session.start_round(),
        Err(RpsError::InvalidRequest {
            kind: InvalidRequestKind::RoundInProgress
        })
    );
    assert_eq!(session.camera().starts, 1);
}

#[test]
fn quick_timing_shortens_the_round() {
    let mut session = rigged_builder(
        SessionBuilder::new().with_timing_config(TimingConfig::quick()),
        Gesture::Rock,
    );
    session.start_round().unwrap();
    session.advance(Duration::from_millis(1499)).unwrap();
    assert!(session.phase().is_counting());
    session.advance(Duration::from_millis(1)).unwrap();
    assert_eq!(session.phase(), RoundPhase::Idle);
}

#[test]
fn cpu_animation_is_visible_before_the_lock() {
    let mut session = rigged_session(Gesture::Paper);
    session.start_round().unwrap();
    assert_eq!(session.displayed_cpu(), None);
    session.advance(Duration::from_millis(300)).unwrap();
    assert_eq!(session.displayed_cpu(), Some(Gesture::Paper));
    assert!(drain(&mut session).contains(&GameEvent::CpuChoiceChanged {
        gesture: Gesture::Paper
    }));
}
