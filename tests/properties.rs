//! Property tests over whole sessions.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

#[path = "common/mod.rs"]
mod common;

use common::session_case_count as case_count;
use proptest::prelude::*;
use web_time::Duration;

use rps_referee::{
    Classification, DetachedCamera, GameEvent, Gesture, MatchState, RoundOutcome, SessionBuilder,
};

#[derive(Debug, Clone)]
enum Action {
    Start,
    Stop,
    NewGame,
    Show(&'static str, f32),
    Wait(u64),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        2 => Just(Action::Start),
        1 => Just(Action::Stop),
        1 => Just(Action::NewGame),
        4 => (
            prop_oneof![Just("Rock"), Just("Paper"), Just("Scissors"), Just("fist?")],
            0.0f32..1.0
        )
            .prop_map(|(label, confidence)| Action::Show(label, confidence)),
        4 => (0u64..1500).prop_map(Action::Wait),
    ]
}

fn playable() -> impl Strategy<Value = Gesture> {
    prop_oneof![
        Just(Gesture::Rock),
        Just(Gesture::Paper),
        Just(Gesture::Scissors)
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: case_count(),
        ..ProptestConfig::default()
    })]

    /// Exactly one of tie, player win or CPU win for any pair, and the two
    /// win outcomes mirror each other.
    #[test]
    fn prop_resolution_is_total_and_antisymmetric(p in playable(), c in playable()) {
        let forward = RoundOutcome::resolve(Some(p), c);
        let backward = RoundOutcome::resolve(Some(c), p);
        prop_assert_ne!(forward, RoundOutcome::NoDetection);
        match forward {
            RoundOutcome::Tie => prop_assert_eq!(backward, RoundOutcome::Tie),
            RoundOutcome::PlayerWin => prop_assert_eq!(backward, RoundOutcome::CpuWin),
            RoundOutcome::CpuWin => prop_assert_eq!(backward, RoundOutcome::PlayerWin),
            RoundOutcome::NoDetection => unreachable!(),
        }
        prop_assert_eq!(forward == RoundOutcome::Tie, p == c);
    }

    /// Whatever the caller does, scores never pass two, the match ends exactly
    /// at two, and every resolution is followed by a consistent score.
    #[test]
    fn prop_random_play_keeps_the_score_sane(
        seed in any::<u64>(),
        actions in prop::collection::vec(action(), 1..80)
    ) {
        let mut session = SessionBuilder::new()
            .with_seed(seed)
            .start_session(DetachedCamera)
            .unwrap();
        let mut resolutions = 0u32;
        let mut last_resolved: Option<MatchState> = None;

        for action in actions {
            match action {
                Action::Start => { let _ = session.start_round(); },
                Action::Stop => { session.stop_round(); },
                Action::NewGame => {
                    session.new_game();
                    resolutions = 0;
                },
                Action::Show(label, confidence) => {
                    session.submit_classification(Classification::new(label, confidence));
                },
                Action::Wait(ms) => session.advance(Duration::from_millis(ms)).unwrap(),
            }

            for event in session.events() {
                match event {
                    GameEvent::RoundResolved { state, .. } => {
                        resolutions += 1;
                        prop_assert_eq!(state.rounds_played, resolutions);
                        last_resolved = Some(state);
                    },
                    GameEvent::MatchEnded { player_won } => {
                        prop_assert_eq!(
                            last_resolved.and_then(|state| state.player_won()),
                            Some(player_won)
                        );
                    },
                    GameEvent::MatchReset => resolutions = 0,
                    _ => {},
                }
            }

            let state = session.match_state();
            prop_assert!(state.player_score <= 2 && state.cpu_score <= 2);
            prop_assert_eq!(state.match_over, state.player_score == 2 || state.cpu_score == 2);
            prop_assert!(state.player_score + state.cpu_score <= state.rounds_played);
        }
    }

    /// A round where the same gesture is shown steadily always locks that gesture.
    #[test]
    fn prop_steady_gesture_is_locked(
        seed in any::<u64>(),
        gesture in playable(),
        shows in 3usize..20,
        confidence in 0.5f32..=1.0
    ) {
        let mut session = SessionBuilder::new()
            .with_seed(seed)
            .start_session(DetachedCamera)
            .unwrap();
        session.start_round().unwrap();
        for _ in 0..shows {
            session.submit_classification(Classification::new(gesture.as_str(), confidence));
            session.advance(Duration::from_millis(100)).unwrap();
        }
        session.advance(Duration::from_secs(3)).unwrap();

        let report = session.last_round().unwrap();
        prop_assert_eq!(report.player, Some(gesture));
        prop_assert_eq!(report.outcome, RoundOutcome::resolve(Some(gesture), report.cpu));
    }
}
