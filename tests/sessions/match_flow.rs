//! Match scoring across full rounds.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use crate::common::{drain, play_round, rigged_builder, rigged_session};
use rps_referee::telemetry::CollectingObserver;
use rps_referee::{
    GameEvent, Gesture, InvalidRequestKind, MatchConfig, MatchState, RoundOutcome, RoundPhase,
    RpsError, SessionBuilder,
};

#[test]
fn rock_beats_rigged_scissors() {
    let mut session = rigged_session(Gesture::Scissors);
    let report = play_round(&mut session, Some("Rock"));

    assert_eq!(report.player, Some(Gesture::Rock));
    assert_eq!(report.cpu, Gesture::Scissors);
    assert_eq!(report.outcome, RoundOutcome::PlayerWin);
    assert_eq!(session.match_state().player_score, 1);
}

#[test]
fn three_player_wins_end_the_match_after_the_second() {
    let mut session = rigged_session(Gesture::Paper);

    let first = play_round(&mut session, Some("Scissors"));
    assert_eq!(first.outcome, RoundOutcome::PlayerWin);
    assert!(!drain(&mut session).contains(&GameEvent::MatchEnded { player_won: true }));

    let second = play_round(&mut session, Some("Scissors"));
    assert_eq!(second.outcome, RoundOutcome::PlayerWin);
    let events = drain(&mut session);
    let resolved = events
        .iter()
        .position(|e| matches!(e, GameEvent::RoundResolved { .. }))
        .unwrap();
    let ended = events
        .iter()
        .position(|e| *e == GameEvent::MatchEnded { player_won: true })
        .unwrap();
    assert!(resolved < ended);

    assert_eq!(
        session.start_round(),
        Err(RpsError::InvalidRequest {
            kind: InvalidRequestKind::MatchOver
        })
    );
    assert_eq!(
        session.match_state(),
        MatchState {
            player_score: 2,
            cpu_score: 0,
            rounds_played: 2,
            match_over: true,
        }
    );
}

#[test]
fn no_hand_is_counted_but_not_scored() {
    let mut session = rigged_session(Gesture::Rock);
    let report = play_round(&mut session, None);

    assert_eq!(report.outcome, RoundOutcome::NoDetection);
    assert_eq!(report.player, None);
    let state = session.match_state();
    assert_eq!((state.player_score, state.cpu_score, state.rounds_played), (0, 0, 1));
    assert!(!state.match_over);
}

#[test]
fn resolved_event_reports_score_after_the_round() {
    let mut session = rigged_session(Gesture::Rock);
    play_round(&mut session, Some("Scissors"));

    let resolved = drain(&mut session)
        .into_iter()
        .find_map(|e| match e {
            GameEvent::RoundResolved {
                outcome,
                state,
                player,
                cpu,
            } => Some((outcome, state, player, cpu)),
            _ => None,
        })
        .unwrap();
    assert_eq!(resolved.0, RoundOutcome::CpuWin);
    assert_eq!(resolved.1.cpu_score, 1);
    assert_eq!(resolved.2, Some(Gesture::Scissors));
    assert_eq!(resolved.3, Gesture::Rock);
}

#[test]
fn ties_and_no_detections_do_not_end_the_match() {
    let mut session = rigged_session(Gesture::Paper);
    for _ in 0..5 {
        play_round(&mut session, Some("Paper"));
        play_round(&mut session, None);
    }
    let state = session.match_state();
    assert_eq!(state.rounds_played, 10);
    assert!(!state.match_over);
}

#[test]
fn new_game_allows_play_after_match_end() {
    let mut session = rigged_session(Gesture::Rock);
    play_round(&mut session, Some("Scissors"));
    play_round(&mut session, Some("Scissors"));
    assert!(session.match_state().match_over);
    assert!(drain(&mut session).contains(&GameEvent::MatchEnded { player_won: false }));

    session.new_game();
    assert_eq!(drain(&mut session), [GameEvent::MatchReset]);
    assert_eq!(session.match_state(), MatchState::default());

    let report = play_round(&mut session, Some("Paper"));
    assert_eq!(report.round, 1);
    assert_eq!(report.outcome, RoundOutcome::PlayerWin);
}

#[test]
fn round_numbers_follow_rounds_played() {
    let mut session = rigged_session(Gesture::Rock);
    let numbers: Vec<u32> = (0..3)
        .map(|_| play_round(&mut session, Some("Rock")).round)
        .collect();
    assert_eq!(numbers, [1, 2, 3]);
}

#[test]
fn longer_match_needs_three_wins() {
    let mut session = rigged_builder(
        SessionBuilder::new().with_match_config(MatchConfig::best_of(5)),
        Gesture::Scissors,
    );
    play_round(&mut session, Some("Rock"));
    play_round(&mut session, Some("Rock"));
    assert!(!session.match_state().match_over);
    play_round(&mut session, Some("Rock"));
    assert!(session.match_state().match_over);
    assert_eq!(session.phase(), RoundPhase::Idle);
}

#[test]
fn clean_match_reports_no_violations() {
    let observer = Arc::new(CollectingObserver::new());
    let mut session = rigged_builder(
        SessionBuilder::new().with_violation_observer(observer.clone()),
        Gesture::Paper,
    );
    play_round(&mut session, Some("Rock"));
    play_round(&mut session, Some("Scissors"));
    play_round(&mut session, Some("Scissors"));
    rps_referee::assert_no_violations!(observer);
}
