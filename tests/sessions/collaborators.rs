//! Camera and classifier handling.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use web_time::Duration;

use crate::common::stubs::{RiggedCpu, ScriptedCamera, ScriptedClassifier};
use crate::common::{drain, play_round, rigged_session};
use rps_referee::telemetry::{CollectingObserver, ViolationKind};
use rps_referee::{
    BorderColor, Classification, GameEvent, Gesture, MatchState, RoundOutcome, RoundPhase,
    RpsError, SampleVerdict, SessionBuilder,
};

#[test]
fn camera_runs_only_during_the_countdown() {
    let mut session = rigged_session(Gesture::Rock);
    session.start_round().unwrap();
    assert!(session.camera().running);
    assert_eq!(session.camera().starts, 1);

    session.advance(Duration::from_secs(3)).unwrap();
    assert!(!session.camera().running);
    assert_eq!(session.camera().stops, 1);
}

#[test]
fn camera_refusal_abandons_the_round() {
    let mut session = SessionBuilder::new()
        .start_session_with_rng(ScriptedCamera::refusing("permission denied"), RiggedCpu::always(Gesture::Rock))
        .unwrap();

    let err = session.start_round().unwrap_err();
    assert!(matches!(err, RpsError::Camera(_)));
    assert!(err.to_string().contains("permission denied"));
    assert_eq!(session.phase(), RoundPhase::Idle);
    assert_eq!(session.match_state(), MatchState::default());
    assert_eq!(
        drain(&mut session),
        [GameEvent::CameraFailed {
            message: "permission denied".to_owned()
        }]
    );

    // The camera recovers; the next round plays normally as round 1
    let report = play_round(&mut session, Some("Paper"));
    assert_eq!(report.round, 1);
    assert_eq!(report.outcome, RoundOutcome::PlayerWin);
}

#[test]
fn camera_failure_mid_round_is_not_scored() {
    let observer = Arc::new(CollectingObserver::new());
    let mut session = SessionBuilder::new()
        .with_violation_observer(observer.clone())
        .start_session_with_rng(ScriptedCamera::new(), RiggedCpu::always(Gesture::Rock))
        .unwrap();
    session.start_round().unwrap();
    session.advance(Duration::from_millis(1200)).unwrap();
    let _ = drain(&mut session);

    session.report_camera_failure("usb unplugged");

    assert_eq!(
        drain(&mut session),
        [
            GameEvent::CameraFailed {
                message: "usb unplugged".to_owned()
            },
            GameEvent::RoundAbandoned { round: 1 },
            GameEvent::BorderColorChanged {
                color: BorderColor::White
            },
        ]
    );
    assert!(!session.camera().running);
    assert_eq!(session.match_state().rounds_played, 0);
    rps_referee::assert_violation!(observer, ViolationKind::Collaborator);

    session.advance(Duration::from_secs(5)).unwrap();
    assert!(drain(&mut session).is_empty());
}

#[test]
fn frames_are_classified_only_while_counting() {
    let mut session = rigged_session(Gesture::Scissors);
    let mut classifier = ScriptedClassifier::new().then_sees("Rock", 0.9);

    assert_eq!(session.process_frame(&mut classifier, &0), None);
    assert!(classifier.frames_seen.is_empty());

    session.start_round().unwrap();
    assert_eq!(
        session.process_frame(&mut classifier, &1),
        Some(SampleVerdict::Accepted(Gesture::Rock))
    );
    assert_eq!(classifier.frames_seen, [1]);
}

#[test]
fn classifier_noise_is_smoothed_out() {
    let mut session = rigged_session(Gesture::Paper);
    let mut classifier = ScriptedClassifier::new()
        .then_sees("scissors", 0.8)
        .then_fails("model not ready")
        .then_sees_nothing()
        .then_sees("Paper", 0.3)
        .then_sees("✌️", 0.95)
        .then_sees("Rock", 0.7)
        .then_sees(" Scissors ", 0.6);

    session.start_round().unwrap();
    for frame in 0..7 {
        session.process_frame(&mut classifier, &frame);
        session.advance(Duration::from_millis(100)).unwrap();
    }
    session.advance(Duration::from_secs(3)).unwrap();

    let report = session.last_round().unwrap();
    assert_eq!(report.player, Some(Gesture::Scissors));
    assert_eq!(report.outcome, RoundOutcome::PlayerWin);
}

#[test]
fn low_confidence_only_means_no_detection() {
    let mut session = rigged_session(Gesture::Rock);
    session.start_round().unwrap();
    for _ in 0..10 {
        assert_eq!(
            session.submit_classification(Classification::new("Paper", 0.2)),
            Some(SampleVerdict::BelowThreshold)
        );
    }
    session.advance(Duration::from_secs(3)).unwrap();
    assert_eq!(session.last_round().unwrap().outcome, RoundOutcome::NoDetection);
}

#[test]
fn previous_round_evidence_does_not_carry_over() {
    let mut session = rigged_session(Gesture::Rock);
    play_round(&mut session, Some("Paper"));

    // Two samples are not enough on their own
    session.start_round().unwrap();
    session.submit_classification(Classification::new("Paper", 0.9));
    session.submit_classification(Classification::new("Paper", 0.9));
    session.advance(Duration::from_secs(3)).unwrap();
    assert_eq!(session.last_round().unwrap().outcome, RoundOutcome::NoDetection);
}

#[test]
fn invalid_confidence_is_reported() {
    let observer = Arc::new(CollectingObserver::new());
    let mut session = SessionBuilder::new()
        .with_violation_observer(observer.clone())
        .start_session_with_rng(ScriptedCamera::new(), RiggedCpu::always(Gesture::Rock))
        .unwrap();
    session.start_round().unwrap();
    assert_eq!(
        session.submit_classification(Classification::new("Rock", f32::NAN)),
        Some(SampleVerdict::Malformed)
    );
    rps_referee::assert_violation!(observer, ViolationKind::Stabilizer);
}
