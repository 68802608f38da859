//! Match scoring.

use std::sync::Arc;

use tracing::{debug, info};

use crate::report_violation_to;
use crate::telemetry::{
    InvariantChecker, InvariantViolation, ViolationKind, ViolationObserver, ViolationSeverity,
};
use crate::{MatchConfig, RoundOutcome};

/// Running score of a match.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MatchState {
    /// Rounds won by the player.
    pub player_score: u32,
    /// Rounds won by the CPU.
    pub cpu_score: u32,
    /// Every resolved round, ties and no-detections included.
    pub rounds_played: u32,
    /// Set once either score reaches the win threshold.
    pub match_over: bool,
}

impl MatchState {
    /// Who won, once the match is over. `Some(true)` means the player.
    #[must_use]
    pub fn player_won(&self) -> Option<bool> {
        self.match_over
            .then_some(self.player_score > self.cpu_score)
    }
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "You {} - {} CPU after {} round(s)",
            self.player_score, self.cpu_score, self.rounds_played
        )?;
        if self.match_over {
            write!(f, " (match over)")?;
        }
        Ok(())
    }
}

/// Owns the [`MatchState`] and is the only thing allowed to change it.
pub struct MatchScorer {
    config: MatchConfig,
    state: MatchState,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for MatchScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchScorer")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl MatchScorer {
    /// A scorer at 0-0.
    #[must_use]
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            state: MatchState::default(),
            violation_observer: None,
        }
    }

    /// Routes refusal reports to `observer`.
    #[must_use]
    pub fn with_violation_observer(mut self, observer: Option<Arc<dyn ViolationObserver>>) -> Self {
        self.violation_observer = observer;
        self
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> MatchState {
        self.state
    }

    /// The configuration in use.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Folds one round outcome into the score and returns the new state.
    ///
    /// Once the match is over further outcomes are refused: the state is
    /// returned unchanged and a [`ViolationKind::Scoring`] violation is
    /// reported.
    ///
    /// ```
    /// use rps_referee::{MatchConfig, MatchScorer, RoundOutcome};
    ///
    /// let mut scorer = MatchScorer::new(MatchConfig::default());
    /// scorer.apply(RoundOutcome::Tie);
    /// let state = scorer.apply(RoundOutcome::PlayerWin);
    /// assert_eq!((state.player_score, state.cpu_score, state.rounds_played), (1, 0, 2));
    /// assert!(!state.match_over);
    /// ```
    pub fn apply(&mut self, outcome: RoundOutcome) -> MatchState {
        if self.state.match_over {
            report_violation_to!(
                &self.violation_observer,
                ViolationSeverity::Error,
                ViolationKind::Scoring,
                "outcome {:?} applied to a finished match ({})",
                outcome,
                self.state
            );
            return self.state;
        }

        match outcome {
            RoundOutcome::PlayerWin => self.state.player_score += 1,
            RoundOutcome::CpuWin => self.state.cpu_score += 1,
            RoundOutcome::Tie | RoundOutcome::NoDetection => {},
        }
        self.state.rounds_played += 1;

        let threshold = self.config.win_threshold;
        self.state.match_over =
            self.state.player_score >= threshold || self.state.cpu_score >= threshold;

        if self.state.match_over {
            info!(state = %self.state, "match decided");
        } else {
            debug!(?outcome, state = %self.state, "score updated");
        }
        crate::debug_check_invariants!(self, "after apply");
        self.state
    }

    /// Back to 0-0 for a new match.
    pub fn reset_match(&mut self) {
        debug!(previous = %self.state, "match reset");
        self.state = MatchState::default();
    }
}

impl InvariantChecker for MatchScorer {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let state = &self.state;
        let threshold = self.config.win_threshold;
        if state.player_score > threshold || state.cpu_score > threshold {
            return Err(
                InvariantViolation::new("MatchScorer", "score passed the win threshold")
                    .with_details(format!("{state}, threshold={threshold}")),
            );
        }
        let decided = state.player_score >= threshold || state.cpu_score >= threshold;
        if decided != state.match_over {
            return Err(InvariantViolation::new(
                "MatchScorer",
                "match_over disagrees with the scores",
            )
            .with_details(format!("{state}, threshold={threshold}")));
        }
        if state.player_score.saturating_add(state.cpu_score) > state.rounds_played {
            return Err(InvariantViolation::new(
                "MatchScorer",
                "more wins than rounds played",
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

    #[test]
    fn outcomes_move_the_right_counter() {
        let mut scorer = MatchScorer::new(MatchConfig::default());
        assert_eq!(scorer.apply(RoundOutcome::CpuWin).cpu_score, 1);
        let state = scorer.apply(RoundOutcome::NoDetection);
        assert_eq!(state.player_score, 0);
        assert_eq!(state.cpu_score, 1);
        assert_eq!(state.rounds_played, 2);
    }

    #[test]
    fn two_wins_end_the_match() {
        let mut scorer = MatchScorer::new(MatchConfig::default());
        scorer.apply(RoundOutcome::PlayerWin);
        scorer.apply(RoundOutcome::CpuWin);
        assert!(!scorer.state().match_over);
        let state = scorer.apply(RoundOutcome::PlayerWin);
        assert!(state.match_over);
        assert_eq!(state.player_won(), Some(true));
    }

    #[test]
    fn finished_match_refuses_more_outcomes() {
        let observer = Arc::new(CollectingObserver::new());
        let mut scorer =
            MatchScorer::new(MatchConfig::default()).with_violation_observer(Some(observer.clone()));
        scorer.apply(RoundOutcome::CpuWin);
        let finished = scorer.apply(RoundOutcome::CpuWin);

        let after = scorer.apply(RoundOutcome::CpuWin);

        assert_eq!(after, finished);
        assert_eq!(after.cpu_score, 2);
        crate::assert_violation!(observer, ViolationKind::Scoring);
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut scorer = MatchScorer::new(MatchConfig::default());
        scorer.apply(RoundOutcome::PlayerWin);
        scorer.apply(RoundOutcome::PlayerWin);
        scorer.reset_match();
        assert_eq!(scorer.state(), MatchState::default());
        assert_eq!(scorer.state().player_won(), None);
    }

    #[test]
    fn single_round_config_ends_after_one_win() {
        let mut scorer = MatchScorer::new(MatchConfig::single_round());
        scorer.apply(RoundOutcome::Tie);
        assert!(!scorer.state().match_over);
        assert!(scorer.apply(RoundOutcome::CpuWin).match_over);
        assert_eq!(scorer.state().player_won(), Some(false));
    }

    #[test]
    fn display_reads_like_a_scoreboard() {
        let state = MatchState {
            player_score: 2,
            cpu_score: 1,
            rounds_played: 4,
            match_over: true,
        };
        assert_eq!(state.to_string(), "You 2 - 1 CPU after 4 round(s) (match over)");
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod property_tests {
    use super::*;
    use crate::test_config::case_count;
    use proptest::prelude::*;

    fn outcome() -> impl Strategy<Value = RoundOutcome> {
        prop_oneof![
            Just(RoundOutcome::PlayerWin),
            Just(RoundOutcome::CpuWin),
            Just(RoundOutcome::Tie),
            Just(RoundOutcome::NoDetection),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: case_count(),
            ..ProptestConfig::default()
        })]

        /// The match ends exactly when a score reaches two, and no score ever passes two.
        #[test]
        fn prop_match_over_iff_threshold(outcomes in prop::collection::vec(outcome(), 0..20)) {
            let mut scorer = MatchScorer::new(MatchConfig::default());
            for outcome in outcomes {
                let state = scorer.apply(outcome);
                prop_assert!(state.player_score <= 2 && state.cpu_score <= 2);
                prop_assert_eq!(state.match_over, state.player_score == 2 || state.cpu_score == 2);
                prop_assert!(scorer.check_invariants().is_ok());
            }
        }

        /// Rounds played counts every outcome until the match is decided.
        #[test]
        fn prop_rounds_played_counts_until_decided(outcomes in prop::collection::vec(outcome(), 0..20)) {
            let mut scorer = MatchScorer::new(MatchConfig::default());
            let mut expected = 0u32;
            for outcome in outcomes {
                if !scorer.state().match_over {
                    expected += 1;
                }
                prop_assert_eq!(scorer.apply(outcome).rounds_played, expected);
            }
        }

        #[test]
        fn prop_reset_always_zeroes(outcomes in prop::collection::vec(outcome(), 0..10)) {
            let mut scorer = MatchScorer::new(MatchConfig::default());
            for outcome in outcomes {
                scorer.apply(outcome);
            }
            scorer.reset_match();
            prop_assert_eq!(scorer.state(), MatchState::default());
        }
    }
}
