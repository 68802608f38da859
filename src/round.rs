//! The per-round state machine.
//!
//! A [`RoundSession`] only tracks where a round is; the stabilizer, CPU
//! chooser, timers and scorer that feed it are owned by
//! [`GameSession`](crate::GameSession). Every transition checks the phase it
//! starts from and refuses (with [`RoundTransitionError`]) if it is wrong.
//!
//! ```text
//! Idle ──begin (3)──▶ Counting{3} ──tick (2)──▶ Counting{2} ──tick (1)──▶ Counting{1}
//!                                                                          │ tick (Go)
//!                                                                          ▼
//!                                  Resolved{outcome} ◀──resolve── Locked{player, cpu}
//! ```

use std::fmt;

use tracing::debug;

use crate::{BorderColor, Gesture, RoundOutcome};

/// Where a round is.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RoundPhase {
    /// No round running.
    #[default]
    Idle,
    /// Countdown running.
    Counting {
        /// Countdown ticks left before "Go".
        ticks_remaining: u8,
    },
    /// Both gestures captured.
    Locked {
        /// Stabilized player gesture, `None` if no hand was seen.
        player: Option<Gesture>,
        /// Committed CPU gesture.
        cpu: Gesture,
    },
    /// Outcome decided.
    Resolved {
        /// How the round ended.
        outcome: RoundOutcome,
    },
}

impl RoundPhase {
    /// Returns true while the countdown runs.
    #[must_use]
    pub const fn is_counting(&self) -> bool {
        matches!(self, Self::Counting { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Counting { .. } => "Counting",
            Self::Locked { .. } => "Locked",
            Self::Resolved { .. } => "Resolved",
        }
    }
}

/// A value shown by the countdown.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CountdownValue {
    /// A number, counting down.
    Count(u8),
    /// The final tick. The round locks on it.
    Go,
}

impl fmt::Display for CountdownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Go => f.write_str("Go"),
        }
    }
}

/// Summary of a resolved round.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoundReport {
    /// 1-based round number within the match.
    pub round: u32,
    /// Locked player gesture.
    pub player: Option<Gesture>,
    /// Committed CPU gesture.
    pub cpu: Gesture,
    /// What the CPU animation showed last; may differ from `cpu`.
    pub displayed_cpu: Option<Gesture>,
    /// How the round ended.
    pub outcome: RoundOutcome,
}

/// A transition was attempted from the wrong phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RoundTransitionError {
    /// The attempted transition.
    pub transition: &'static str,
    /// The phase the round was in.
    pub from: RoundPhase,
}

impl fmt::Display for RoundTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot {} a round in phase {}", self.transition, self.from.name())
    }
}

impl std::error::Error for RoundTransitionError {}

/// State of the round in progress (or of the last one).
#[derive(Debug, Clone)]
pub struct RoundSession {
    round: u32,
    phase: RoundPhase,
    pulse_index: usize,
    border: BorderColor,
    last_prediction: Option<Gesture>,
}

impl RoundSession {
    /// An idle session before the first round.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            round: 0,
            phase: RoundPhase::Idle,
            pulse_index: 0,
            border: BorderColor::White,
            last_prediction: None,
        }
    }

    /// Starts round number `round` with a countdown of `ticks` values.
    ///
    /// Returns the first value shown, which is emitted immediately.
    pub fn begin(&mut self, round: u32, ticks: u8) -> Result<CountdownValue, RoundTransitionError> {
        if self.phase.is_counting() || matches!(self.phase, RoundPhase::Locked { .. }) {
            return Err(self.refuse("begin"));
        }
        let ticks = ticks.max(1);
        self.round = round;
        self.phase = RoundPhase::Counting {
            ticks_remaining: ticks,
        };
        self.pulse_index = 0;
        self.last_prediction = None;
        debug!(round, ticks, "round counting");
        Ok(CountdownValue::Count(ticks))
    }

    /// Advances the countdown by one tick and returns the value to show.
    ///
    /// [`CountdownValue::Go`] means the caller must [`lock`](Self::lock) now.
    pub fn countdown_tick(&mut self) -> Result<CountdownValue, RoundTransitionError> {
        let RoundPhase::Counting { ticks_remaining } = self.phase else {
            return Err(self.refuse("tick"));
        };
        let ticks_remaining = ticks_remaining.saturating_sub(1);
        self.phase = RoundPhase::Counting { ticks_remaining };
        Ok(match ticks_remaining {
            0 => CountdownValue::Go,
            n => CountdownValue::Count(n),
        })
    }

    /// Captures both gestures.
    pub fn lock(&mut self, player: Option<Gesture>, cpu: Gesture) -> Result<(), RoundTransitionError> {
        if !self.phase.is_counting() {
            return Err(self.refuse("lock"));
        }
        self.phase = RoundPhase::Locked { player, cpu };
        debug!(round = self.round, ?player, %cpu, "round locked");
        Ok(())
    }

    /// Decides the outcome of a locked round.
    pub fn resolve(
        &mut self,
        displayed_cpu: Option<Gesture>,
    ) -> Result<RoundReport, RoundTransitionError> {
        let RoundPhase::Locked { player, cpu } = self.phase else {
            return Err(self.refuse("resolve"));
        };
        let outcome = RoundOutcome::resolve(player, cpu);
        self.phase = RoundPhase::Resolved { outcome };
        self.border = outcome.tint();
        Ok(RoundReport {
            round: self.round,
            player,
            cpu,
            displayed_cpu,
            outcome,
        })
    }

    /// Drops a counting round without scoring it. Returns false if nothing was running.
    pub fn abandon(&mut self) -> bool {
        if !self.phase.is_counting() {
            return false;
        }
        debug!(round = self.round, "round abandoned");
        self.phase = RoundPhase::Idle;
        self.border = BorderColor::White;
        self.last_prediction = None;
        true
    }

    /// Back to idle after a resolution. The border keeps its outcome tint.
    pub fn settle(&mut self) {
        if matches!(self.phase, RoundPhase::Resolved { .. }) {
            self.phase = RoundPhase::Idle;
        }
    }

    /// Forgets everything, as before the first round.
    pub fn clear(&mut self) {
        *self = Self::idle();
    }

    /// Next colour of the countdown pulse.
    pub fn next_pulse(&mut self) -> BorderColor {
        let color = BorderColor::PULSE_CYCLE
            .get(self.pulse_index % BorderColor::PULSE_CYCLE.len())
            .copied()
            .unwrap_or_default();
        self.pulse_index = self.pulse_index.wrapping_add(1);
        self.border = color;
        color
    }

    /// Records the latest stabilized prediction. Returns true if it changed.
    pub fn note_prediction(&mut self, prediction: Option<Gesture>) -> bool {
        if self.last_prediction == prediction {
            return false;
        }
        self.last_prediction = prediction;
        true
    }

    /// The phase.
    #[must_use]
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// The current round number, 0 before the first round.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// The current border colour.
    #[must_use]
    pub fn border(&self) -> BorderColor {
        self.border
    }

    /// The last prediction recorded with [`note_prediction`](Self::note_prediction).
    #[must_use]
    pub fn last_prediction(&self) -> Option<Gesture> {
        self.last_prediction
    }

    fn refuse(&self, transition: &'static str) -> RoundTransitionError {
        RoundTransitionError {
            transition,
            from: self.phase,
        }
    }
}

impl Default for RoundSession {
    fn default() -> Self {
        Self::idle()
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

    #[test]
    fn countdown_shows_three_two_one_go() {
        let mut round = RoundSession::idle();
        let mut shown = vec![round.begin(1, 3).unwrap()];
        for _ in 0..3 {
            shown.push(round.countdown_tick().unwrap());
        }
        assert_eq!(
            shown,
            [
                CountdownValue::Count(3),
                CountdownValue::Count(2),
                CountdownValue::Count(1),
                CountdownValue::Go
            ]
        );
        assert_eq!(round.phase(), RoundPhase::Counting { ticks_remaining: 0 });
    }

    #[test]
    fn zero_ticks_still_counts_once() {
        let mut round = RoundSession::idle();
        assert_eq!(round.begin(1, 0).unwrap(), CountdownValue::Count(1));
        assert_eq!(round.countdown_tick().unwrap(), CountdownValue::Go);
    }

    #[test]
    fn full_lifecycle() {
        let mut round = RoundSession::idle();
        round.begin(1, 2).unwrap();
        assert_eq!(round.countdown_tick().unwrap(), CountdownValue::Count(1));
        assert_eq!(round.countdown_tick().unwrap(), CountdownValue::Go);
        round.lock(Some(Gesture::Rock), Gesture::Scissors).unwrap();
        let report = round.resolve(Some(Gesture::Paper)).unwrap();
        assert_eq!(report.outcome, RoundOutcome::PlayerWin);
        assert_eq!(report.displayed_cpu, Some(Gesture::Paper));
        assert_eq!(round.border(), BorderColor::Green);
        round.settle();
        assert_eq!(round.phase(), RoundPhase::Idle);
    }

    #[test]
    fn begin_refused_while_counting() {
        let mut round = RoundSession::idle();
        round.begin(1, 3).unwrap();
        let err = round.begin(2, 3).unwrap_err();
        assert_eq!(err.transition, "begin");
        assert_eq!(err.to_string(), "cannot begin a round in phase Counting");
    }

    #[test]
    fn lock_and_resolve_need_the_right_phase() {
        let mut round = RoundSession::idle();
        assert!(round.lock(None, Gesture::Rock).is_err());
        assert!(round.resolve(None).is_err());
        assert!(round.countdown_tick().is_err());
    }

    #[test]
    fn missing_player_resolves_to_no_detection() {
        let mut round = RoundSession::idle();
        round.begin(3, 1).unwrap();
        round.lock(None, Gesture::Paper).unwrap();
        let report = round.resolve(None).unwrap();
        assert_eq!(report.outcome, RoundOutcome::NoDetection);
        assert_eq!(report.round, 3);
        assert_eq!(round.border(), BorderColor::Gray);
    }

    #[test]
    fn abandon_only_while_counting() {
        let mut round = RoundSession::idle();
        assert!(!round.abandon());
        round.begin(1, 3).unwrap();
        round.next_pulse();
        assert!(round.abandon());
        assert_eq!(round.phase(), RoundPhase::Idle);
        assert_eq!(round.border(), BorderColor::White);
    }

    #[test]
    fn pulse_cycles_through_five_colours() {
        let mut round = RoundSession::idle();
        round.begin(1, 3).unwrap();
        let colours: Vec<_> = (0..6).map(|_| round.next_pulse()).collect();
        assert_eq!(
            colours,
            [
                BorderColor::Red,
                BorderColor::Yellow,
                BorderColor::Green,
                BorderColor::Blue,
                BorderColor::Purple,
                BorderColor::Red
            ]
        );
    }

    #[test]
    fn prediction_changes_are_detected() {
        let mut round = RoundSession::idle();
        assert!(!round.note_prediction(None));
        assert!(round.note_prediction(Some(Gesture::Rock)));
        assert!(!round.note_prediction(Some(Gesture::Rock)));
        assert!(round.note_prediction(None));
    }

    #[test]
    fn countdown_value_display() {
        assert_eq!(CountdownValue::Count(2).to_string(), "2");
        assert_eq!(CountdownValue::Go.to_string(), "Go");
    }
}
