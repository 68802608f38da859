//! Prediction stabilization.
//!
//! A hand-pose classifier produces one label per processed frame, and those
//! labels flicker: a fist half-way out of frame is briefly "Paper", motion blur
//! produces low-confidence garbage. The [`PredictionStabilizer`] turns that
//! stream into a single trusted [`Gesture`]:
//!
//! 1. Samples below the confidence threshold are dropped.
//! 2. Accepted labels go into a small FIFO window (oldest evicted).
//! 3. With enough evidence, a label holding a strict majority (seen at least
//!    twice, and more often than any other) wins. Otherwise the most recently
//!    accepted label wins.
//!
//! ```
//! use rps_referee::{Gesture, PredictionSample, PredictionStabilizer, StabilizerConfig};
//!
//! let mut stabilizer = PredictionStabilizer::new(StabilizerConfig::default());
//! stabilizer.observe(PredictionSample::new("Rock", 0.9));
//! stabilizer.observe(PredictionSample::new("Rock", 0.8));
//! assert_eq!(stabilizer.current_stable(), None); // not enough evidence yet
//!
//! stabilizer.observe(PredictionSample::new("Paper", 0.6));
//! assert_eq!(stabilizer.current_stable(), Some(Gesture::Rock));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use crate::report_violation_to;
use crate::telemetry::{
    InvariantChecker, InvariantViolation, ViolationKind, ViolationObserver, ViolationSeverity,
};
use crate::{Classification, Gesture, StabilizerConfig};

/// One classifier output as seen by the stabilizer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PredictionSample {
    /// Free-form label, parsed with [`Gesture::from_label`].
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

impl PredictionSample {
    /// Creates a sample.
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

impl From<Classification> for PredictionSample {
    fn from(classification: Classification) -> Self {
        Self {
            label: classification.label,
            confidence: classification.confidence,
        }
    }
}

/// What [`PredictionStabilizer::observe`] did with a sample.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleVerdict {
    /// The label entered the window.
    Accepted(Gesture),
    /// Confidence was below the threshold.
    BelowThreshold,
    /// The label is not a playable gesture.
    Unrecognized,
    /// Confidence was NaN or negative.
    Malformed,
}

impl SampleVerdict {
    /// Returns true if the sample entered the window.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Smooths a stream of noisy classifications into one gesture.
pub struct PredictionStabilizer {
    config: StabilizerConfig,
    /// Accepted gestures, oldest at the front.
    window: VecDeque<Gesture>,
    accepted_total: u64,
    rejected_total: u64,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for PredictionStabilizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionStabilizer")
            .field("config", &self.config)
            .field("window", &self.window)
            .field("accepted_total", &self.accepted_total)
            .field("rejected_total", &self.rejected_total)
            .finish_non_exhaustive()
    }
}

impl PredictionStabilizer {
    /// Creates an empty stabilizer.
    ///
    /// The configuration is assumed valid; [`SessionBuilder`] validates it
    /// before constructing a session.
    ///
    /// [`SessionBuilder`]: crate::SessionBuilder
    #[must_use]
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            window: VecDeque::with_capacity(config.window_capacity),
            accepted_total: 0,
            rejected_total: 0,
            violation_observer: None,
        }
    }

    /// Routes malformed-sample reports to `observer` instead of the tracing fallback.
    #[must_use]
    pub fn with_violation_observer(mut self, observer: Option<Arc<dyn ViolationObserver>>) -> Self {
        self.violation_observer = observer;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Feeds one sample.
    ///
    /// Confidences above 1.0 are clamped (and reported); NaN or negative
    /// confidences are rejected (and reported).
    pub fn observe(&mut self, sample: PredictionSample) -> SampleVerdict {
        let verdict = self.judge(&sample);
        match verdict {
            SampleVerdict::Accepted(gesture) => {
                if self.window.len() >= self.config.window_capacity {
                    self.window.pop_front();
                }
                self.window.push_back(gesture);
                self.accepted_total += 1;
                trace!(
                    %gesture,
                    confidence = sample.confidence,
                    window = self.window.len(),
                    "sample accepted"
                );
            },
            _ => {
                self.rejected_total += 1;
                trace!(label = %sample.label, confidence = sample.confidence, ?verdict, "sample ignored");
            },
        }
        crate::debug_check_invariants!(self, "after observe");
        verdict
    }

    fn judge(&self, sample: &PredictionSample) -> SampleVerdict {
        let mut confidence = sample.confidence;
        if confidence.is_nan() || confidence < 0.0 {
            report_violation_to!(
                &self.violation_observer,
                ViolationSeverity::Warning,
                ViolationKind::Stabilizer,
                "classifier produced invalid confidence {} for label {:?}",
                confidence,
                sample.label
            );
            return SampleVerdict::Malformed;
        }
        if confidence > 1.0 {
            report_violation_to!(
                &self.violation_observer,
                ViolationSeverity::Warning,
                ViolationKind::Stabilizer,
                "classifier confidence {} above 1.0 clamped for label {:?}",
                confidence,
                sample.label
            );
            confidence = 1.0;
        }
        if confidence < self.config.confidence_threshold {
            return SampleVerdict::BelowThreshold;
        }
        match Gesture::from_label(&sample.label) {
            Gesture::Unknown => SampleVerdict::Unrecognized,
            gesture => SampleVerdict::Accepted(gesture),
        }
    }

    /// The stabilized gesture, or `None` while there is too little evidence.
    ///
    /// A gesture seen at least twice that alone holds the highest count in the
    /// window wins. Anything else (all distinct, or a 2-2 split) falls back to
    /// the most recently accepted gesture.
    #[must_use]
    pub fn current_stable(&self) -> Option<Gesture> {
        if self.window.len() < self.config.min_samples {
            return None;
        }

        let mut counts = [0usize; 3];
        for gesture in &self.window {
            if let Some(slot) = Self::slot(*gesture) {
                counts[slot] += 1;
            }
        }
        let max = counts.iter().copied().max().unwrap_or(0);
        let mut leaders = Gesture::PLAYABLE
            .iter()
            .zip(counts)
            .filter(|(_, count)| *count == max);

        match (leaders.next(), leaders.next()) {
            (Some((leader, _)), None) if max >= 2 => Some(*leader),
            _ => self.window.back().copied(),
        }
    }

    const fn slot(gesture: Gesture) -> Option<usize> {
        match gesture {
            Gesture::Rock => Some(0),
            Gesture::Paper => Some(1),
            Gesture::Scissors => Some(2),
            Gesture::Unknown => None,
        }
    }

    /// Forgets every accepted sample. Called at the start of each capture window.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Number of labels currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns true if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Samples accepted since construction (not cleared by `reset`).
    #[must_use]
    pub fn accepted_total(&self) -> u64 {
        self.accepted_total
    }

    /// Samples ignored since construction (not cleared by `reset`).
    #[must_use]
    pub fn rejected_total(&self) -> u64 {
        self.rejected_total
    }
}

impl InvariantChecker for PredictionStabilizer {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.window.len() > self.config.window_capacity {
            return Err(
                InvariantViolation::new("PredictionStabilizer", "window exceeds capacity")
                    .with_details(format!(
                        "len={}, capacity={}",
                        self.window.len(),
                        self.config.window_capacity
                    )),
            );
        }
        if self.window.contains(&Gesture::Unknown) {
            return Err(InvariantViolation::new(
                "PredictionStabilizer",
                "window holds an unplayable gesture",
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

    fn stabilizer() -> PredictionStabilizer {
        PredictionStabilizer::new(StabilizerConfig::default())
    }

    fn feed(stabilizer: &mut PredictionStabilizer, samples: &[(&str, f32)]) {
        for (label, confidence) in samples {
            stabilizer.observe(PredictionSample::new(*label, *confidence));
        }
    }

    #[test]
    fn majority_scenario() {
        let mut s = stabilizer();
        feed(&mut s, &[("Rock", 0.9), ("Rock", 0.8), ("Paper", 0.6)]);
        assert_eq!(s.current_stable(), Some(Gesture::Rock));
    }

    #[test]
    fn fewer_than_three_is_absent() {
        let mut s = stabilizer();
        assert_eq!(s.current_stable(), None);
        feed(&mut s, &[("Scissors", 0.99), ("Scissors", 0.99)]);
        assert_eq!(s.current_stable(), None);
    }

    #[test]
    fn all_distinct_goes_to_most_recent() {
        let mut s = stabilizer();
        feed(&mut s, &[("Rock", 0.9), ("Paper", 0.9), ("Scissors", 0.9)]);
        assert_eq!(s.current_stable(), Some(Gesture::Scissors));
    }

    #[test]
    fn split_without_majority_goes_to_most_recent() {
        let mut s = stabilizer();
        feed(
            &mut s,
            &[("Rock", 0.9), ("Paper", 0.9), ("Rock", 0.9), ("Paper", 0.9)],
        );
        assert_eq!(s.current_stable(), Some(Gesture::Paper));

        // R P R P S: no label holds the maximum alone, so the newest wins
        feed(&mut s, &[("Scissors", 0.9)]);
        assert_eq!(s.current_stable(), Some(Gesture::Scissors));

        // P R P S R after eviction: still split, Rock is newest
        feed(&mut s, &[("Rock", 0.9)]);
        assert_eq!(s.current_stable(), Some(Gesture::Rock));
    }

    #[test]
    fn low_confidence_is_ignored() {
        let mut s = stabilizer();
        feed(
            &mut s,
            &[("Rock", 0.9), ("Paper", 0.49), ("Rock", 0.7), ("Paper", 0.1)],
        );
        assert_eq!(s.len(), 2);
        assert_eq!(s.current_stable(), None);
        assert_eq!(s.rejected_total(), 2);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut s = stabilizer();
        assert!(s.observe(PredictionSample::new("Rock", 0.5)).is_accepted());
    }

    #[test]
    fn window_evicts_oldest() {
        let mut s = stabilizer();
        feed(
            &mut s,
            &[
                ("Paper", 0.9),
                ("Paper", 0.9),
                ("Paper", 0.9),
                ("Rock", 0.9),
                ("Rock", 0.9),
            ],
        );
        assert_eq!(s.current_stable(), Some(Gesture::Paper));

        // Two more Rocks push out two Papers: window is P R R R R
        feed(&mut s, &[("Rock", 0.9), ("Rock", 0.9)]);
        assert_eq!(s.len(), 5);
        assert_eq!(s.current_stable(), Some(Gesture::Rock));
    }

    #[test]
    fn sustained_gesture_takes_over() {
        let mut s = stabilizer();
        feed(&mut s, &[("Rock", 0.9); 5]);
        for _ in 0..3 {
            s.observe(PredictionSample::new("Scissors", 0.9));
        }
        assert_eq!(s.current_stable(), Some(Gesture::Scissors));
    }

    #[test]
    fn unknown_labels_are_not_evidence() {
        let mut s = stabilizer();
        let verdict = s.observe(PredictionSample::new("background", 0.99));
        assert_eq!(verdict, SampleVerdict::Unrecognized);
        assert!(s.is_empty());
    }

    #[test]
    fn reset_clears_window_but_not_totals() {
        let mut s = stabilizer();
        feed(&mut s, &[("Rock", 0.9), ("Rock", 0.9), ("Rock", 0.9)]);
        s.reset();
        assert!(s.is_empty());
        assert_eq!(s.current_stable(), None);
        assert_eq!(s.accepted_total(), 3);
    }

    #[test]
    fn nan_confidence_is_reported_and_rejected() {
        let observer = Arc::new(CollectingObserver::new());
        let mut s = stabilizer().with_violation_observer(Some(observer.clone()));

        let verdict = s.observe(PredictionSample::new("Rock", f32::NAN));

        assert_eq!(verdict, SampleVerdict::Malformed);
        assert!(s.is_empty());
        crate::assert_violation!(observer, ViolationKind::Stabilizer);
    }

    #[test]
    fn overconfident_sample_is_clamped_and_accepted() {
        let observer = Arc::new(CollectingObserver::new());
        let mut s = stabilizer().with_violation_observer(Some(observer.clone()));

        let verdict = s.observe(PredictionSample::new("Paper", 1.7));

        assert_eq!(verdict, SampleVerdict::Accepted(Gesture::Paper));
        assert_eq!(observer.len(), 1);
    }

    #[test]
    fn strict_config_needs_four_samples() {
        let mut s = PredictionStabilizer::new(StabilizerConfig::strict());
        feed(&mut s, &[("Rock", 0.9), ("Rock", 0.9), ("Rock", 0.9)]);
        assert_eq!(s.current_stable(), None);
        feed(&mut s, &[("Rock", 0.7)]);
        assert_eq!(s.current_stable(), None, "0.7 is below the strict threshold");
        feed(&mut s, &[("Rock", 0.8)]);
        assert_eq!(s.current_stable(), Some(Gesture::Rock));
    }

    #[test]
    fn classification_converts_to_sample() {
        let sample: PredictionSample = Classification::new("Scissors", 0.6).into();
        assert_eq!(sample, PredictionSample::new("Scissors", 0.6));
    }

    #[test]
    fn invariants_hold_after_many_samples() {
        let mut s = stabilizer();
        for i in 0..50 {
            let label = ["Rock", "Paper", "Scissors", "???"][i % 4];
            s.observe(PredictionSample::new(label, 0.9));
            assert!(s.check_invariants().is_ok());
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod property_tests {
    use super::*;
    use crate::test_config::case_count;
    use proptest::prelude::*;

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

        /// Fewer than three accepted samples never yield a gesture.
        #[test]
        fn prop_insufficient_evidence(gestures in prop::collection::vec(playable(), 0..3)) {
            let mut s = PredictionStabilizer::new(StabilizerConfig::default());
            for g in &gestures {
                s.observe(PredictionSample::new(g.as_str(), 0.9));
            }
            prop_assert_eq!(s.current_stable(), None);
        }

        /// A gesture with the unique highest count (at least two) in the last
        /// five wins; otherwise the newest gesture does.
        #[test]
        fn prop_unique_leader_wins(gestures in prop::collection::vec(playable(), 3..20)) {
            let mut s = PredictionStabilizer::new(StabilizerConfig::default());
            for g in &gestures {
                s.observe(PredictionSample::new(g.as_str(), 0.9));
            }
            let tail = &gestures[gestures.len().saturating_sub(5)..];
            let count = |g: Gesture| tail.iter().filter(|x| **x == g).count();
            let max = Gesture::PLAYABLE.iter().map(|g| count(*g)).max().unwrap_or(0);
            let leaders: Vec<Gesture> =
                Gesture::PLAYABLE.iter().copied().filter(|g| count(*g) == max).collect();

            if max >= 2 && leaders.len() == 1 {
                prop_assert_eq!(s.current_stable(), Some(leaders[0]));
            } else {
                prop_assert_eq!(s.current_stable(), tail.last().copied());
            }
        }

        /// The window never grows past its capacity, whatever arrives.
        #[test]
        fn prop_window_bounded(
            samples in prop::collection::vec(("[a-zA-Z]{0,9}", -1.0f32..2.0), 0..64)
        ) {
            let mut s = PredictionStabilizer::new(StabilizerConfig::default());
            for (label, confidence) in samples {
                s.observe(PredictionSample::new(label, confidence));
                prop_assert!(s.len() <= 5);
            }
        }
    }
}
