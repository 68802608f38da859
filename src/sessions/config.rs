//! Configuration types for game sessions.
//!
//! | Config Type | Purpose | Key Presets |
//! |-------------|---------|-------------|
//! | `TimingConfig` | Countdown and animation cadences | `standard()`, `quick()`, `relaxed()` |
//! | `StabilizerConfig` | Smoothing of classifier output | `standard()`, `strict()`, `responsive()` |
//! | `MatchConfig` | When a match is decided | `best_of_three()`, `best_of(n)`, `single_round()` |
//!
//! # Example
//!
//! ```
//! use rps_referee::{MatchConfig, SessionBuilder, StabilizerConfig, TimingConfig};
//!
//! let builder = SessionBuilder::new()
//!     .with_timing_config(TimingConfig::quick())
//!     .with_stabilizer_config(StabilizerConfig::strict())
//!     .with_match_config(MatchConfig::best_of(5));
//! ```

use web_time::Duration;

use crate::{InvalidRequestKind, RpsResult};

/// Cadences of the periodic activities that run while a round counts down.
///
/// # Forward Compatibility
///
/// New fields may be added. Construct custom values with
/// `..TimingConfig::default()`.
///
/// # Example
///
/// ```
/// use rps_referee::TimingConfig;
/// use web_time::Duration;
///
/// // A slower animation for small screens
/// let config = TimingConfig {
///     cpu_animation_interval: Duration::from_millis(500),
///     ..TimingConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[must_use = "TimingConfig has no effect unless passed to SessionBuilder::with_timing_config()"]
pub struct TimingConfig {
    /// Number of countdown steps before "Go". The countdown shows
    /// `countdown_ticks, ..., 1, Go` and the round locks on "Go".
    ///
    /// Default: 3
    pub countdown_ticks: u8,

    /// Time between countdown steps.
    ///
    /// Default: 1s
    pub countdown_interval: Duration,

    /// Time between CPU animation frames.
    ///
    /// Default: 300ms
    pub cpu_animation_interval: Duration,

    /// Time between border colour changes during the countdown.
    ///
    /// Default: 800ms
    pub border_pulse_interval: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            countdown_interval: Duration::from_secs(1),
            cpu_animation_interval: Duration::from_millis(300),
            border_pulse_interval: Duration::from_millis(800),
        }
    }
}

impl TimingConfig {
    /// Creates a new `TimingConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default cadence: 3, 2, 1, Go at one step per second.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Twice as fast as the default. Handy for demos and automated play.
    pub fn quick() -> Self {
        Self {
            countdown_ticks: 3,
            countdown_interval: Duration::from_millis(500),
            cpu_animation_interval: Duration::from_millis(150),
            border_pulse_interval: Duration::from_millis(400),
        }
    }

    /// A longer countdown for players who need time to get their hand in frame.
    pub fn relaxed() -> Self {
        Self {
            countdown_ticks: 5,
            countdown_interval: Duration::from_secs(1),
            cpu_animation_interval: Duration::from_millis(300),
            border_pulse_interval: Duration::from_millis(800),
        }
    }

    /// Total time from start to lock.
    #[must_use]
    pub fn capture_window(&self) -> Duration {
        self.countdown_interval * u32::from(self.countdown_ticks)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `RpsError::InvalidRequest` if a value is out of range.
    pub fn validate(&self) -> RpsResult<()> {
        if !(1..=10).contains(&self.countdown_ticks) {
            return Err(InvalidRequestKind::ConfigValueOutOfRange {
                field: "countdown_ticks",
                min: 1,
                max: 10,
                actual: u64::from(self.countdown_ticks),
            }
            .into());
        }
        check_duration("countdown_interval", self.countdown_interval, 100, 10_000)?;
        check_duration("cpu_animation_interval", self.cpu_animation_interval, 16, 5_000)?;
        check_duration("border_pulse_interval", self.border_pulse_interval, 16, 5_000)?;
        Ok(())
    }
}

fn check_duration(field: &'static str, value: Duration, min_ms: u64, max_ms: u64) -> RpsResult<()> {
    if value < Duration::from_millis(min_ms) || value > Duration::from_millis(max_ms) {
        return Err(InvalidRequestKind::DurationConfigOutOfRange {
            field,
            min_ms,
            max_ms,
            actual_ms: value.as_millis() as u64,
        }
        .into());
    }
    Ok(())
}

/// Controls how per-frame classifications are smoothed into one gesture.
///
/// # Example
///
/// ```
/// use rps_referee::StabilizerConfig;
///
/// let config = StabilizerConfig {
///     confidence_threshold: 0.7,
///     ..StabilizerConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[must_use = "StabilizerConfig has no effect unless passed to SessionBuilder::with_stabilizer_config()"]
pub struct StabilizerConfig {
    /// Samples below this confidence are ignored. A sample exactly at the
    /// threshold is accepted.
    ///
    /// Default: 0.5
    pub confidence_threshold: f32,

    /// How many accepted labels are remembered. Oldest are evicted first.
    ///
    /// Default: 5
    pub window_capacity: usize,

    /// Accepted labels required before any gesture is reported.
    ///
    /// Default: 3
    pub min_samples: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            window_capacity: 5,
            min_samples: 3,
        }
    }
}

impl StabilizerConfig {
    /// Creates a new `StabilizerConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default smoothing: threshold 0.5, window of 5, at least 3 samples.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Demands more confident and more numerous samples. For noisy lighting.
    pub fn strict() -> Self {
        Self {
            confidence_threshold: 0.75,
            window_capacity: 7,
            min_samples: 4,
        }
    }

    /// Reacts to a changed gesture sooner, at the cost of more flicker.
    pub fn responsive() -> Self {
        Self {
            confidence_threshold: 0.5,
            window_capacity: 3,
            min_samples: 2,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `RpsError::InvalidRequest` if a value is out of range or
    /// `min_samples` exceeds `window_capacity`.
    pub fn validate(&self) -> RpsResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(InvalidRequestKind::ThresholdOutOfRange {
                field: "confidence_threshold",
                min: 0.0,
                max: 1.0,
                actual: self.confidence_threshold,
            }
            .into());
        }
        if !(1..=64).contains(&self.window_capacity) {
            return Err(InvalidRequestKind::ConfigValueOutOfRange {
                field: "window_capacity",
                min: 1,
                max: 64,
                actual: self.window_capacity as u64,
            }
            .into());
        }
        if self.min_samples == 0 {
            return Err(InvalidRequestKind::ConfigValueOutOfRange {
                field: "min_samples",
                min: 1,
                max: self.window_capacity as u64,
                actual: 0,
            }
            .into());
        }
        if self.min_samples > self.window_capacity {
            return Err(InvalidRequestKind::ConfigConflict {
                field: "min_samples",
                constraint: "must not exceed window_capacity",
            }
            .into());
        }
        Ok(())
    }
}

/// Decides when a match is over.
///
/// # Example
///
/// ```
/// use rps_referee::MatchConfig;
///
/// assert_eq!(MatchConfig::default().win_threshold, 2);
/// assert_eq!(MatchConfig::best_of(5).win_threshold, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[must_use = "MatchConfig has no effect unless passed to SessionBuilder::with_match_config()"]
pub struct MatchConfig {
    /// Wins needed to take the match.
    ///
    /// Default: 2 (best of three)
    pub win_threshold: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { win_threshold: 2 }
    }
}

impl MatchConfig {
    /// Creates a new `MatchConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// First to two wins.
    pub fn best_of_three() -> Self {
        Self::default()
    }

    /// First to a majority of `rounds` decisive rounds.
    ///
    /// `best_of(3)` needs 2 wins, `best_of(5)` needs 3. Even counts round up
    /// (`best_of(4)` needs 3).
    pub fn best_of(rounds: u32) -> Self {
        Self {
            win_threshold: rounds / 2 + 1,
        }
    }

    /// A single decisive round ends the match.
    pub fn single_round() -> Self {
        Self { win_threshold: 1 }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `RpsError::InvalidRequest` if `win_threshold` is outside `1..=50`.
    pub fn validate(&self) -> RpsResult<()> {
        if !(1..=50).contains(&self.win_threshold) {
            return Err(InvalidRequestKind::ConfigValueOutOfRange {
                field: "win_threshold",
                min: 1,
                max: 50,
                actual: u64::from(self.win_threshold),
            }
            .into());
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
    use crate::RpsError;

    fn rejected_field(result: RpsResult<()>) -> &'static str {
        match result {
            Err(RpsError::InvalidRequest {
                kind:
                    InvalidRequestKind::ConfigValueOutOfRange { field, .. }
                    | InvalidRequestKind::DurationConfigOutOfRange { field, .. }
                    | InvalidRequestKind::ThresholdOutOfRange { field, .. }
                    | InvalidRequestKind::ConfigConflict { field, .. },
            }) => field,
            other => panic!("expected a config rejection, got {other:?}"),
        }
    }

    // ========================================================================
    // TimingConfig
    // ========================================================================

    #[test]
    fn timing_defaults() {
        let config = TimingConfig::default();
        assert_eq!(config.countdown_ticks, 3);
        assert_eq!(config.countdown_interval, Duration::from_secs(1));
        assert_eq!(config.cpu_animation_interval, Duration::from_millis(300));
        assert_eq!(config.border_pulse_interval, Duration::from_millis(800));
        assert_eq!(config.capture_window(), Duration::from_secs(3));
    }

    #[test]
    fn timing_presets_validate() {
        for config in [
            TimingConfig::new(),
            TimingConfig::standard(),
            TimingConfig::quick(),
            TimingConfig::relaxed(),
        ] {
            assert!(config.validate().is_ok(), "{config:?}");
        }
    }

    #[test]
    fn quick_preset_halves_the_window() {
        assert_eq!(
            TimingConfig::quick().capture_window(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn timing_rejects_zero_ticks() {
        let config = TimingConfig {
            countdown_ticks: 0,
            ..TimingConfig::default()
        };
        assert_eq!(rejected_field(config.validate()), "countdown_ticks");
    }

    #[test]
    fn timing_rejects_tiny_animation_interval() {
        let config = TimingConfig {
            cpu_animation_interval: Duration::from_millis(1),
            ..TimingConfig::default()
        };
        assert_eq!(rejected_field(config.validate()), "cpu_animation_interval");
    }

    #[test]
    fn timing_rejects_huge_countdown_interval() {
        let config = TimingConfig {
            countdown_interval: Duration::from_secs(60),
            ..TimingConfig::default()
        };
        assert_eq!(rejected_field(config.validate()), "countdown_interval");
    }

    // ========================================================================
    // StabilizerConfig
    // ========================================================================

    #[test]
    fn stabilizer_defaults() {
        let config = StabilizerConfig::default();
        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.window_capacity, 5);
        assert_eq!(config.min_samples, 3);
    }

    #[test]
    fn stabilizer_presets_validate() {
        for config in [
            StabilizerConfig::new(),
            StabilizerConfig::standard(),
            StabilizerConfig::strict(),
            StabilizerConfig::responsive(),
        ] {
            assert!(config.validate().is_ok(), "{config:?}");
        }
    }

    #[test]
    fn stabilizer_rejects_nan_threshold() {
        let config = StabilizerConfig {
            confidence_threshold: f32::NAN,
            ..StabilizerConfig::default()
        };
        assert_eq!(rejected_field(config.validate()), "confidence_threshold");
    }

    #[test]
    fn stabilizer_rejects_min_samples_above_capacity() {
        let config = StabilizerConfig {
            window_capacity: 3,
            min_samples: 4,
            ..StabilizerConfig::default()
        };
        assert_eq!(rejected_field(config.validate()), "min_samples");
    }

    #[test]
    fn stabilizer_rejects_empty_window() {
        let config = StabilizerConfig {
            window_capacity: 0,
            min_samples: 0,
            ..StabilizerConfig::default()
        };
        assert_eq!(rejected_field(config.validate()), "window_capacity");
    }

    // ========================================================================
    // MatchConfig
    // ========================================================================

    #[test]
    fn best_of_rounds_to_majority() {
        assert_eq!(MatchConfig::best_of(1).win_threshold, 1);
        assert_eq!(MatchConfig::best_of(3).win_threshold, 2);
        assert_eq!(MatchConfig::best_of(4).win_threshold, 3);
        assert_eq!(MatchConfig::best_of(7).win_threshold, 4);
        assert_eq!(MatchConfig::best_of_three(), MatchConfig::default());
        assert_eq!(MatchConfig::single_round().win_threshold, 1);
    }

    #[test]
    fn match_rejects_zero_threshold() {
        let config = MatchConfig { win_threshold: 0 };
        assert_eq!(rejected_field(config.validate()), "win_threshold");
    }

    #[test]
    fn configs_round_trip_through_json() {
        let timing = TimingConfig::relaxed();
        let json = serde_json::to_string(&timing).unwrap();
        let back: TimingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, timing);
    }
}
