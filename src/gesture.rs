//! Gestures, the beats relation and round outcomes.

use std::fmt;

/// A hand gesture.
///
/// [`Gesture::Unknown`] is the sentinel for "no usable hand detected"; it never
/// takes part in a resolution.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Gesture {
    /// Closed fist.
    Rock,
    /// Flat hand.
    Paper,
    /// Two extended fingers.
    Scissors,
    /// No detection or an unrecognised label.
    #[default]
    Unknown,
}

impl Gesture {
    /// The three gestures a player or the CPU can actually throw.
    pub const PLAYABLE: [Self; 3] = [Self::Rock, Self::Paper, Self::Scissors];

    /// Parses a classifier label.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace. Both the
    /// English names and the hand glyphs are recognised; anything else maps to
    /// [`Gesture::Unknown`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("rock") || label == "✊" {
            Self::Rock
        } else if label.eq_ignore_ascii_case("paper") || label == "✋" {
            Self::Paper
        } else if label.eq_ignore_ascii_case("scissors") || label == "✌️" || label == "✌" {
            Self::Scissors
        } else {
            Self::Unknown
        }
    }

    /// Returns true for Rock, Paper and Scissors.
    #[must_use]
    pub const fn is_playable(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns true if `self` beats `other`.
    ///
    /// Rock beats Scissors, Scissors beats Paper, Paper beats Rock.
    /// [`Gesture::Unknown`] neither beats nor is beaten.
    #[must_use]
    pub const fn beats(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Rock, Self::Scissors) | (Self::Scissors, Self::Paper) | (Self::Paper, Self::Rock)
        )
    }

    /// Display glyph used by presentation layers.
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Rock => "✊",
            Self::Paper => "✋",
            Self::Scissors => "✌️",
            Self::Unknown => "❓",
        }
    }

    /// Canonical label, matching what [`Gesture::from_label`] accepts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rock => "Rock",
            Self::Paper => "Paper",
            Self::Scissors => "Scissors",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a single round.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RoundOutcome {
    /// The player's gesture beats the CPU's.
    PlayerWin,
    /// The CPU's gesture beats the player's.
    CpuWin,
    /// Both threw the same gesture.
    Tie,
    /// No stable gesture was captured. Counted as a round, scores unchanged.
    NoDetection,
}

impl RoundOutcome {
    /// Resolves a round.
    ///
    /// `player` is the locked, stabilized prediction; `None` (or an unplayable
    /// gesture) yields [`RoundOutcome::NoDetection`]. An unplayable `cpu` also
    /// yields `NoDetection`, so nobody scores against [`Gesture::Unknown`].
    #[must_use]
    pub fn resolve(player: Option<Gesture>, cpu: Gesture) -> Self {
        match player {
            Some(p) if p.is_playable() && cpu.is_playable() => {
                if p == cpu {
                    Self::Tie
                } else if p.beats(cpu) {
                    Self::PlayerWin
                } else {
                    Self::CpuWin
                }
            },
            _ => Self::NoDetection,
        }
    }

    /// Short message shown to the player.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::PlayerWin => "You win!",
            Self::CpuWin => "You lose!",
            Self::Tie => "It's a tie!",
            Self::NoDetection => "No hand detected",
        }
    }

    /// Border tint that signals this outcome.
    #[must_use]
    pub const fn tint(self) -> BorderColor {
        match self {
            Self::PlayerWin => BorderColor::Green,
            Self::CpuWin => BorderColor::Red,
            Self::Tie | Self::NoDetection => BorderColor::Gray,
        }
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Colour of the camera preview border.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BorderColor {
    /// Resting colour.
    #[default]
    White,
    #[allow(missing_docs)]
    Red,
    #[allow(missing_docs)]
    Yellow,
    #[allow(missing_docs)]
    Green,
    #[allow(missing_docs)]
    Blue,
    #[allow(missing_docs)]
    Purple,
    /// Tie or no detection.
    Gray,
}

impl BorderColor {
    /// Colours cycled while the countdown runs.
    pub const PULSE_CYCLE: [Self; 5] = [Self::Red, Self::Yellow, Self::Green, Self::Blue, Self::Purple];
}
