use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::collaborators::CameraError;
use crate::round::RoundTransitionError;

/// Structured reasons for rejecting an API call or a configuration.
///
/// Carried by [`RpsError::InvalidRequest`]. Converting a kind into an
/// [`RpsError`] is done with `.into()`.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum InvalidRequestKind {
    /// A round is already counting down; stop it or wait for it to resolve.
    RoundInProgress,
    /// The match has a winner. Call [`GameSession::new_game`] before starting another round.
    ///
    /// [`GameSession::new_game`]: crate::GameSession::new_game
    MatchOver,
    /// An integer configuration value is outside its accepted range.
    ConfigValueOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Smallest accepted value.
        min: u64,
        /// Largest accepted value.
        max: u64,
        /// The value that was supplied.
        actual: u64,
    },
    /// A duration configuration value is outside its accepted range.
    DurationConfigOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Shortest accepted duration in milliseconds.
        min_ms: u64,
        /// Longest accepted duration in milliseconds.
        max_ms: u64,
        /// The duration that was supplied, in milliseconds.
        actual_ms: u64,
    },
    /// A floating point threshold is outside `[min, max]` or not a number.
    ThresholdOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Smallest accepted value.
        min: f32,
        /// Largest accepted value.
        max: f32,
        /// The value that was supplied.
        actual: f32,
    },
    /// Two configuration values contradict each other.
    ConfigConflict {
        /// Name of the field that was rejected.
        field: &'static str,
        /// Human readable description of the violated constraint.
        constraint: &'static str,
    },
}

impl Display for InvalidRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundInProgress => write!(f, "a round is already in progress"),
            Self::MatchOver => write!(
                f,
                "the match is over; start a new game before playing another round"
            ),
            Self::ConfigValueOutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(
                f,
                "{} must be between {} and {}, got {}",
                field, min, max, actual
            ),
            Self::DurationConfigOutOfRange {
                field,
                min_ms,
                max_ms,
                actual_ms,
            } => write!(
                f,
                "{} must be between {}ms and {}ms, got {}ms",
                field, min_ms, max_ms, actual_ms
            ),
            Self::ThresholdOutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(
                f,
                "{} must be between {} and {}, got {}",
                field, min, max, actual
            ),
            Self::ConfigConflict { field, constraint } => {
                write!(f, "invalid {}: {}", field, constraint)
            },
        }
    }
}

/// This enum contains all errors this library can return. Most API functions return a [`RpsResult`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RpsError {
    /// The request was rejected, see [`InvalidRequestKind`] for the reason.
    InvalidRequest {
        /// Why the request was rejected.
        kind: InvalidRequestKind,
    },
    /// The camera collaborator could not be started. The round that needed it was abandoned.
    Camera(CameraError),
    /// An internal error occurred that should not happen under normal operation.
    /// If you encounter this error, please report it as a bug.
    InternalError {
        /// A description of the internal error.
        context: String,
    },
}

impl Display for RpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest { kind } => write!(f, "Invalid request: {}", kind),
            Self::Camera(err) => write!(f, "Camera unavailable: {}", err),
            Self::InternalError { context } => {
                write!(f, "Internal error (please report as bug): {}", context)
            },
        }
    }
}

impl Error for RpsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Camera(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvalidRequestKind> for RpsError {
    fn from(kind: InvalidRequestKind) -> Self {
        Self::InvalidRequest { kind }
    }
}

impl From<CameraError> for RpsError {
    fn from(err: CameraError) -> Self {
        Self::Camera(err)
    }
}

impl From<RoundTransitionError> for RpsError {
    fn from(err: RoundTransitionError) -> Self {
        Self::InternalError {
            context: err.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type RpsResult<T> = Result<T, RpsError>;

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_converts_from_kind() {
        let err: RpsError = InvalidRequestKind::MatchOver.into();
        assert_eq!(
            err,
            RpsError::InvalidRequest {
                kind: InvalidRequestKind::MatchOver
            }
        );
    }

    #[test]
    fn config_range_display_names_field() {
        let err: RpsError = InvalidRequestKind::ConfigValueOutOfRange {
            field: "window_capacity",
            min: 1,
            max: 64,
            actual: 0,
        }
        .into();
        let text = err.to_string();
        assert!(text.contains("window_capacity"));
        assert!(text.contains("between 1 and 64"));
    }

    #[test]
    fn camera_error_is_error_source() {
        let err = RpsError::from(CameraError::new("permission denied"));
        let source = err.source().expect("camera errors expose a source");
        assert_eq!(source.to_string(), "permission denied");
    }

    #[test]
    fn transition_errors_become_internal() {
        let err = RpsError::from(RoundTransitionError {
            transition: "lock",
            from: crate::round::RoundPhase::Idle,
        });
        assert!(matches!(err, RpsError::InternalError { .. }));
        assert!(err.to_string().contains("cannot lock a round in phase Idle"));
    }

    #[test]
    fn internal_error_asks_for_report() {
        let err = RpsError::InternalError {
            context: "timer table corrupted".to_owned(),
        };
        assert!(err.to_string().contains("please report as bug"));
    }
}
