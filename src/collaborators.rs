//! Interfaces to the collaborators that live outside this crate.
//!
//! The camera and the hand-pose classifier are platform services. The core
//! only needs to switch the camera on and off around the capture window and
//! to receive one optional [`Classification`] per processed frame.
//!
//! # Example
//!
//! ```
//! use rps_referee::{Classification, ClassifierError, GestureClassifier};
//!
//! /// Pretends every frame shows a closed fist.
//! struct AlwaysRock;
//!
//! impl GestureClassifier for AlwaysRock {
//!     type Frame = ();
//!
//!     fn classify(&mut self, _frame: &()) -> Result<Option<Classification>, ClassifierError> {
//!         Ok(Some(Classification::new("Rock", 0.93)))
//!     }
//! }
//! ```

use std::error::Error;
use std::fmt;

/// One classifier result: a free-form label and a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    /// The label produced by the model, e.g. `"Rock"`.
    pub label: String,
    /// Model confidence for `label`.
    pub confidence: f32,
}

impl Classification {
    /// Creates a classification result.
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Failure reported by a classifier for a single frame.
///
/// These never abort a round: the session treats them exactly like a frame
/// without a hand in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierError {
    context: String,
}

impl ClassifierError {
    /// Creates a classifier error with a description of what failed.
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    /// Description of the failure.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.context)
    }
}

impl Error for ClassifierError {}

/// Failure to start the camera (missing permission, device busy, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraError {
    context: String,
}

impl CameraError {
    /// Creates a camera error with a user-presentable description.
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    /// Description of the failure.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.context)
    }
}

impl Error for CameraError {}

/// Turns a camera frame into an optional gesture classification.
///
/// `Ok(None)` means no hand was found in the frame. Implementations may be
/// slow; callers that run them off the session's thread deliver the result
/// later through [`GameSession::submit_classification`].
///
/// [`GameSession::submit_classification`]: crate::GameSession::submit_classification
pub trait GestureClassifier {
    /// The frame type produced by the camera pipeline.
    type Frame;

    /// Classifies a single frame.
    fn classify(&mut self, frame: &Self::Frame) -> Result<Option<Classification>, ClassifierError>;
}

/// The camera session, switched on for the capture window only.
pub trait CaptureDevice {
    /// Starts delivering frames. Called when a round starts counting down.
    fn start(&mut self) -> Result<(), CameraError>;

    /// Stops delivering frames. Called when a round locks, is stopped or is abandoned.
    fn stop(&mut self);
}

/// A camera that is always available and does nothing.
///
/// Useful for headless simulations where classifications are injected directly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DetachedCamera;

impl CaptureDevice for DetachedCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn stop(&mut self) {}
}

impl<D: CaptureDevice + ?Sized> CaptureDevice for Box<D> {
    fn start(&mut self) -> Result<(), CameraError> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn detached_camera_always_starts() {
        let mut camera = DetachedCamera;
        assert!(camera.start().is_ok());
        camera.stop();
    }

    #[test]
    fn boxed_camera_forwards_calls() {
        struct Failing;
        impl CaptureDevice for Failing {
            fn start(&mut self) -> Result<(), CameraError> {
                Err(CameraError::new("busy"))
            }
            fn stop(&mut self) {}
        }

        let mut camera: Box<dyn CaptureDevice> = Box::new(Failing);
        assert_eq!(camera.start(), Err(CameraError::new("busy")));
    }

    #[test]
    fn errors_display_their_context() {
        assert_eq!(ClassifierError::new("no hand pose").to_string(), "no hand pose");
        assert_eq!(CameraError::new("denied").context(), "denied");
    }
}
