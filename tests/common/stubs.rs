//! Scripted collaborators for driving sessions deterministically.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::collections::VecDeque;

use rps_referee::rng::Rng;
use rps_referee::{
    CameraError, CaptureDevice, Classification, ClassifierError, Gesture, GestureClassifier,
};

/// Camera that counts calls and can be told to refuse the next start.
#[derive(Debug, Default)]
pub struct ScriptedCamera {
    pub starts: usize,
    pub stops: usize,
    pub running: bool,
    pub refuse_next: Option<String>,
}

impl ScriptedCamera {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera whose first `start` fails with `message`.
    #[must_use]
    pub fn refusing(message: &str) -> Self {
        Self {
            refuse_next: Some(message.to_owned()),
            ..Self::default()
        }
    }
}

impl CaptureDevice for ScriptedCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        if let Some(message) = self.refuse_next.take() {
            return Err(CameraError::new(message));
        }
        self.starts += 1;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.running = false;
    }
}

/// Classifier that replays a script, one entry per frame, then sees nothing.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    script: VecDeque<Result<Option<Classification>, ClassifierError>>,
    pub frames_seen: Vec<u32>,
}

impl ScriptedClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then_sees(mut self, label: &str, confidence: f32) -> Self {
        self.script
            .push_back(Ok(Some(Classification::new(label, confidence))));
        self
    }

    #[must_use]
    pub fn then_sees_nothing(mut self) -> Self {
        self.script.push_back(Ok(None));
        self
    }

    #[must_use]
    pub fn then_fails(mut self, context: &str) -> Self {
        self.script.push_back(Err(ClassifierError::new(context)));
        self
    }
}

impl GestureClassifier for ScriptedClassifier {
    /// Frame number.
    type Frame = u32;

    fn classify(&mut self, frame: &u32) -> Result<Option<Classification>, ClassifierError> {
        self.frames_seen.push(*frame);
        self.script.pop_front().unwrap_or(Ok(None))
    }
}

/// Random source that makes the CPU throw the same gesture every time.
#[derive(Debug, Clone)]
pub struct RiggedCpu {
    raw: u32,
}

impl RiggedCpu {
    /// Raw values are reduced modulo 3 into `[Rock, Paper, Scissors]`; values
    /// below 3 could be rejected by the sampler, so start from 3.
    #[must_use]
    pub fn always(gesture: Gesture) -> Self {
        let index = Gesture::PLAYABLE
            .iter()
            .position(|g| *g == gesture)
            .expect("CPU can only throw playable gestures") as u32;
        Self { raw: 3 + index }
    }
}

impl Rng for RiggedCpu {
    fn next_u32(&mut self) -> u32 {
        self.raw
    }
}
