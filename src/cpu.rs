//! The CPU opponent.

use tracing::trace;

use crate::rng::{Pcg32, Rng, SeedableRng};
use crate::Gesture;

/// Picks the CPU's gesture.
///
/// [`tick`](Self::tick) drives the on-screen animation while the countdown
/// runs; [`finalize`](Self::finalize) makes the pick that is actually scored.
/// The two are independent draws: the last animated gesture and the committed
/// one may differ, which the presentation layer shows as a final "reveal".
///
/// ```
/// use rps_referee::CpuChooser;
/// use rps_referee::rng::{Pcg32, SeedableRng};
///
/// let mut cpu = CpuChooser::new(Pcg32::seed_from_u64(7));
/// let shown = cpu.tick();
/// assert_eq!(cpu.displayed(), Some(shown));
/// let committed = cpu.finalize();
/// assert!(committed.is_playable());
/// ```
#[derive(Debug, Clone)]
pub struct CpuChooser<R = Pcg32> {
    rng: R,
    displayed: Option<Gesture>,
}

impl CpuChooser<Pcg32> {
    /// A chooser seeded from entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(Pcg32::from_entropy())
    }

    /// A chooser whose picks are fully determined by `seed`.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(Pcg32::seed_from_u64(seed))
    }
}

impl<R: Rng> CpuChooser<R> {
    /// Creates a chooser drawing from `rng`.
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            displayed: None,
        }
    }

    fn draw(&mut self) -> Gesture {
        self.rng
            .choose(&Gesture::PLAYABLE)
            .copied()
            .unwrap_or(Gesture::Rock)
    }

    /// Draws a new animation frame. No anti-repeat rule: the same gesture may
    /// come up several times in a row.
    pub fn tick(&mut self) -> Gesture {
        let gesture = self.draw();
        self.displayed = Some(gesture);
        trace!(%gesture, "cpu animation frame");
        gesture
    }

    /// Draws the committed gesture for the round. Leaves [`displayed`](Self::displayed) untouched.
    pub fn finalize(&mut self) -> Gesture {
        let gesture = self.draw();
        trace!(%gesture, displayed = ?self.displayed, "cpu gesture committed");
        gesture
    }

    /// The gesture most recently shown by [`tick`](Self::tick), if any this round.
    #[must_use]
    pub fn displayed(&self) -> Option<Gesture> {
        self.displayed
    }

    /// Clears the displayed gesture, ready for a new round.
    pub fn reset(&mut self) {
        self.displayed = None;
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

    /// Replays a fixed list of raw values.
    struct Scripted(Vec<u32>, usize);

    impl Rng for Scripted {
        fn next_u32(&mut self) -> u32 {
            let v = self.0[self.1 % self.0.len()];
            self.1 += 1;
            v
        }
    }

    #[test]
    fn ticks_are_uniform() {
        let mut cpu = CpuChooser::seeded(2024);
        let mut counts = [0u32; 3];
        for _ in 0..3000 {
            match cpu.tick() {
                Gesture::Rock => counts[0] += 1,
                Gesture::Paper => counts[1] += 1,
                Gesture::Scissors => counts[2] += 1,
                Gesture::Unknown => panic!("cpu threw Unknown"),
            }
        }
        for count in counts {
            assert!((850..1150).contains(&count), "skewed: {counts:?}");
        }
    }

    #[test]
    fn repeats_are_allowed() {
        // Raw values 3, 6, 9 all map to index 0
        let mut cpu = CpuChooser::new(Scripted(vec![3, 6, 9], 0));
        assert_eq!(cpu.tick(), Gesture::Rock);
        assert_eq!(cpu.tick(), Gesture::Rock);
        assert_eq!(cpu.tick(), Gesture::Rock);
    }

    #[test]
    fn finalize_is_an_independent_draw() {
        let mut cpu = CpuChooser::new(Scripted(vec![3, 4, 5], 0));
        assert_eq!(cpu.tick(), Gesture::Rock);
        assert_eq!(cpu.finalize(), Gesture::Paper);
        // The animation still shows the last tick
        assert_eq!(cpu.displayed(), Some(Gesture::Rock));
    }

    #[test]
    fn same_seed_same_picks() {
        let mut a = CpuChooser::seeded(11);
        let mut b = CpuChooser::seeded(11);
        for _ in 0..20 {
            assert_eq!(a.tick(), b.tick());
        }
        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn reset_clears_display() {
        let mut cpu = CpuChooser::seeded(3);
        cpu.tick();
        cpu.reset();
        assert_eq!(cpu.displayed(), None);
    }

    #[test]
    fn entropy_chooser_only_throws_playable() {
        let mut cpu = CpuChooser::from_entropy();
        for _ in 0..50 {
            assert!(cpu.tick().is_playable());
            assert!(cpu.finalize().is_playable());
        }
    }
}
