//! Cooperative virtual-time timer scheduler.
//!
//! Nothing here sleeps or spawns. The owner moves time forward with
//! [`Scheduler::advance`] and then drains the timers that came due with
//! [`Scheduler::pop_due`], one at a time and in chronological order. Pulling
//! firings one by one lets the owner react to a firing (for example by
//! cancelling every other timer) before the next one is handed out.
//!
//! ```
//! use rps_referee::scheduler::{Scheduler, TimerKind};
//! use web_time::Duration;
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.schedule(TimerKind::Countdown, Duration::from_secs(1), Some(3));
//! scheduler.schedule(TimerKind::CpuAnimation, Duration::from_millis(300), None);
//!
//! scheduler.advance(Duration::from_millis(1000));
//! let mut kinds = Vec::new();
//! while let Some(firing) = scheduler.pop_due() {
//!     kinds.push(firing.kind);
//! }
//! assert_eq!(
//!     kinds,
//!     [TimerKind::CpuAnimation, TimerKind::CpuAnimation, TimerKind::CpuAnimation, TimerKind::Countdown]
//! );
//! ```

use tracing::trace;
use web_time::Duration;

use crate::report_violation;
use crate::telemetry::{ViolationKind, ViolationSeverity};

/// The periodic activities of a round.
///
/// The declaration order doubles as the tie-break priority when two timers
/// come due at the same instant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// One-second countdown ticks.
    Countdown,
    /// CPU gesture animation frames.
    CpuAnimation,
    /// Border colour pulse.
    BorderPulse,
}

/// Handle to a scheduled timer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// A timer that came due.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Firing {
    /// The timer's handle.
    pub id: TimerId,
    /// What the timer drives.
    pub kind: TimerKind,
    /// Virtual time the timer was due at.
    pub at: Duration,
    /// Firings still to come, `None` for timers that repeat until cancelled.
    pub remaining: Option<u32>,
}

#[derive(Debug, Clone)]
struct Timer {
    id: TimerId,
    kind: TimerKind,
    interval: Duration,
    due: Duration,
    remaining: Option<u32>,
}

impl Timer {
    fn order_key(&self) -> (Duration, TimerKind, TimerId) {
        (self.due, self.kind, self.id)
    }
}

/// Single-threaded scheduler over a virtual clock.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now: Duration,
    horizon: Duration,
    timers: Vec<Timer>,
    next_id: u64,
}

impl Scheduler {
    /// An empty scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns true if no timer is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Returns true if a timer of `kind` is scheduled.
    #[must_use]
    pub fn has(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|t| t.kind == kind)
    }

    /// Schedules a timer first due one `interval` from now.
    ///
    /// `count` limits the number of firings; `None` repeats until cancelled.
    /// A zero interval is bumped to one millisecond (and reported) so a
    /// repeating timer cannot starve the clock.
    pub fn schedule(&mut self, kind: TimerKind, interval: Duration, count: Option<u32>) -> TimerId {
        let interval = if interval.is_zero() {
            report_violation!(
                ViolationSeverity::Warning,
                ViolationKind::Scheduler,
                "zero interval for {:?} timer bumped to 1ms",
                kind
            );
            Duration::from_millis(1)
        } else {
            interval
        };

        let id = TimerId(self.next_id);
        self.next_id += 1;
        if count == Some(0) {
            return id;
        }
        self.timers.push(Timer {
            id,
            kind,
            interval,
            due: self.now.saturating_add(interval),
            remaining: count,
        });
        trace!(?kind, ?interval, ?count, now = ?self.now, "timer scheduled");
        id
    }

    /// Cancels one timer. Returns false if it already finished or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        before != self.timers.len()
    }

    /// Cancels every timer.
    pub fn cancel_all(&mut self) {
        if !self.timers.is_empty() {
            trace!(cancelled = self.timers.len(), now = ?self.now, "all timers cancelled");
        }
        self.timers.clear();
    }

    /// Moves the horizon `elapsed` forward. Timers due up to the horizon are
    /// then handed out by [`pop_due`](Self::pop_due).
    pub fn advance(&mut self, elapsed: Duration) {
        self.horizon = self.horizon.max(self.now).saturating_add(elapsed);
    }

    /// Takes the earliest firing due at or before the horizon.
    ///
    /// Ties are broken by [`TimerKind`] order, then by scheduling order. When
    /// nothing more is due the clock catches up to the horizon and `None` is
    /// returned.
    pub fn pop_due(&mut self) -> Option<Firing> {
        let horizon = self.horizon;
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= horizon)
            .min_by_key(|(_, t)| t.order_key())
            .map(|(index, _)| index);

        let Some(index) = index else {
            self.now = self.now.max(horizon);
            return None;
        };

        let timer = self.timers.get_mut(index)?;
        self.now = timer.due;
        let remaining = timer.remaining.map(|n| n.saturating_sub(1));
        let firing = Firing {
            id: timer.id,
            kind: timer.kind,
            at: timer.due,
            remaining,
        };

        if remaining == Some(0) {
            self.timers.swap_remove(index);
        } else {
            timer.due = timer.due.saturating_add(timer.interval);
            timer.remaining = remaining;
        }
        Some(firing)
    }

    /// Advances by `elapsed` and drains every firing. Convenience for callers
    /// that never cancel in response to a firing.
    pub fn advance_and_collect(&mut self, elapsed: Duration) -> Vec<Firing> {
        self.advance(elapsed);
        std::iter::from_fn(|| self.pop_due()).collect()
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

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn limited_timer_fires_exactly_count_times() {
        let mut s = Scheduler::new();
        s.schedule(TimerKind::Countdown, ms(1000), Some(3));
        let firings = s.advance_and_collect(ms(10_000));
        assert_eq!(firings.len(), 3);
        assert_eq!(
            firings.iter().map(|f| f.at).collect::<Vec<_>>(),
            [ms(1000), ms(2000), ms(3000)]
        );
        assert_eq!(firings[2].remaining, Some(0));
        assert!(s.is_empty());
    }

    #[test]
    fn firings_wait_for_the_horizon() {
        let mut s = Scheduler::new();
        s.schedule(TimerKind::CpuAnimation, ms(300), None);
        assert!(s.advance_and_collect(ms(299)).is_empty());
        assert_eq!(s.now(), ms(299));
        let firings = s.advance_and_collect(ms(1));
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0].at, ms(300));
    }

    #[test]
    fn ties_follow_kind_priority() {
        let mut s = Scheduler::new();
        // Registered in reverse priority order
        s.schedule(TimerKind::BorderPulse, ms(600), None);
        s.schedule(TimerKind::CpuAnimation, ms(300), None);
        s.schedule(TimerKind::Countdown, ms(600), None);

        let kinds: Vec<_> = s.advance_and_collect(ms(600)).into_iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            [
                TimerKind::CpuAnimation,
                TimerKind::Countdown,
                TimerKind::CpuAnimation,
                TimerKind::BorderPulse
            ]
        );
    }

    #[test]
    fn same_kind_ties_follow_registration() {
        let mut s = Scheduler::new();
        let first = s.schedule(TimerKind::BorderPulse, ms(100), Some(1));
        let second = s.schedule(TimerKind::BorderPulse, ms(100), Some(1));
        let ids: Vec<_> = s.advance_and_collect(ms(100)).into_iter().map(|f| f.id).collect();
        assert_eq!(ids, [first, second]);
    }

    #[test]
    fn cancel_all_mid_drain_stops_remaining_firings() {
        let mut s = Scheduler::new();
        s.schedule(TimerKind::Countdown, ms(1000), Some(1));
        s.schedule(TimerKind::CpuAnimation, ms(1000), None);
        s.advance(ms(5000));

        let first = s.pop_due().unwrap();
        assert_eq!(first.kind, TimerKind::Countdown);
        s.cancel_all();

        assert_eq!(s.pop_due(), None);
        assert_eq!(s.now(), ms(5000));
    }

    #[test]
    fn cancel_single_timer() {
        let mut s = Scheduler::new();
        let pulse = s.schedule(TimerKind::BorderPulse, ms(800), None);
        s.schedule(TimerKind::CpuAnimation, ms(300), None);
        assert!(s.cancel(pulse));
        assert!(!s.cancel(pulse));
        assert!(!s.has(TimerKind::BorderPulse));
        assert!(s.has(TimerKind::CpuAnimation));
    }

    #[test]
    fn timers_scheduled_later_start_from_now() {
        let mut s = Scheduler::new();
        s.advance_and_collect(ms(2500));
        s.schedule(TimerKind::Countdown, ms(1000), Some(1));
        let firings = s.advance_and_collect(ms(1000));
        assert_eq!(firings[0].at, ms(3500));
    }

    #[test]
    fn zero_interval_is_bumped() {
        let mut s = Scheduler::new();
        s.schedule(TimerKind::CpuAnimation, Duration::ZERO, None);
        assert_eq!(s.advance_and_collect(ms(3)).len(), 3);
    }

    #[test]
    fn zero_count_schedules_nothing() {
        let mut s = Scheduler::new();
        s.schedule(TimerKind::Countdown, ms(10), Some(0));
        assert!(s.is_empty());
    }

    #[test]
    fn split_advances_match_one_big_advance() {
        let mut a = Scheduler::new();
        let mut b = Scheduler::new();
        for s in [&mut a, &mut b] {
            s.schedule(TimerKind::Countdown, ms(1000), Some(3));
            s.schedule(TimerKind::CpuAnimation, ms(300), None);
            s.schedule(TimerKind::BorderPulse, ms(800), None);
        }

        let whole = a.advance_and_collect(ms(3000));
        let mut pieces = Vec::new();
        for _ in 0..30 {
            pieces.extend(b.advance_and_collect(ms(100)));
        }
        assert_eq!(whole, pieces);
    }
}
