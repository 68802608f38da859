use std::collections::vec_deque::Drain;
use std::iter::FusedIterator;

use crate::GameEvent;

/// Drains the pending [`GameEvent`]s of a [`GameSession`], oldest first.
///
/// Wraps the session's queue drain so the queue type stays private. Events
/// not consumed before the drain is dropped are discarded.
///
/// ```
/// use rps_referee::{DetachedCamera, GameEvent, SessionBuilder};
///
/// let mut session = SessionBuilder::new().with_seed(1).start_session(DetachedCamera)?;
/// session.start_round()?;
/// for event in session.events() {
///     if let GameEvent::CountdownTick { value } = event {
///         println!("{value}");
///     }
/// }
/// assert_eq!(session.events().len(), 0);
/// # Ok::<(), rps_referee::RpsError>(())
/// ```
///
/// [`GameSession`]: crate::GameSession
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct EventDrain<'a> {
    inner: Drain<'a, GameEvent>,
}

impl<'a> EventDrain<'a> {
    pub(crate) fn from_drain(inner: Drain<'a, GameEvent>) -> Self {
        Self { inner }
    }
}

impl Iterator for EventDrain<'_> {
    type Item = GameEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for EventDrain<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for EventDrain<'_> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl FusedIterator for EventDrain<'_> {}

impl std::fmt::Debug for EventDrain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDrain")
            .field("remaining", &self.len())
            .finish()
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
    use crate::Gesture;
    use std::collections::VecDeque;

    fn queue(rounds: &[u32]) -> VecDeque<GameEvent> {
        rounds
            .iter()
            .map(|round| GameEvent::RoundStarted { round: *round })
            .collect()
    }

    #[test]
    fn yields_events_oldest_first() {
        let mut queue = queue(&[1, 2, 3]);
        let events: Vec<_> = EventDrain::from_drain(queue.drain(..)).collect();
        assert_eq!(
            events,
            [
                GameEvent::RoundStarted { round: 1 },
                GameEvent::RoundStarted { round: 2 },
                GameEvent::RoundStarted { round: 3 }
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn dropping_the_drain_discards_the_rest() {
        let mut queue = queue(&[1, 2]);
        queue.push_back(GameEvent::CpuChoiceChanged {
            gesture: Gesture::Rock,
        });
        {
            let mut drain = EventDrain::from_drain(queue.drain(..));
            assert_eq!(drain.next(), Some(GameEvent::RoundStarted { round: 1 }));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn is_fused() {
        let mut queue = queue(&[1]);
        let mut drain = EventDrain::from_drain(queue.drain(..));
        assert!(drain.next().is_some());
        assert!(drain.next().is_none());
        assert!(drain.next().is_none());
    }

    #[test]
    fn double_ended_iteration() {
        let mut queue = queue(&[1, 2, 3]);
        let mut drain = EventDrain::from_drain(queue.drain(..));
        assert_eq!(drain.next_back(), Some(GameEvent::RoundStarted { round: 3 }));
        assert_eq!(drain.next(), Some(GameEvent::RoundStarted { round: 1 }));
        assert_eq!(drain.len(), 1);
    }

    #[test]
    fn exact_size_and_debug() {
        let mut queue = queue(&[1, 2]);
        let mut drain = EventDrain::from_drain(queue.drain(..));
        assert_eq!(drain.size_hint(), (2, Some(2)));
        assert_eq!(format!("{drain:?}"), "EventDrain { remaining: 2 }");
        let _ = drain.next();
        assert_eq!(drain.len(), 1);
    }
}
