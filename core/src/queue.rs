//! Time-ordered event queue.
//!
//! RULE: no two queued events share a time. An insertion that lands on
//! an occupied time is moved to the next representable time above it,
//! repeatedly, until it finds a free slot. The queue therefore has a
//! strict total order and a unique next event, and insertion order never
//! has to be consulted.

use crate::{
    event::TimedEvent,
    types::{next_after, SimTime},
};
use std::{cmp::Ordering, collections::BTreeMap};

/// Finite time usable as an ordered map key.
#[derive(Debug, Clone, Copy)]
struct TimeKey(SimTime);

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for TimeKey {}
impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub struct EventQueue<S> {
    events: BTreeMap<TimeKey, TimedEvent<S>>,
}

impl<S> EventQueue<S> {
    pub fn new() -> Self {
        Self { events: BTreeMap::new() }
    }

    /// Insert `event` at the first free time `>= event.time`.
    /// Returns the time it was actually placed at.
    pub fn insert(&mut self, mut event: TimedEvent<S>) -> SimTime {
        // -0.0 and 0.0 compare equal as times; keep one key for both.
        let mut t = if event.time == 0.0 { 0.0 } else { event.time };
        while self.events.contains_key(&TimeKey(t)) {
            t = next_after(t);
        }
        if t != event.time {
            log::debug!(
                "queue: '{}' moved from t={} to t={t} (slot taken)",
                event.action.label(),
                event.time
            );
        }
        event.time = t;
        self.events.insert(TimeKey(t), event);
        t
    }

    /// Remove and return the earliest event.
    pub fn pop_next(&mut self) -> Option<TimedEvent<S>> {
        self.events.pop_first().map(|(_, e)| e)
    }

    pub fn peek_next(&self) -> Option<&TimedEvent<S>> {
        self.events.first_key_value().map(|(_, e)| e)
    }

    pub fn next_time(&self) -> Option<SimTime> {
        self.events.first_key_value().map(|(k, _)| k.0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Scheduled times in queue order.
    pub fn times(&self) -> Vec<SimTime> {
        self.events.keys().map(|k| k.0).collect()
    }
}

impl<S> Default for EventQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::named;

    fn event(label: &str, t: SimTime) -> TimedEvent<()> {
        TimedEvent {
            action:    Box::new(named(label, |_, _: &()| Ok(()))),
            scope:     (),
            requested: t,
            time:      t,
            repeat:    0.0,
        }
    }

    #[test]
    fn pops_in_time_order() {
        let mut q = EventQueue::new();
        q.insert(event("late", 30.0));
        q.insert(event("early", 10.0));
        q.insert(event("mid", 20.0));

        let labels: Vec<String> = std::iter::from_fn(|| q.pop_next())
            .map(|e| e.label().to_string())
            .collect();
        assert_eq!(labels, ["early", "mid", "late"]);
    }

    #[test]
    fn collision_moves_to_next_representable_time() {
        let mut q = EventQueue::new();
        let t1 = q.insert(event("first", 10.0));
        let t2 = q.insert(event("second", 10.0));
        let t3 = q.insert(event("third", 10.0));

        assert_eq!(t1, 10.0);
        assert_eq!(t2, next_after(10.0));
        assert_eq!(t3, next_after(next_after(10.0)));

        // Same requested time: insertion order is preserved by the ladder.
        assert_eq!(q.pop_next().unwrap().label(), "first");
        assert_eq!(q.pop_next().unwrap().label(), "second");
        assert_eq!(q.pop_next().unwrap().label(), "third");
    }

    #[test]
    fn collision_skips_every_occupied_rung() {
        let mut q = EventQueue::new();
        let bumped = next_after(5.0);
        q.insert(event("a", bumped));
        q.insert(event("b", 5.0));
        // 5.0 and its successor are both taken.
        let t = q.insert(event("c", 5.0));
        assert_eq!(t, next_after(bumped));
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn all_times_are_distinct() {
        let mut q = EventQueue::new();
        for i in 0..50 {
            q.insert(event("x", (i % 5) as f64));
        }
        let times = q.times();
        for w in times.windows(2) {
            assert!(w[0] < w[1], "queue times not strictly increasing: {:?}", w);
        }
    }

    #[test]
    fn negative_zero_collides_with_zero() {
        let mut q = EventQueue::new();
        q.insert(event("pos", 0.0));
        let t = q.insert(event("neg", -0.0));
        assert!(t > 0.0);
    }

    #[test]
    fn empty_queue() {
        let mut q: EventQueue<()> = EventQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.next_time(), None);
        assert!(q.pop_next().is_none());
    }
}
