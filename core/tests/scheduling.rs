//! Event scheduling tests.
//!
//! Tests cover: follow-up events, tie-breaking, past events, repeating
//! events, the `Timing` variants and monotonic time.

use simclock_core::{
    named,
    rng::SimRng,
    types::next_after,
    Clock, ClockState, SimTime, Timing,
};
use std::{cell::RefCell, rc::Rc};

// ── Test helpers ────────────────────────────────────────────────────────────

type Log = Rc<RefCell<Vec<(String, SimTime)>>>;

fn note(log: &Log, what: &str, t: SimTime) {
    log.borrow_mut().push((what.to_string(), t));
}

fn entries(log: &Log) -> Vec<(String, SimTime)> {
    log.borrow().clone()
}

/// Schedule an event that only notes its label and firing time.
fn mark(clock: &mut Clock<Log>, log: &Log, label: &'static str, at: SimTime) -> SimTime {
    clock
        .schedule_at(
            named(label, move |clock: &mut Clock<Log>, log: &Log| {
                note(log, label, clock.now());
                Ok(())
            }),
            log.clone(),
            at,
            0.0,
        )
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// foo at t=5 schedules bar two units later; a 10-unit run fires exactly
/// those two and finishes at t=10.
#[test]
fn event_schedules_follow_up_event() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::default();

    let foo = named("foo", |clock: &mut Clock<Log>, log: &Log| {
        note(log, "foo", clock.now());
        let bar = named("bar", |clock: &mut Clock<Log>, log: &Log| {
            note(log, "bar", clock.now());
            Ok(())
        });
        clock.schedule_after(bar, log.clone(), 2.0, 0.0)?;
        Ok(())
    });
    clock.schedule_at(foo, log.clone(), 5.0, 0.0).unwrap();

    clock.run(10.0).unwrap();

    assert_eq!(entries(&log), vec![("foo".to_string(), 5.0), ("bar".to_string(), 7.0)]);
    assert_eq!(clock.now(), 10.0);
    assert_eq!(clock.state(), ClockState::Idle);
    assert_eq!(clock.queued_events(), 0);
    assert_eq!(clock.events_fired(), 2);
}

/// Scheduling on an occupied time returns a strictly later, unused time.
#[test]
fn colliding_times_are_moved_up() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::default();

    let t1 = mark(&mut clock, &log, "first", 3.0);
    let t2 = mark(&mut clock, &log, "second", 3.0);
    let t3 = mark(&mut clock, &log, "third", 3.0);

    assert_eq!(t1, 3.0);
    assert_eq!(t2, next_after(3.0));
    assert_eq!(t3, next_after(t2));
    assert_eq!(clock.queued_times(), vec![t1, t2, t3]);

    clock.run(5.0).unwrap();
    let labels: Vec<String> = entries(&log).into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, ["first", "second", "third"]);
}

/// Queued times never coincide, however many events ask for the same slots.
#[test]
fn queued_times_are_unique() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::default();
    let mut returned = Vec::new();
    for i in 0..40 {
        returned.push(mark(&mut clock, &log, "x", (i % 4) as f64));
    }

    let mut sorted = returned.clone();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    assert_eq!(sorted.len(), returned.len(), "two events share a time");
    assert_eq!(clock.queued_times(), sorted);
}

/// An event in the past is queued as asked and fires on the next step,
/// without moving time backwards.
#[test]
fn past_event_fires_on_next_step() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::default();
    clock.run(10.0).unwrap();
    assert_eq!(clock.now(), 10.0);

    mark(&mut clock, &log, "later", 12.0);
    let t = mark(&mut clock, &log, "past", 4.0);
    assert_eq!(t, 4.0, "past times are not clamped");
    assert_eq!(clock.next_event_time(), Some(4.0));

    clock.step().unwrap();
    assert_eq!(entries(&log), vec![("past".to_string(), 10.0)]);
    assert_eq!(clock.now(), 10.0);

    clock.step().unwrap();
    assert_eq!(clock.now(), 12.0);
}

/// A repeating event is re-queued at fired time + interval after each firing.
#[test]
fn repeating_event_reappears() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::default();

    let tick = named("every", |clock: &mut Clock<Log>, log: &Log| {
        note(log, "every", clock.now());
        Ok(())
    });
    let first = clock.schedule_every(tick, log.clone(), 2.0).unwrap();
    assert_eq!(first, 0.0, "every fires immediately");

    clock.run(7.0).unwrap();
    let times: Vec<SimTime> = entries(&log).into_iter().map(|(_, t)| t).collect();
    assert_eq!(times, [0.0, 2.0, 4.0, 6.0]);
    assert_eq!(clock.queued_times(), vec![8.0]);

    let repeat = clock.next_event().map(|e| e.repeat_interval());
    assert_eq!(repeat, Some(2.0));
}

#[test]
fn repeating_event_from_schedule_at() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::default();
    let cycle = named("cycle", |clock: &mut Clock<Log>, log: &Log| {
        note(log, "cycle", clock.now());
        Ok(())
    });
    clock.schedule_at(cycle, log.clone(), 1.0, 2.5).unwrap();

    clock.run(6.0).unwrap();
    let times: Vec<SimTime> = entries(&log).into_iter().map(|(_, t)| t).collect();
    assert_eq!(times, [1.0, 3.5, 6.0]);
    assert_eq!(clock.queued_times(), vec![8.5]);
}

#[test]
fn timing_variants() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::new(0.0, 1.0).unwrap();
    let noop = || named("noop", |_: &mut Clock<Log>, _: &Log| Ok(()));

    assert_eq!(clock.schedule(noop(), log.clone(), Timing::At, 4.0).unwrap(), 4.0);
    assert_eq!(clock.schedule(noop(), log.clone(), Timing::Before, 6.0).unwrap(), 6.0);
    assert_eq!(clock.schedule(noop(), log.clone(), Timing::After, 2.0).unwrap(), 3.0);
    assert_eq!(clock.schedule(noop(), log.clone(), Timing::Every, 5.0).unwrap(), 1.0);

    let every = clock.next_event().unwrap();
    assert_eq!(every.time(), 1.0);
    assert!(every.is_repeating());
    assert_eq!(clock.queued_events(), 4);
}

/// Time never decreases and strictly increases with every processed step.
#[test]
fn time_is_monotonic() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::new(0.7, 0.0).unwrap();
    clock.register_sample(named("sample", |_: &mut Clock<Log>, _: &Log| Ok(())), log.clone());

    let mut rng = SimRng::new(2024, 0);
    for _ in 0..200 {
        // Whole-ish times so some collide with each other and with ticks.
        let at = (rng.uniform(1.0, 50.0) * 10.0).round() / 10.0;
        mark(&mut clock, &log, "random", at);
    }

    let mut previous = clock.now();
    for _ in 0..400 {
        clock.step().unwrap();
        assert!(clock.now() > previous, "time did not advance: {} -> {}", previous, clock.now());
        previous = clock.now();
    }
}

/// A scheduled time is reported back; callers must not assume it matches
/// the request.
#[test]
fn requested_time_is_kept_next_to_scheduled_time() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::default();
    mark(&mut clock, &log, "a", 2.0);
    mark(&mut clock, &log, "b", 2.0);

    clock.step().unwrap();
    let next = clock.next_event().unwrap();
    assert_eq!(next.label(), "b");
    assert_eq!(next.requested_time(), 2.0);
    assert!(next.time() > 2.0);
}

/// At 1e16 adjacent floats are 2 apart, so `t + 0.5 == t`. A repeating
/// event must still move forward instead of reclaiming its own slot.
#[test]
fn repeat_smaller_than_float_spacing_still_advances() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::default();
    let repeat = named("repeat", |clock: &mut Clock<Log>, log: &Log| {
        note(log, "repeat", clock.now());
        Ok(())
    });
    clock.schedule_at(repeat, log.clone(), 1e16, 0.5).unwrap();

    clock.step().unwrap();
    assert_eq!(clock.now(), 1e16);
    assert_eq!(clock.queued_times(), vec![next_after(1e16)]);

    clock.step().unwrap();
    assert_eq!(clock.now(), next_after(1e16));
}

#[test]
fn run_with_tiny_repeat_at_large_time_terminates() {
    let log = Log::default();
    let mut clock: Clock<Log> = Clock::new(0.0, 1e16).unwrap();
    let every = named("every", |clock: &mut Clock<Log>, log: &Log| {
        note(log, "every", clock.now());
        Ok(())
    });
    clock.schedule_every(every, log.clone(), 0.5).unwrap();

    clock.run(10.0).unwrap();

    let times: Vec<SimTime> = entries(&log).into_iter().map(|(_, t)| t).collect();
    assert_eq!(times.len(), 6, "fired at {times:?}");
    assert!(times.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(clock.now(), 1e16 + 10.0);
    assert_eq!(clock.state(), ClockState::Idle);
}
