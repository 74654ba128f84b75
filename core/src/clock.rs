//! The simulation clock. It owns virtual time, the event queue and the
//! sample registrations, and drives them through its state machine.
//!
//! STEP ORDER (one unit of progress):
//!   1. next tick  = anchor + (n + 1) * tick_interval, if ticking
//!   2. next event = earliest queued event
//!   3. both absent          -> nothing to do
//!   4. event before tick    -> fire the event
//!   5. tick before event    -> fire every sample, in registration order
//!   6. tick and event equal -> fire the samples, then the event
//!
//! RULES:
//!   - Time never decreases. An event queued in the past fires at now.
//!   - Items are removed from the clock before their action runs, so
//!     actions get `&mut Clock` and may schedule, sample, step or stop.
//!   - Stop only takes effect between steps.

use crate::{
    action::Action,
    command::{ClockCommand, ClockState},
    config::ClockConfig,
    error::{InvalidTransition, SimError, SimResult},
    event::{SampleRegistration, TimedEvent, Timing, TraceEntry, TraceKind},
    queue::EventQueue,
    types::{finite, strictly_after, SimTime},
};
use std::{cell::Cell, rc::Rc};

/// Read-only view of a clock's current time.
///
/// Handed to collaborators (the `Logger`) that need a timestamp but must
/// not hold a borrow of the clock itself.
#[derive(Debug, Clone)]
pub struct TimeSource(Rc<Cell<SimTime>>);

impl TimeSource {
    fn new(t: SimTime) -> Self {
        Self(Rc::new(Cell::new(t)))
    }

    pub fn now(&self) -> SimTime {
        self.0.get()
    }

    fn set(&self, t: SimTime) {
        self.0.set(t);
    }
}

pub struct Clock<S> {
    time:          SimTime,
    start_time:    SimTime,
    tick_interval: SimTime,
    /// Time the tick grid was last anchored at.
    tick_anchor:   SimTime,
    /// Ticks fired since the anchor.
    tick_count:    u64,
    state:         ClockState,
    queue:         EventQueue<S>,
    samples:       Vec<SampleRegistration<S>>,
    /// End time of the run in progress (Busy) or suspended (Halted).
    run_end:       Option<SimTime>,
    /// True while a run loop is on the stack.
    driving:       bool,
    time_source:   TimeSource,
    last_rejected: Option<InvalidTransition>,
    events_fired:  u64,
    ticks_fired:   u64,
    trace:         Option<Vec<TraceEntry>>,
}

impl<S> Clock<S> {
    /// Create a clock in state `Undefined`.
    ///
    /// `tick_interval = 0` gives a purely event-driven clock; it can be
    /// changed later with `set_tick_interval`.
    pub fn new(tick_interval: SimTime, start_time: SimTime) -> SimResult<Self> {
        let tick_interval = check_interval(tick_interval)?;
        let start_time = finite(start_time).ok_or(SimError::InvalidTime(start_time))?;
        Ok(Self {
            time: start_time,
            start_time,
            tick_interval,
            tick_anchor: start_time,
            tick_count: 0,
            state: ClockState::Undefined,
            queue: EventQueue::new(),
            samples: Vec::new(),
            run_end: None,
            driving: false,
            time_source: TimeSource::new(start_time),
            last_rejected: None,
            events_fired: 0,
            ticks_fired: 0,
            trace: None,
        })
    }

    pub fn from_config(config: &ClockConfig) -> SimResult<Self> {
        Self::new(config.tick_interval, config.start_time)
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn now(&self) -> SimTime {
        self.time
    }

    pub fn start_time(&self) -> SimTime {
        self.start_time
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn tick_interval(&self) -> SimTime {
        self.tick_interval
    }

    pub fn time_source(&self) -> TimeSource {
        self.time_source.clone()
    }

    /// Time of the next tick, or `None` for an event-driven clock.
    pub fn next_tick_time(&self) -> Option<SimTime> {
        (self.tick_interval > 0.0).then(|| {
            let tick = self.tick_anchor + (self.tick_count + 1) as f64 * self.tick_interval;
            strictly_after(tick, self.time)
        })
    }

    pub fn next_event(&self) -> Option<&TimedEvent<S>> {
        self.queue.peek_next()
    }

    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.next_time()
    }

    pub fn queued_events(&self) -> usize {
        self.queue.len()
    }

    /// Scheduled times of all queued events, earliest first.
    pub fn queued_times(&self) -> Vec<SimTime> {
        self.queue.times()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn events_fired(&self) -> u64 {
        self.events_fired
    }

    pub fn ticks_fired(&self) -> u64 {
        self.ticks_fired
    }

    /// End time of the pending run, if one is in progress or halted.
    pub fn run_end(&self) -> Option<SimTime> {
        self.run_end
    }

    /// The most recent command that had no transition in its state.
    pub fn last_rejected(&self) -> Option<&InvalidTransition> {
        self.last_rejected.as_ref()
    }

    // ── Tracing ────────────────────────────────────────────────

    pub fn enable_trace(&mut self) {
        if self.trace.is_none() {
            self.trace = Some(Vec::new());
        }
    }

    pub fn trace(&self) -> &[TraceEntry] {
        self.trace.as_deref().unwrap_or(&[])
    }

    pub fn take_trace(&mut self) -> Vec<TraceEntry> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn record_trace(&mut self, kind: TraceKind, label: &str) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEntry {
                seq: trace.len() as u64,
                time: self.time,
                kind,
                label: label.to_string(),
            });
        }
    }

    // ── Configuration & scheduling ─────────────────────────────

    /// Set the tick interval. The tick grid restarts at `now()`: the
    /// next tick is `now() + dt`, whatever was pending before.
    pub fn set_tick_interval(&mut self, dt: SimTime) -> SimResult<()> {
        self.tick_interval = check_interval(dt)?;
        self.tick_anchor = self.time;
        self.tick_count = 0;
        log::debug!("t={} clock: tick interval set to {dt}", self.time);
        Ok(())
    }

    /// Schedule `action` at time `at`, repeating every `repeat` time units
    /// if `repeat > 0`.
    ///
    /// Returns the time the event was actually placed at, which is later
    /// than `at` if another event already holds that time. A time before
    /// `now()` is kept as is; such an event fires on the next step.
    pub fn schedule_at<A>(&mut self, action: A, scope: S, at: SimTime, repeat: SimTime) -> SimResult<SimTime>
    where
        A: Action<S> + 'static,
    {
        self.schedule_boxed(Box::new(action), scope, at, repeat)
    }

    /// Schedule `action` at `now() + delay`.
    pub fn schedule_after<A>(&mut self, action: A, scope: S, delay: SimTime, repeat: SimTime) -> SimResult<SimTime>
    where
        A: Action<S> + 'static,
    {
        let delay = finite(delay).ok_or(SimError::InvalidTime(delay))?;
        self.schedule_boxed(Box::new(action), scope, self.time + delay, repeat)
    }

    /// Schedule `action` now and then every `interval` time units.
    pub fn schedule_every<A>(&mut self, action: A, scope: S, interval: SimTime) -> SimResult<SimTime>
    where
        A: Action<S> + 'static,
    {
        self.schedule_boxed(Box::new(action), scope, self.time, interval)
    }

    /// Schedule with an explicit `Timing`.
    pub fn schedule<A>(&mut self, action: A, scope: S, timing: Timing, t: SimTime) -> SimResult<SimTime>
    where
        A: Action<S> + 'static,
    {
        match timing {
            Timing::At | Timing::Before => self.schedule_at(action, scope, t, 0.0),
            Timing::After               => self.schedule_after(action, scope, t, 0.0),
            Timing::Every               => self.schedule_every(action, scope, t),
        }
    }

    fn schedule_boxed(
        &mut self,
        action: Box<dyn Action<S>>,
        scope: S,
        at: SimTime,
        repeat: SimTime,
    ) -> SimResult<SimTime> {
        let at = finite(at).ok_or(SimError::InvalidTime(at))?;
        let repeat = check_interval(repeat)?;
        if at < self.time {
            log::debug!(
                "t={} clock: '{}' scheduled in the past (t={at}), fires on next step",
                self.time,
                action.label()
            );
        }
        Ok(self.queue.insert(TimedEvent { action, scope, requested: at, time: at, repeat }))
    }

    /// Register `action` to run on every tick, after all earlier
    /// registrations.
    pub fn register_sample<A>(&mut self, action: A, scope: S)
    where
        A: Action<S> + 'static,
    {
        self.samples.push(SampleRegistration { action: Box::new(action), scope });
    }

    // ── Commands ───────────────────────────────────────────────

    pub fn init(&mut self) -> SimResult<()> {
        self.dispatch(ClockCommand::Init)
    }

    /// Take one step: the next tick or the next event, whichever is first.
    pub fn step(&mut self) -> SimResult<()> {
        self.dispatch(ClockCommand::Step)
    }

    /// Run for `duration` time units from `now()`.
    pub fn run(&mut self, duration: SimTime) -> SimResult<()> {
        self.dispatch(ClockCommand::Run { duration })
    }

    pub fn stop(&mut self) -> SimResult<()> {
        self.dispatch(ClockCommand::Stop)
    }

    pub fn resume(&mut self) -> SimResult<()> {
        self.dispatch(ClockCommand::Resume)
    }

    /// Apply one command to the state machine.
    pub fn dispatch(&mut self, command: ClockCommand) -> SimResult<()> {
        use ClockCommand as C;
        use ClockState as St;

        match (self.state, command) {
            (St::Undefined, C::Init) => {
                self.initialise();
                Ok(())
            }
            (St::Undefined, C::Step | C::Run { .. }) => {
                self.initialise();
                self.dispatch(command)
            }
            (St::Idle | St::Busy | St::Halted, C::Step) => self.advance(),
            (St::Idle, C::Run { duration }) => self.start_run(duration),
            (St::Busy, C::Stop) => {
                self.state = St::Halted;
                log::debug!("t={} clock: halted", self.time);
                Ok(())
            }
            (St::Halted, C::Resume) => self.resume_run(),
            (state, command) => {
                self.last_rejected = Some(InvalidTransition::report("clock", state.name(), command.name()));
                Ok(())
            }
        }
    }

    fn initialise(&mut self) {
        self.state = ClockState::Idle;
        log::debug!(
            "t={} clock: initialised (tick interval {})",
            self.time,
            self.tick_interval
        );
    }

    fn set_time(&mut self, t: SimTime) {
        debug_assert!(t >= self.time, "time moved backwards: {} -> {t}", self.time);
        self.time = t;
        self.time_source.set(t);
    }

    /// Time of the next item, with past events counted as due now.
    fn next_due(&self) -> Option<SimTime> {
        let event = self.queue.next_time().map(|t| t.max(self.time));
        match (self.next_tick_time(), event) {
            (Some(tick), Some(ev)) => Some(tick.min(ev)),
            (tick, ev) => tick.or(ev),
        }
    }

    fn advance(&mut self) -> SimResult<()> {
        match (self.next_tick_time(), self.queue.next_time()) {
            (None, None) => {
                log::trace!("t={} clock: nothing scheduled", self.time);
                Ok(())
            }
            (Some(tick), Some(event)) if event < tick => self.fire_next_event(),
            (Some(tick), Some(event)) if event == tick => {
                self.fire_tick(tick)?;
                self.fire_next_event()
            }
            (Some(tick), _) => self.fire_tick(tick),
            (None, Some(_)) => self.fire_next_event(),
        }
    }

    fn fire_next_event(&mut self) -> SimResult<()> {
        let Some(mut event) = self.queue.pop_next() else {
            return Ok(());
        };
        let fired_at = event.time.max(self.time);
        self.set_time(fired_at);
        self.events_fired += 1;

        let label = event.action.label().to_string();
        log::debug!("t={fired_at} event '{label}'");
        self.record_trace(TraceKind::Event, &label);

        let result = event.action.execute(self, &event.scope);

        if event.repeat > 0.0 {
            event.time = strictly_after(fired_at + event.repeat, fired_at);
            event.requested = event.time;
            self.queue.insert(event);
        }

        result.map_err(|source| SimError::ActionFailed { time: fired_at, label, source })
    }

    fn fire_tick(&mut self, tick: SimTime) -> SimResult<()> {
        self.set_time(tick);
        self.tick_count += 1;
        self.ticks_fired += 1;
        log::trace!("t={tick} tick ({} samples)", self.samples.len());

        // Detached for the duration of the tick; registrations made by the
        // samples themselves land in `self.samples` and are appended after.
        let mut samples = std::mem::take(&mut self.samples);
        let mut result = Ok(());
        for sample in samples.iter_mut() {
            self.record_trace(TraceKind::Tick, sample.label());
            if let Err(source) = sample.action.execute(self, &sample.scope) {
                result = Err(SimError::ActionFailed {
                    time:  tick,
                    label: sample.label().to_string(),
                    source,
                });
                break;
            }
        }
        samples.append(&mut self.samples);
        self.samples = samples;
        result
    }

    fn start_run(&mut self, duration: SimTime) -> SimResult<()> {
        let duration = check_interval(duration)?;
        if duration == 0.0 {
            log::debug!("t={} clock: run of zero duration, nothing to do", self.time);
            return Ok(());
        }
        let end = self.time + duration;
        self.run_end = Some(end);
        self.state = ClockState::Busy;
        log::debug!("t={} clock: running until t={end}", self.time);
        self.drive()
    }

    fn resume_run(&mut self) -> SimResult<()> {
        if self.run_end.is_none() {
            self.state = ClockState::Idle;
            return Ok(());
        }
        self.state = ClockState::Busy;
        log::debug!("t={} clock: resumed", self.time);
        if self.driving {
            // Resumed from inside an action: the outer loop carries on.
            return Ok(());
        }
        self.drive()
    }

    /// Step while busy and something is due within the pending run.
    fn drive(&mut self) -> SimResult<()> {
        let Some(end) = self.run_end else {
            return Ok(());
        };
        self.driving = true;
        while self.state == ClockState::Busy {
            match self.next_due() {
                Some(t) if t <= end => {}
                _ => break,
            }
            if let Err(err) = self.advance() {
                self.state = ClockState::Halted;
                self.driving = false;
                log::warn!("t={} clock: halted after failure: {err}", self.time);
                return Err(err);
            }
        }
        self.driving = false;

        if self.state == ClockState::Busy {
            if self.time < end {
                self.set_time(end);
            }
            self.run_end = None;
            self.state = ClockState::Idle;
            log::debug!(
                "t={} clock: run complete ({} events, {} ticks so far)",
                self.time,
                self.events_fired,
                self.ticks_fired
            );
        }
        Ok(())
    }
}

impl<S> Default for Clock<S> {
    /// An event-driven clock starting at time 0.
    fn default() -> Self {
        Self {
            time: 0.0,
            start_time: 0.0,
            tick_interval: 0.0,
            tick_anchor: 0.0,
            tick_count: 0,
            state: ClockState::Undefined,
            queue: EventQueue::new(),
            samples: Vec::new(),
            run_end: None,
            driving: false,
            time_source: TimeSource::new(0.0),
            last_rejected: None,
            events_fired: 0,
            ticks_fired: 0,
            trace: None,
        }
    }
}

impl<S> std::fmt::Debug for Clock<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("time", &self.time)
            .field("state", &self.state)
            .field("tick_interval", &self.tick_interval)
            .field("queued_events", &self.queue.len())
            .field("samples", &self.samples.len())
            .finish()
    }
}

fn check_interval(dt: SimTime) -> SimResult<SimTime> {
    if dt.is_finite() && dt >= 0.0 {
        Ok(dt)
    } else {
        Err(SimError::InvalidInterval(dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::named;

    #[test]
    fn tick_grid_does_not_drift() {
        let mut clock: Clock<()> = Clock::new(0.1, 0.0).unwrap();
        for _ in 0..1000 {
            clock.step().unwrap();
        }
        assert_eq!(clock.now(), 100.0);
    }

    #[test]
    fn time_source_follows_clock() {
        let mut clock: Clock<()> = Clock::new(0.0, 2.0).unwrap();
        let source = clock.time_source();
        assert_eq!(source.now(), 2.0);
        clock.schedule_at(named("x", |_, _| Ok(())), (), 4.5, 0.0).unwrap();
        clock.step().unwrap();
        assert_eq!(source.now(), 4.5);
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        assert!(matches!(Clock::<()>::new(-1.0, 0.0), Err(SimError::InvalidInterval(_))));
        assert!(matches!(Clock::<()>::new(0.0, f64::NAN), Err(SimError::InvalidTime(_))));

        let mut clock: Clock<()> = Clock::default();
        let err = clock.schedule_at(named("x", |_, _| Ok(())), (), f64::INFINITY, 0.0);
        assert!(matches!(err, Err(SimError::InvalidTime(_))));
        let err = clock.schedule_at(named("x", |_, _| Ok(())), (), 1.0, -2.0);
        assert!(matches!(err, Err(SimError::InvalidInterval(_))));
        assert!(clock.set_tick_interval(f64::NAN).is_err());
        assert_eq!(clock.queued_events(), 0);
    }
}
