//! Scheduled items and the execution trace.

use crate::{action::Action, types::SimTime};
use serde::{Deserialize, Serialize};

/// How a scheduling time is interpreted by `Clock::schedule`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    /// At the given absolute time.
    At,
    /// The given delay after now.
    After,
    /// Now, then repeatedly with the given interval.
    Every,
    /// Treated as `At`.
    Before,
}

/// An action bound to a point on the time line.
pub struct TimedEvent<S> {
    pub(crate) action:    Box<dyn Action<S>>,
    pub(crate) scope:     S,
    /// Time the caller asked for.
    pub(crate) requested: SimTime,
    /// Time the queue assigned after tie-breaking.
    pub(crate) time:      SimTime,
    /// 0 for one-shot events.
    pub(crate) repeat:    SimTime,
}

impl<S> TimedEvent<S> {
    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn requested_time(&self) -> SimTime {
        self.requested
    }

    pub fn repeat_interval(&self) -> SimTime {
        self.repeat
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat > 0.0
    }

    pub fn label(&self) -> &str {
        self.action.label()
    }
}

impl<S> std::fmt::Debug for TimedEvent<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedEvent")
            .field("label", &self.action.label())
            .field("time", &self.time)
            .field("requested", &self.requested)
            .field("repeat", &self.repeat)
            .finish()
    }
}

/// An action fired on every tick, in registration order.
pub struct SampleRegistration<S> {
    pub(crate) action: Box<dyn Action<S>>,
    pub(crate) scope:  S,
}

impl<S> SampleRegistration<S> {
    pub fn label(&self) -> &str {
        self.action.label()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Tick,
    Event,
}

/// One executed item, as recorded when tracing is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEntry {
    pub seq:   u64,
    pub time:  SimTime,
    pub kind:  TraceKind,
    pub label: String,
}
