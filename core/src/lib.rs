//! Discrete-event simulation on a virtual clock.
//!
//! A `Clock` advances either by fixed ticks, firing every registered
//! sample action, or by jumping to the next scheduled event. A `Logger`
//! records named variables against the clock's time.

pub mod action;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod logger;
pub mod queue;
pub mod rng;
pub mod store;
pub mod types;

pub use action::{action, named, Action};
pub use clock::{Clock, TimeSource};
pub use command::{ClockCommand, ClockState, LoggerCommand, LoggerState};
pub use error::{SimError, SimResult};
pub use event::{Timing, TraceEntry, TraceKind};
pub use logger::{LogMode, Logger, Record, ResolvePolicy, Resolver};
pub use types::SimTime;
