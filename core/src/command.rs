//! Commands and states of the two state machines.
//!
//! RULE: every public operation on `Clock` and `Logger` is a command fed
//! through the machine's `dispatch`. Transitions are a `match` over
//! `(state, command)` with an explicit default arm.

use crate::{
    clock::TimeSource,
    logger::{LogMode, Resolver},
    types::{SimTime, VarName},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClockState {
    Undefined, // just created
    Idle,      // initialised, not inside a run
    Busy,      // inside an active run
    Halted,    // stopped mid-run, resumable
}

impl ClockState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Idle      => "idle",
            Self::Busy      => "busy",
            Self::Halted    => "halted",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoggerState {
    Undefined,
    Empty, // initialised, no variables yet
    Idle,  // variables registered, ready to record
}

impl LoggerState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Empty     => "empty",
            Self::Idle      => "idle",
        }
    }
}

/// Commands understood by `Clock::dispatch`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockCommand {
    Init,
    Step,
    Run { duration: SimTime },
    Stop,
    Resume,
}

impl ClockCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init      => "init",
            Self::Step      => "step",
            Self::Run { .. } => "run",
            Self::Stop      => "stop",
            Self::Resume    => "resume",
        }
    }
}

/// Commands understood by `Logger::dispatch`.
pub enum LoggerCommand<'a> {
    Init(TimeSource),
    Setup(Vec<VarName>),
    Switch(LogMode),
    Log(&'a dyn Resolver),
    Clear,
}

impl LoggerCommand<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init(_)   => "init",
            Self::Setup(_)  => "setup",
            Self::Switch(_) => "switch",
            Self::Log(_)    => "log",
            Self::Clear     => "clear",
        }
    }
}
