use crate::types::SimTime;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid time: {0}")]
    InvalidTime(SimTime),

    #[error("Invalid interval: {0} (must be finite and >= 0)")]
    InvalidInterval(SimTime),

    #[error("Invalid log mode: {0} (expected 0 = off, 1 = print, 2 = store)")]
    InvalidLogMode(u8),

    #[error("Unknown trace kind '{0}' in store")]
    UnknownTraceKind(String),

    #[error("Variable '{name}' could not be resolved")]
    UnresolvedVariable { name: String },

    #[error("Action '{label}' failed at t={time}: {source}")]
    ActionFailed {
        time:   SimTime,
        label:  String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// A command that arrived in a state with no transition for it.
///
/// Never returned as an error: the machine stays where it is, logs a
/// warning and keeps the most recent rejection for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidTransition {
    pub machine: &'static str,
    pub state:   &'static str,
    pub command: &'static str,
}

impl InvalidTransition {
    pub(crate) fn report(machine: &'static str, state: &'static str, command: &'static str) -> Self {
        log::warn!("{machine}: no transition for {command} in state {state}, ignored");
        Self { machine, state, command }
    }
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} in state {}", self.machine, self.command, self.state)
    }
}
