//! Variable logger: records the current values of a fixed set of named
//! variables, timestamped with a clock's current time.
//!
//! RULES:
//!   - The logger never computes values. It asks a `Resolver`.
//!   - `table` only grows while the mode is `Store`; switching mode never
//!     clears it. Only `clear` does.

use crate::{
    clock::{Clock, TimeSource},
    command::{LoggerCommand, LoggerState},
    config::LoggerConfig,
    error::{InvalidTransition, SimError, SimResult},
    types::{SimTime, VarName},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
    /// Only keep the last record.
    #[default]
    Off,
    /// Also send each record to the output sink.
    Print,
    /// Also append each record to the table.
    Store,
}

impl TryFrom<u8> for LogMode {
    type Error = SimError;

    fn try_from(code: u8) -> SimResult<Self> {
        match code {
            0 => Ok(Self::Off),
            1 => Ok(Self::Print),
            2 => Ok(Self::Store),
            _ => Err(SimError::InvalidLogMode(code)),
        }
    }
}

/// What `record` does with a variable the resolver does not know.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePolicy {
    /// Fail the whole record; nothing is updated.
    #[default]
    Strict,
    /// Record `null` for the missing variable and keep the rest.
    Partial,
}

/// Maps a variable name to its current value.
pub trait Resolver {
    fn resolve(&self, name: &str) -> Option<Value>;
}

impl Resolver for HashMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Resolver for BTreeMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A closure adapted to `Resolver`.
pub struct FnResolver<F>(pub F);

impl<F> Resolver for FnResolver<F>
where
    F: Fn(&str) -> Option<Value>,
{
    fn resolve(&self, name: &str) -> Option<Value> {
        (self.0)(name)
    }
}

/// Receives records while the logger is in `Print` mode.
pub trait Sink {
    fn emit(&mut self, record: &Record) -> SimResult<()>;
}

/// Writes one line per record: `t=<time> a=<value> b=<value> ...`.
pub struct WriterSink<W: Write> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl WriterSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn emit(&mut self, record: &Record) -> SimResult<()> {
        writeln!(self.out, "{record}")?;
        Ok(())
    }
}

/// Sends records to the `log` facade at info level.
pub struct LogSink;

impl Sink for LogSink {
    fn emit(&mut self, record: &Record) -> SimResult<()> {
        log::info!("{record}");
        Ok(())
    }
}

/// One sample of all registered variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub time:   SimTime,
    pub values: Vec<(VarName, Value)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={}", self.time)?;
        for (name, value) in &self.values {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

pub struct Logger {
    state:         LoggerState,
    time:          Option<TimeSource>,
    variables:     Vec<VarName>,
    mode:          LogMode,
    policy:        ResolvePolicy,
    last:          Option<Record>,
    table:         Vec<Record>,
    sink:          Box<dyn Sink>,
    last_rejected: Option<InvalidTransition>,
}

impl Logger {
    /// A logger in state `Undefined`, printing to stdout in `Print` mode.
    pub fn new() -> Self {
        Self::with_sink(WriterSink::stdout())
    }

    pub fn with_sink(sink: impl Sink + 'static) -> Self {
        Self {
            state: LoggerState::Undefined,
            time: None,
            variables: Vec::new(),
            mode: LogMode::Off,
            policy: ResolvePolicy::Strict,
            last: None,
            table: Vec::new(),
            sink: Box::new(sink),
            last_rejected: None,
        }
    }

    /// Build, bind and set up a logger from configuration.
    pub fn from_config<S>(config: &LoggerConfig, clock: &Clock<S>) -> SimResult<Self> {
        Self::from_config_with_sink(config, clock, WriterSink::stdout())
    }

    /// As `from_config`, printing to `sink` in `Print` mode.
    pub fn from_config_with_sink<S>(
        config: &LoggerConfig,
        clock: &Clock<S>,
        sink: impl Sink + 'static,
    ) -> SimResult<Self> {
        let mut logger = Self::with_sink(sink);
        logger.set_policy(config.policy);
        logger.init(clock)?;
        if !config.variables.is_empty() {
            logger.setup(config.variables.iter().cloned())?;
            logger.switch(config.mode)?;
        }
        Ok(logger)
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn state(&self) -> LoggerState {
        self.state
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    pub fn policy(&self) -> ResolvePolicy {
        self.policy
    }

    pub fn variables(&self) -> &[VarName] {
        &self.variables
    }

    pub fn last(&self) -> Option<&Record> {
        self.last.as_ref()
    }

    pub fn table(&self) -> &[Record] {
        &self.table
    }

    pub fn last_rejected(&self) -> Option<&InvalidTransition> {
        self.last_rejected.as_ref()
    }

    /// Choose how unresolved variables are handled. Valid in any state.
    pub fn set_policy(&mut self, policy: ResolvePolicy) {
        self.policy = policy;
    }

    // ── Commands ───────────────────────────────────────────────

    /// Bind to `clock` for timestamps.
    pub fn init<S>(&mut self, clock: &Clock<S>) -> SimResult<()> {
        self.dispatch(LoggerCommand::Init(clock.time_source()))
    }

    /// Register the variables to record. Duplicates are dropped, keeping
    /// the first occurrence.
    pub fn setup<I, V>(&mut self, variables: I) -> SimResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<VarName>,
    {
        self.dispatch(LoggerCommand::Setup(variables.into_iter().map(Into::into).collect()))
    }

    pub fn switch(&mut self, mode: LogMode) -> SimResult<()> {
        self.dispatch(LoggerCommand::Switch(mode))
    }

    /// Sample every registered variable from `resolver`.
    pub fn record(&mut self, resolver: &dyn Resolver) -> SimResult<()> {
        self.dispatch(LoggerCommand::Log(resolver))
    }

    /// Forget the last record and empty the table.
    pub fn clear(&mut self) -> SimResult<()> {
        self.dispatch(LoggerCommand::Clear)
    }

    pub fn dispatch(&mut self, command: LoggerCommand<'_>) -> SimResult<()> {
        use LoggerCommand as C;
        use LoggerState as St;

        match (self.state, command) {
            (St::Undefined, C::Init(time)) => {
                self.time = Some(time);
                self.variables.clear();
                self.mode = LogMode::Off;
                self.last = None;
                self.table.clear();
                self.state = St::Empty;
                Ok(())
            }
            (St::Empty, C::Setup(vars)) => {
                let mut unique: Vec<VarName> = Vec::with_capacity(vars.len());
                for var in vars {
                    if unique.contains(&var) {
                        log::warn!("logger: variable '{var}' registered twice, keeping the first");
                    } else {
                        unique.push(var);
                    }
                }
                log::debug!("logger: set up with {unique:?}");
                self.variables = unique;
                self.state = St::Idle;
                Ok(())
            }
            (St::Idle, C::Clear) => {
                self.last = None;
                self.table.clear();
                Ok(())
            }
            (St::Idle, C::Switch(mode)) => {
                log::debug!("logger: mode {:?} -> {mode:?}", self.mode);
                self.mode = mode;
                Ok(())
            }
            (St::Idle, C::Log(resolver)) => self.log(resolver),
            (state, command) => {
                self.last_rejected = Some(InvalidTransition::report("logger", state.name(), command.name()));
                Ok(())
            }
        }
    }

    fn log(&mut self, resolver: &dyn Resolver) -> SimResult<()> {
        let mut values = Vec::with_capacity(self.variables.len());
        for name in &self.variables {
            match (resolver.resolve(name), self.policy) {
                (Some(value), _) => values.push((name.clone(), value)),
                (None, ResolvePolicy::Strict) => {
                    return Err(SimError::UnresolvedVariable { name: name.clone() });
                }
                (None, ResolvePolicy::Partial) => {
                    log::warn!("logger: variable '{name}' could not be resolved, recorded as null");
                    values.push((name.clone(), Value::Null));
                }
            }
        }

        let time = self.time.as_ref().map(TimeSource::now).unwrap_or_default();
        let record = self.last.insert(Record { time, values });
        match self.mode {
            LogMode::Off => Ok(()),
            // The record stays in `last` even if the sink fails.
            LogMode::Print => self.sink.emit(record),
            LogMode::Store => {
                self.table.push(record.clone());
                Ok(())
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
