//! Scenario configuration, loaded from JSON.
//!
//! Every field has a default, so `{}` is a valid scenario: an
//! event-driven clock at time 0, a 100-unit run, seed 42 and no logging.

use crate::{
    error::SimResult,
    logger::{LogMode, ResolvePolicy},
    types::{SimTime, VarName},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClockConfig {
    /// 0 means event-driven only.
    pub tick_interval: SimTime,
    pub start_time:    SimTime,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { tick_interval: 0.0, start_time: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggerConfig {
    pub variables: Vec<VarName>,
    pub mode:      LogMode,
    pub policy:    ResolvePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScenarioConfig {
    pub clock:    ClockConfig,
    pub duration: SimTime,
    pub seed:     u64,
    pub logger:   LoggerConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            clock:    ClockConfig::default(),
            duration: 100.0,
            seed:     42,
            logger:   LoggerConfig::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::debug!("Loaded scenario config from {}", path.display());
        Ok(config)
    }
}
