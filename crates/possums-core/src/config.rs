//! Configuration loading and typed config structures for the simulator.
//!
//! A simulation is described by a YAML document (`possums-config.yaml` by
//! default). This module defines strongly-typed structs that mirror the YAML
//! structure, a loader that reads it, and [`SimulationConfig::validate`],
//! which turns the raw document into the [`ValidatedConfig`] the engine runs
//! on.
//!
//! ```yaml
//! world:
//!   seed: 42
//! events:
//!   - { name: "on task", duration: 5, proportion: 70 }
//!   - { name: "off task", duration: 3, proportion: 30 }
//! sampling:
//!   intervals: [1, 5, 10]
//!   students: 5
//!   total_observation_time: 600
//!   repeat_count: 100
//!   strategy: markov
//! output:
//!   path: "possums-report.csv"
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use possums_types::{Event, EventCatalog};
use serde::Deserialize;

use crate::error::SimulationError;
use crate::generator::StrategyKind;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `possums-config.yaml`. Every field has a
/// default, but a usable configuration needs at least one event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (seed).
    #[serde(default)]
    pub world: WorldConfig,

    /// Event catalogue, in state-index order.
    #[serde(default)]
    pub events: Vec<EventConfig>,

    /// Sampling and repetition parameters.
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Where the report goes.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Check the configuration and build the engine's view of it.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Catalog`] if the events do not form a
    /// valid catalogue, or [`SimulationError::InvalidConfiguration`] for any
    /// other out-of-range parameter.
    pub fn validate(&self) -> Result<ValidatedConfig, SimulationError> {
        let events = self
            .events
            .iter()
            .map(|e| Event::new(e.name.clone(), e.duration, e.proportion))
            .collect::<Result<Vec<_>, _>>()?;
        let catalog = EventCatalog::new(events)?;

        let students = usize::try_from(self.sampling.students)
            .map_err(|e| SimulationError::invalid(format!("student count does not fit in memory: {e}")))?;

        ValidatedConfig::new(
            catalog,
            self.sampling.intervals.clone(),
            students,
            self.sampling.total_observation_time,
            self.sampling.repeat_count,
            self.sampling.strategy,
        )
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

/// One event entry of the catalogue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventConfig {
    /// Unique event name.
    pub name: String,
    /// Time units one occurrence lasts.
    pub duration: u32,
    /// Target percentage of total time, in `(0, 100]`.
    pub proportion: f64,
}

/// Sampling and repetition configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SamplingConfig {
    /// Sampling intervals in report order.
    #[serde(default = "default_intervals")]
    pub intervals: Vec<u64>,

    /// Number of simulated students.
    #[serde(default = "default_students")]
    pub students: u32,

    /// Observation window length in time units.
    #[serde(default = "default_total_observation_time")]
    pub total_observation_time: u64,

    /// Number of repeated runs; absent for a single run.
    #[serde(default)]
    pub repeat_count: Option<u32>,

    /// Sequence generation strategy.
    #[serde(default)]
    pub strategy: StrategyKind,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            intervals: default_intervals(),
            students: default_students(),
            total_observation_time: default_total_observation_time(),
            repeat_count: None,
            strategy: StrategyKind::default(),
        }
    }
}

/// Report destination configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Path the report is written to.
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Slack allowed above 100 when summing event proportions.
const PROPORTION_TOLERANCE: f64 = 1e-9;

/// A configuration the engine can run without further checks.
///
/// Holds the built [`EventCatalog`] and parameters that have been checked
/// for range: at least one unique positive interval, at least one student, a
/// positive observation window, and a positive repeat count when present.
/// With the quota strategy, event proportions sum to at most 100 so a
/// generated sequence never outgrows the window.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    catalog: EventCatalog,
    intervals: Vec<u64>,
    students: usize,
    total_observation_time: u64,
    repeat_count: Option<u32>,
    strategy: StrategyKind,
}

impl ValidatedConfig {
    /// Validate parameters around an already-built catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfiguration`] if any parameter is
    /// out of range.
    pub fn new(
        catalog: EventCatalog,
        intervals: Vec<u64>,
        students: usize,
        total_observation_time: u64,
        repeat_count: Option<u32>,
        strategy: StrategyKind,
    ) -> Result<Self, SimulationError> {
        if intervals.is_empty() {
            return Err(SimulationError::invalid("at least one sampling interval is required"));
        }
        if intervals.contains(&0) {
            return Err(SimulationError::invalid("sampling intervals must be at least 1"));
        }
        let unique: BTreeSet<u64> = intervals.iter().copied().collect();
        if unique.len() != intervals.len() {
            return Err(SimulationError::invalid("sampling intervals must be unique"));
        }
        if students == 0 {
            return Err(SimulationError::invalid("student count must be at least 1"));
        }
        if total_observation_time == 0 {
            return Err(SimulationError::invalid("total observation time must be at least 1"));
        }
        if repeat_count == Some(0) {
            return Err(SimulationError::invalid("repeat count must be at least 1"));
        }
        if strategy == StrategyKind::Quota {
            let total: f64 = catalog.iter().map(|(_, event)| event.proportion()).sum();
            if total > 100.0 + PROPORTION_TOLERANCE {
                return Err(SimulationError::invalid(format!(
                    "quota strategy needs event proportions summing to at most 100, got {total}"
                )));
            }
        }

        Ok(Self {
            catalog,
            intervals,
            students,
            total_observation_time,
            repeat_count,
            strategy,
        })
    }

    /// The event catalogue.
    pub const fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    /// Sampling intervals in report order.
    pub fn intervals(&self) -> &[u64] {
        &self.intervals
    }

    /// Number of students.
    pub const fn students(&self) -> usize {
        self.students
    }

    /// Observation window length in time units.
    pub const fn total_observation_time(&self) -> u64 {
        self.total_observation_time
    }

    /// Number of repeated runs, if this is a repeated simulation.
    pub const fn repeat_count(&self) -> Option<u32> {
        self.repeat_count
    }

    /// Selected generation strategy.
    pub const fn strategy(&self) -> StrategyKind {
        self.strategy
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

fn default_intervals() -> Vec<u64> {
    vec![5]
}

const fn default_students() -> u32 {
    5
}

const fn default_total_observation_time() -> u64 {
    600
}

fn default_output_path() -> String {
    "possums-report.csv".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
