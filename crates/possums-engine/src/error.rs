//! Error types for the simulator binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup, simulation, and report output.

/// Top-level error for the simulator binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: possums_core::config::ConfigError,
    },

    /// Validation or the simulation itself failed.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: possums_core::error::SimulationError,
    },

    /// Writing the report failed.
    #[error("failed to write report to {path}: {source}")]
    Output {
        /// Destination that could not be written.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
