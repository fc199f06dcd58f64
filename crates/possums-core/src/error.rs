//! Error types for the `possums-core` crate.
//!
//! Every engine operation returns [`SimulationError`]. None of them are
//! retryable: given the same configuration and seed the computation fails
//! the same way again.

use possums_types::CatalogError;

/// Errors that can occur while configuring or running a simulation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    /// The configuration is unusable (no students, zero interval, ...).
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// The event catalogue could not be built.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Student sequences handed to the sampler differ in length.
    #[error("sequence length mismatch: student {student} has {actual} time units, expected {expected}")]
    SequenceLengthMismatch {
        /// Zero-based index of the first offending student.
        student: usize,
        /// Length of the first student's sequence.
        expected: usize,
        /// Length of the offending sequence.
        actual: usize,
    },

    /// Cross-run statistics need at least two runs.
    #[error("cross-run statistics require at least 2 runs, got {runs}")]
    InsufficientRuns {
        /// Number of runs that were available.
        runs: usize,
    },

    /// No eigenvalue within tolerance of 1 was found for the transition matrix.
    #[error("no stationary distribution found for the transition matrix")]
    DegenerateStationaryDistribution,

    /// A transition matrix is not square or a row is not a distribution.
    #[error("invalid transition matrix: {reason}")]
    InvalidTransitionMatrix {
        /// Explanation of what is wrong with the matrix.
        reason: String,
    },
}

impl SimulationError {
    /// Shorthand for [`SimulationError::InvalidConfiguration`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
