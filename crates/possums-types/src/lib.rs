//! Shared type definitions for the POSSUMS observation simulator.
//!
//! This crate is the single source of truth for the data model used by the
//! simulation engine: the event catalogue, per-student state sequences,
//! observation tallies, and the per-run records that statistics are folded
//! from.
//!
//! # Modules
//!
//! - [`ids`] -- Index-based identifiers for catalogue entries
//! - [`event`] -- [`Event`] records and the ordered [`EventCatalog`]
//! - [`sequence`] -- [`StudentSequence`], one event per time unit
//! - [`tally`] -- Observation tallies and run-level records

pub mod event;
pub mod ids;
pub mod sequence;
pub mod tally;

// Re-export all public types at crate root for convenience.
pub use event::{CatalogError, Event, EventCatalog};
pub use ids::EventId;
pub use sequence::StudentSequence;
pub use tally::{ClassRunEventData, CumulativeResult, EventResults, RunRecord, Tally};
