//! Simulation and statistics engine for the POSSUMS observation simulator.
//!
//! Given a catalogue of behavioral events, this crate synthesizes one
//! ground-truth event sequence per student, samples those sequences the way
//! a classroom observer rotating between students would, and aggregates the
//! sampled tallies into per-run and cross-run statistics rendered as a text
//! report.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration and validation into a
//!   [`ValidatedConfig`].
//! - [`error`] -- [`SimulationError`], the error type of every engine
//!   operation.
//! - [`markov`] -- Transition matrix, next-state sampling, steady state and
//!   sequence likelihood.
//! - [`generator`] -- The Markov and quota/shuffle sequence strategies.
//! - [`sampler`] -- Rotating systematic sampling and ground-truth counts.
//! - [`stats`] -- Class-level and cross-run aggregation.
//! - [`report`] -- Rendering of the CRLF comma-separated report.
//! - [`runner`] -- Single and repeated simulation modes.
//!
//! [`ValidatedConfig`]: config::ValidatedConfig
//! [`SimulationError`]: error::SimulationError

pub mod config;
pub mod error;
pub mod generator;
pub mod markov;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod stats;
