//! Simulation orchestration.
//!
//! This module wires generation, sampling, aggregation and rendering into
//! the two execution modes:
//!
//! - **Single run** ([`run_single`]): one set of student sequences, one
//!   statistics block per interval, the steady-state distribution (Markov
//!   strategy only), and the raw per-time-unit ledger.
//! - **Repeated run** ([`run_repeated`]): the whole generate-and-sample
//!   experiment repeated `repeat_count` times, reported as cross-run
//!   mean/deviation tables plus a per-run ledger of class results.
//!
//! The report is rendered entirely in memory. Nothing is written unless the
//! whole run succeeds; persisting [`SimulationOutput::report`] is the
//! caller's job.

use possums_types::{CumulativeResult, RunRecord};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::ValidatedConfig;
use crate::error::SimulationError;
use crate::generator::{GenerationStrategy, SequenceStrategy};
use crate::report::ReportWriter;
use crate::sampler;
use crate::stats;

/// Result of a completed simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    /// The fully rendered report.
    pub report: String,
    /// Number of runs performed.
    pub runs: u32,
    /// Time units by which generated sequences fell short of the window
    /// (quota strategy rounding). Largest value seen across runs.
    pub shortfall: u64,
    /// Stationary distribution, when the Markov strategy was used in a
    /// single run.
    pub steady_state: Option<Vec<f64>>,
}

/// Run the simulation mode selected by the configuration.
///
/// A configuration with a repeat count runs [`run_repeated`]; otherwise
/// [`run_single`].
///
/// # Errors
///
/// Propagates the errors of the selected mode.
pub fn run<R: Rng + ?Sized>(
    config: &ValidatedConfig,
    rng: &mut R,
) -> Result<SimulationOutput, SimulationError> {
    match config.repeat_count() {
        Some(repeat_count) => run_repeated(config, repeat_count, rng),
        None => run_single(config, rng),
    }
}

/// Run one simulation and render the detailed single-run report.
///
/// # Errors
///
/// Returns [`SimulationError`] if generation, sampling, or the steady-state
/// computation fails.
pub fn run_single<R: Rng + ?Sized>(
    config: &ValidatedConfig,
    rng: &mut R,
) -> Result<SimulationOutput, SimulationError> {
    let catalog = config.catalog();
    let strategy = GenerationStrategy::for_catalog(config.strategy(), catalog)?;

    info!(
        strategy = strategy.name(),
        events = catalog.len(),
        students = config.students(),
        total_observation_time = config.total_observation_time(),
        intervals = ?config.intervals(),
        "Single simulation starting"
    );

    let sequences = strategy.generate_class(
        catalog,
        config.students(),
        config.total_observation_time(),
        rng,
    )?;
    let reference = sequences
        .first()
        .ok_or_else(|| SimulationError::invalid("student count must be at least 1"))?;
    let real_counts = sampler::real_event_counts(catalog, reference);

    let mut writer = ReportWriter::new(catalog);
    for &interval in config.intervals() {
        let tallies = sampler::sample(catalog, &sequences, interval)?;
        writer.interval_block(interval, &tallies, &real_counts);
    }

    let steady_state = match strategy.chain() {
        Some(chain) => {
            let distribution = chain.steady_state_distribution()?;
            debug!(distribution = ?distribution, "Steady state computed");
            writer.steady_state(&distribution);
            Some(distribution)
        }
        None => None,
    };
    writer.ledger(&sequences);

    Ok(SimulationOutput {
        report: writer.finish(),
        runs: 1,
        shortfall: reference.shortfall(),
        steady_state,
    })
}

/// Repeat the experiment `repeat_count` times and render the cross-run report.
///
/// # Errors
///
/// Returns [`SimulationError::InsufficientRuns`] before doing any work when
/// `repeat_count < 2`, and propagates generation and sampling errors.
pub fn run_repeated<R: Rng + ?Sized>(
    config: &ValidatedConfig,
    repeat_count: u32,
    rng: &mut R,
) -> Result<SimulationOutput, SimulationError> {
    let runs = usize::try_from(repeat_count).unwrap_or(usize::MAX);
    if runs < 2 {
        return Err(SimulationError::InsufficientRuns { runs });
    }

    let catalog = config.catalog();
    let strategy = GenerationStrategy::for_catalog(config.strategy(), catalog)?;

    info!(
        strategy = strategy.name(),
        events = catalog.len(),
        students = config.students(),
        total_observation_time = config.total_observation_time(),
        repeat_count,
        "Repeated simulation starting"
    );

    let mut cumulative = CumulativeResult::with_capacity(runs);
    let mut shortfall = 0;
    for run_number in 1..=repeat_count {
        let (record, run_shortfall) = run_once(config, &strategy, rng)?;
        cumulative.push(record);
        shortfall = shortfall.max(run_shortfall);
        debug!(run = run_number, "Run complete");
    }

    let mut writer = ReportWriter::new(catalog);
    for &interval in config.intervals() {
        writer.cumulative_block(interval, &cumulative)?;
    }

    Ok(SimulationOutput {
        report: writer.finish(),
        runs: repeat_count,
        shortfall,
        steady_state: None,
    })
}

/// Generate, sample and aggregate one run without rendering it.
///
/// Returns the run's class-level record and its sequence shortfall.
///
/// # Errors
///
/// Propagates generation, sampling and aggregation errors.
pub fn run_once<R: Rng + ?Sized>(
    config: &ValidatedConfig,
    strategy: &GenerationStrategy,
    rng: &mut R,
) -> Result<(RunRecord, u64), SimulationError> {
    let catalog = config.catalog();
    let sequences = strategy.generate_class(
        catalog,
        config.students(),
        config.total_observation_time(),
        rng,
    )?;

    let mut record = RunRecord::new();
    for &interval in config.intervals() {
        let tallies = sampler::sample(catalog, &sequences, interval)?;
        record.insert(interval, stats::class_level_results(catalog, &tallies)?);
    }

    let shortfall = sequences.first().map_or(0, |s| s.shortfall());
    Ok((record, shortfall))
}

/// Log a summary of a completed simulation.
pub fn log_simulation_end(output: &SimulationOutput) {
    info!(
        runs = output.runs,
        report_bytes = output.report.len(),
        "Simulation ended"
    );

    if output.shortfall > 0 {
        warn!(
            shortfall = output.shortfall,
            "Generated sequences did not fill the observation window"
        );
    }
}
