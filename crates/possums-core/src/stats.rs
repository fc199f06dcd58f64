//! Class-level and cross-run statistics.
//!
//! # Class level (one run, one interval)
//!
//! - Per-student share of an event is `tally / student total`, or 0 for a
//!   student with no observations.
//! - Class total tally is the sum over students.
//! - Class percentage is the unweighted mean of per-student shares, not the
//!   pooled ratio of class totals: a sparsely sampled student weighs as much
//!   as a densely sampled one.
//!
//! # Cross run (repeated simulation)
//!
//! Mean and sample standard deviation (`n - 1`) of each event's class total
//! and class percentage across runs. An undefined percentage counts as 0 in
//! the mean but is left out of the squared-deviation sum.

use possums_types::{
    ClassRunEventData, CumulativeResult, EventCatalog, EventId, EventResults, Tally,
};

use crate::error::SimulationError;

/// Class-level result of every event for one run and interval.
///
/// # Errors
///
/// Returns [`SimulationError::InvalidConfiguration`] if `tallies` is empty.
pub fn class_level_results(
    catalog: &EventCatalog,
    tallies: &[Tally],
) -> Result<EventResults, SimulationError> {
    if tallies.is_empty() {
        return Err(SimulationError::invalid(
            "class-level results need at least one student",
        ));
    }

    Ok(catalog
        .ids()
        .map(|id| {
            let spread = describe_students(tallies, id);
            (
                id,
                ClassRunEventData {
                    total_tally: spread.total_tally,
                    percentage: Some(spread.mean_percentage),
                },
            )
        })
        .collect())
}

/// Descriptive statistics of one event across the students of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudentSpread {
    /// Sum of the event's tally over students.
    pub total_tally: u64,
    /// Mean tally per student.
    pub mean_tally: f64,
    /// Sample standard deviation of the tally (`n - 1`); 0 for one student.
    pub std_tally: f64,
    /// Mean of per-student shares.
    pub mean_percentage: f64,
    /// Population standard deviation of per-student shares (`n`).
    pub std_percentage: f64,
}

/// Spread of event `id` over the given per-student tallies.
pub fn describe_students(tallies: &[Tally], id: EventId) -> StudentSpread {
    #[allow(clippy::cast_precision_loss)]
    let counts: Vec<f64> = tallies.iter().map(|t| t.count(id) as f64).collect();
    let shares: Vec<f64> = tallies.iter().map(|t| t.percentage(id)).collect();

    let total_tally = tallies
        .iter()
        .fold(0_u64, |acc, t| acc.saturating_add(t.count(id)));
    let mean_tally = mean(&counts);
    let mean_percentage = mean(&shares);

    StudentSpread {
        total_tally,
        mean_tally,
        std_tally: sample_std_dev(&counts, mean_tally).unwrap_or(0.0),
        mean_percentage,
        std_percentage: population_std_dev(&shares, mean_percentage),
    }
}

/// Cross-run mean and deviation for one `(interval, event)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossRunSummary {
    /// Mean class total tally.
    pub mean_tally: f64,
    /// Sample standard deviation of the class total tally.
    pub std_tally: f64,
    /// Mean class percentage, undefined values counted as 0.
    pub mean_percentage: f64,
    /// Sample standard deviation of the class percentage.
    pub std_percentage: f64,
}

/// Aggregate one `(interval, event)` pair over every run.
///
/// A run without a record for the pair contributes a tally of 0 and an
/// undefined percentage.
///
/// # Errors
///
/// Returns [`SimulationError::InsufficientRuns`] when fewer than 2 runs are
/// available.
pub fn cross_run_summary(
    cumulative: &CumulativeResult,
    interval: u64,
    id: EventId,
) -> Result<CrossRunSummary, SimulationError> {
    let runs = cumulative.len();
    if runs < 2 {
        return Err(SimulationError::InsufficientRuns { runs });
    }

    let records: Vec<Option<&ClassRunEventData>> = cumulative
        .runs()
        .iter()
        .map(|run| run.event(interval, id))
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let tallies: Vec<f64> = records
        .iter()
        .map(|r| r.map_or(0.0, |d| d.total_tally as f64))
        .collect();
    let percentages: Vec<Option<f64>> = records
        .iter()
        .map(|r| r.and_then(|d| d.percentage))
        .collect();

    let mean_tally = mean(&tallies);
    let std_tally = sample_std_dev(&tallies, mean_tally).unwrap_or(0.0);

    let filled: Vec<f64> = percentages.iter().map(|p| p.unwrap_or(0.0)).collect();
    let mean_percentage = mean(&filled);
    let squared: f64 = percentages
        .iter()
        .flatten()
        .map(|p| (p - mean_percentage) * (p - mean_percentage))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let std_percentage = (squared / (runs.saturating_sub(1)) as f64).sqrt();

    Ok(CrossRunSummary {
        mean_tally,
        std_tally,
        mean_percentage,
        std_percentage,
    })
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

/// Sample standard deviation around `mean`; `None` for fewer than 2 values.
pub fn sample_std_dev(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let denominator = (values.len().saturating_sub(1)) as f64;
    Some((squared_deviations(values, mean) / denominator).sqrt())
}

/// Population standard deviation around `mean`; 0 for an empty slice.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    (squared_deviations(values, mean) / n).sqrt()
}

fn squared_deviations(values: &[f64], mean: f64) -> f64 {
    values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum()
}
