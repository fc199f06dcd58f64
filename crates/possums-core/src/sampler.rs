//! Systematic rotating observation sampling.
//!
//! A BROMP-style observer looks at one student at a time. Every `interval`
//! time units the clock advances and the observer moves on to the next
//! student in round-robin order, recording the event that student is in at
//! that instant. Students are therefore never sampled at the same instant.

use possums_types::{EventCatalog, StudentSequence, Tally};
use tracing::debug;

use crate::error::SimulationError;

/// Sample every student's sequence at the given interval.
///
/// Returns one [`Tally`] per student, in student order. The total number of
/// observations across all students is `floor((L - 1) / interval) + 1` for a
/// sequence length `L > 0` (see [`sample_count`]).
///
/// # Errors
///
/// Returns [`SimulationError::InvalidConfiguration`] if `interval` is 0 or
/// there are no students, and [`SimulationError::SequenceLengthMismatch`]
/// if the sequences are not all the same length.
pub fn sample(
    catalog: &EventCatalog,
    sequences: &[StudentSequence],
    interval: u64,
) -> Result<Vec<Tally>, SimulationError> {
    if interval == 0 {
        return Err(SimulationError::invalid("sampling interval must be at least 1"));
    }
    let first = sequences
        .first()
        .ok_or_else(|| SimulationError::invalid("at least one student sequence is required"))?;
    let length = first.len();
    if let Some((student, seq)) = sequences
        .iter()
        .enumerate()
        .find(|(_, s)| s.len() != length)
    {
        return Err(SimulationError::SequenceLengthMismatch {
            student,
            expected: length,
            actual: seq.len(),
        });
    }

    let step = usize::try_from(interval).unwrap_or(usize::MAX);
    let mut tallies: Vec<Tally> = sequences.iter().map(|_| Tally::new(catalog)).collect();
    let mut samples = 0_u64;

    // Observer rotates to the next student every time the clock advances.
    for (time_index, student) in (0..length)
        .step_by(step)
        .zip((0..sequences.len()).cycle())
    {
        if let (Some(seq), Some(tally)) = (sequences.get(student), tallies.get_mut(student))
            && let Some(event) = seq.get(time_index)
        {
            tally.increment(event);
            samples = samples.saturating_add(1);
        }
    }

    debug!(interval, length, samples, "Sequences sampled");
    Ok(tallies)
}

/// Exact per-event unit counts of one full sequence.
///
/// Used as the ground truth that sampled shares are compared against.
pub fn real_event_counts(catalog: &EventCatalog, sequence: &StudentSequence) -> Tally {
    let mut tally = Tally::new(catalog);
    for &event in sequence.as_slice() {
        tally.increment(event);
    }
    tally
}

/// Number of observations [`sample`] produces for sequence length `length`.
pub const fn sample_count(length: u64, interval: u64) -> u64 {
    if length == 0 || interval == 0 {
        return 0;
    }
    #[allow(clippy::arithmetic_side_effects)]
    let count = (length - 1) / interval + 1;
    count
}
