//! Observation tallies and the run-level records built from them.
//!
//! A [`Tally`] counts how often each event was observed for one student at
//! one sampling interval. Class-level results per event are stored as
//! [`ClassRunEventData`]; a [`RunRecord`] groups them per interval for one
//! simulation run, and a [`CumulativeResult`] collects run records when the
//! experiment is repeated.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::event::EventCatalog;
use crate::ids::EventId;

/// Per-event observation counts for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    counts: BTreeMap<EventId, u64>,
}

impl Tally {
    /// Create a tally with a zero count for every event in the catalogue.
    pub fn new(catalog: &EventCatalog) -> Self {
        Self {
            counts: catalog.ids().map(|id| (id, 0)).collect(),
        }
    }

    /// Record one observation of `id`.
    pub fn increment(&mut self, id: EventId) {
        let count = self.counts.entry(id).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Observations recorded for `id`.
    pub fn count(&self, id: EventId) -> u64 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Observations recorded across all events.
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .fold(0_u64, |acc, c| acc.saturating_add(*c))
    }

    /// Share of this student's observations that were `id`, in `[0, 1]`.
    ///
    /// A student with no observations at all has share 0 for every event.
    pub fn percentage(&self, id: EventId) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let (count, total) = (self.count(id) as f64, total as f64);
        count / total
    }

    /// [`percentage`](Self::percentage) for every event.
    pub fn percentages(&self) -> BTreeMap<EventId, f64> {
        self.counts
            .keys()
            .map(|&id| (id, self.percentage(id)))
            .collect()
    }

    /// Iterate over `(id, count)` pairs in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, u64)> + '_ {
        self.counts.iter().map(|(&id, &c)| (id, c))
    }
}

/// Class-level outcome for one event within one run and interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassRunEventData {
    /// Sum of this event's tally across all students.
    pub total_tally: u64,
    /// Unweighted mean of the per-student shares, when defined.
    pub percentage: Option<f64>,
}

/// Class-level results for every event at one interval.
pub type EventResults = BTreeMap<EventId, ClassRunEventData>;

/// All class-level results of one simulation run, keyed by interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunRecord {
    intervals: BTreeMap<u64, EventResults>,
}

impl RunRecord {
    /// Create an empty record.
    pub const fn new() -> Self {
        Self {
            intervals: BTreeMap::new(),
        }
    }

    /// Store the results for one interval, replacing any earlier entry.
    pub fn insert(&mut self, interval: u64, results: EventResults) {
        self.intervals.insert(interval, results);
    }

    /// Results for one interval.
    pub fn interval(&self, interval: u64) -> Option<&EventResults> {
        self.intervals.get(&interval)
    }

    /// Result for one `(interval, event)` pair.
    pub fn event(&self, interval: u64, id: EventId) -> Option<&ClassRunEventData> {
        self.intervals.get(&interval).and_then(|r| r.get(&id))
    }

    /// Intervals present in this record, ascending.
    pub fn intervals(&self) -> impl Iterator<Item = u64> + '_ {
        self.intervals.keys().copied()
    }
}

/// Run records of a repeated simulation, in run order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CumulativeResult {
    runs: Vec<RunRecord>,
}

impl CumulativeResult {
    /// Create an empty collection with room for `capacity` runs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            runs: Vec::with_capacity(capacity),
        }
    }

    /// Append the record of the next run.
    pub fn push(&mut self, run: RunRecord) {
        self.runs.push(run);
    }

    /// Number of runs collected.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no runs have been collected.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// All run records in run order.
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }
}
