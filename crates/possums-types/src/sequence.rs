//! Per-student event sequences.

use serde::Serialize;

use crate::ids::EventId;

/// The ground-truth behavior of one student: one event per time unit.
///
/// Built once by a generation strategy and read-only afterwards. The
/// requested length is kept alongside the produced events so that strategies
/// which cannot fill the whole window (quota rounding) report the gap
/// instead of hiding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentSequence {
    events: Vec<EventId>,
    target_len: u64,
}

impl StudentSequence {
    /// Wrap a generated sequence together with the length that was requested.
    pub const fn new(events: Vec<EventId>, target_len: u64) -> Self {
        Self { events, target_len }
    }

    /// Number of time units actually produced.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no time units were produced.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The requested observation window in time units.
    pub const fn target_len(&self) -> u64 {
        self.target_len
    }

    /// Time units missing from the requested window. Zero when full.
    pub fn shortfall(&self) -> u64 {
        let produced = u64::try_from(self.events.len()).unwrap_or(u64::MAX);
        self.target_len.saturating_sub(produced)
    }

    /// The event active at time index `t` (0-based).
    pub fn get(&self, t: usize) -> Option<EventId> {
        self.events.get(t).copied()
    }

    /// All events in time order.
    pub fn as_slice(&self) -> &[EventId] {
        &self.events
    }
}
