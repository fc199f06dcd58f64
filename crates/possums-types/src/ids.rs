//! Index-based identifiers.
//!
//! Events are identified by their position in the [`EventCatalog`]. The
//! catalogue fixes this ordering once, and every downstream structure
//! (transition matrix rows, tallies, run records) is keyed by it instead of
//! by the event object itself.
//!
//! [`EventCatalog`]: crate::EventCatalog

use serde::{Deserialize, Serialize};

/// Stable identifier for an event: its index in the catalogue.
///
/// The same index doubles as the Markov state index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub usize);

impl EventId {
    /// Return the underlying catalogue index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for EventId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}
