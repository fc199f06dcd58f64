//! Behavioral events and the ordered event catalogue.
//!
//! An [`Event`] is a mutually exclusive behavioral category (e.g. "on task",
//! "off task", "confused") with a typical duration in time units and a
//! target share of total observation time. The [`EventCatalog`] owns the
//! events and fixes the [`EventId`] each one is referred to by.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::ids::EventId;

/// Errors raised while building events or the catalogue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    /// The catalogue contains no events.
    #[error("event catalog must contain at least one event")]
    Empty,

    /// Two events share the same name.
    #[error("duplicate event name: {0}")]
    DuplicateName(String),

    /// A single event failed validation.
    #[error("invalid event {name:?}: {reason}")]
    InvalidEvent {
        /// Name of the offending event.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// A named behavioral category.
///
/// Immutable after construction. The name is the identity key and is written
/// verbatim into comma-separated report rows, so it may not contain commas
/// or line breaks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    name: String,
    duration: u32,
    proportion: f64,
}

impl Event {
    /// Create a validated event.
    ///
    /// `duration` is the number of consecutive time units one occurrence
    /// lasts and must be at least 1. `proportion` is the target percentage of
    /// total observation time and must lie in `(0, 100]`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidEvent`] if any field is out of range.
    pub fn new(name: impl Into<String>, duration: u32, proportion: f64) -> Result<Self, CatalogError> {
        let name = name.into();
        let invalid = |reason: &str| CatalogError::InvalidEvent {
            name: name.clone(),
            reason: reason.to_owned(),
        };

        if name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if name.contains([',', '\r', '\n']) {
            return Err(invalid("name must not contain commas or line breaks"));
        }
        if duration == 0 {
            return Err(invalid("duration must be at least 1"));
        }
        if !proportion.is_finite() || proportion <= 0.0 || proportion > 100.0 {
            return Err(invalid("proportion must be in (0, 100]"));
        }

        Ok(Self {
            name,
            duration,
            proportion,
        })
    }

    /// Return the event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the number of time units one occurrence lasts.
    pub const fn duration(&self) -> u32 {
        self.duration
    }

    /// Return the target proportion as a percentage in `(0, 100]`.
    pub const fn proportion(&self) -> f64 {
        self.proportion
    }

    /// Return the target proportion as a fraction in `(0, 1]`.
    pub fn target_fraction(&self) -> f64 {
        self.proportion / 100.0
    }
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} - {} - {}", self.name, self.duration, self.proportion)
    }
}

/// Ordered, non-empty list of uniquely named events.
///
/// The position of each event is its [`EventId`], which is also its state
/// index in the Markov model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventCatalog {
    events: Vec<Event>,
}

impl EventCatalog {
    /// Build a catalogue from events in their canonical order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Empty`] for an empty list, or
    /// [`CatalogError::DuplicateName`] if two events share a name.
    pub fn new(events: Vec<Event>) -> Result<Self, CatalogError> {
        if events.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = BTreeSet::new();
        for event in &events {
            if !seen.insert(event.name()) {
                return Err(CatalogError::DuplicateName(event.name().to_owned()));
            }
        }

        Ok(Self { events })
    }

    /// Number of events in the catalogue. Always at least 1.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always `false`; present for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Look up an event by identifier.
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(id.index())
    }

    /// Find the identifier of the event with the given name.
    pub fn find(&self, name: &str) -> Option<EventId> {
        self.events
            .iter()
            .position(|e| e.name() == name)
            .map(EventId)
    }

    /// Iterate over every identifier in catalogue order.
    pub fn ids(&self) -> impl Iterator<Item = EventId> + '_ {
        (0..self.events.len()).map(EventId)
    }

    /// Iterate over `(id, event)` pairs in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.events.iter().enumerate().map(|(i, e)| (EventId(i), e))
    }

    /// Name of the event with the given identifier, or `""` when unknown.
    pub fn name_of(&self, id: EventId) -> &str {
        self.get(id).map_or("", Event::name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(name: &str, duration: u32, proportion: f64) -> Event {
        Event::new(name, duration, proportion).unwrap()
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(Event::new("", 1, 50.0).is_err());
        assert!(Event::new("a,b", 1, 50.0).is_err());
        assert!(Event::new("idle", 0, 50.0).is_err());
        assert!(Event::new("idle", 1, 0.0).is_err());
        assert!(Event::new("idle", 1, 100.5).is_err());
        assert!(Event::new("idle", 1, f64::NAN).is_err());
        assert!(Event::new("idle", 1, 100.0).is_ok());
    }

    #[test]
    fn catalog_fixes_index_order() {
        let catalog =
            EventCatalog::new(vec![event("on task", 3, 70.0), event("off task", 2, 30.0)]).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.find("off task"), Some(EventId(1)));
        assert_eq!(catalog.name_of(EventId(0)), "on task");
        assert_eq!(catalog.name_of(EventId(9)), "");
        let ids: Vec<EventId> = catalog.ids().collect();
        assert_eq!(ids, vec![EventId(0), EventId(1)]);
    }

    #[test]
    fn catalog_rejects_empty_and_duplicates() {
        assert_eq!(EventCatalog::new(Vec::new()), Err(CatalogError::Empty));
        let dup = EventCatalog::new(vec![event("idle", 1, 50.0), event("idle", 2, 50.0)]);
        assert_eq!(dup, Err(CatalogError::DuplicateName("idle".to_owned())));
    }

    #[test]
    fn display_and_target_fraction() {
        let e = event("confused", 4, 25.0);
        assert_eq!(e.to_string(), "confused - 4 - 25");
        assert!((e.target_fraction() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn catalog_serializes_as_list() {
        let catalog = EventCatalog::new(vec![event("idle", 1, 100.0)]).unwrap();
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"name": "idle", "duration": 1, "proportion": 100.0}])
        );
    }
}
