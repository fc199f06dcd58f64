//! Student state sequence generation.
//!
//! A generation strategy turns the event catalogue into one ground-truth
//! [`StudentSequence`] covering the observation window. Two strategies are
//! provided behind the [`SequenceStrategy`] trait:
//!
//! - [`MarkovStrategy`] -- random walk over the [`MarkovChain`]; each visited
//!   event fills its duration, truncated at the end of the window. Always
//!   produces exactly `total_time` units.
//! - [`QuotaStrategy`] -- computes how many whole occurrences of each event
//!   hit its target proportion, shuffles that multiset and expands it. May
//!   fall short of `total_time` because quotas are rounded down; the gap is
//!   reported through [`StudentSequence::shortfall`] and never padded.
//!
//! [`GenerationStrategy`] selects one of them once per configuration.

use std::collections::BTreeMap;

use possums_types::{Event, EventCatalog, EventId, StudentSequence};
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SimulationError;
use crate::markov::MarkovChain;

/// Which generation strategy a configuration asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Markov-chain random walk.
    #[default]
    Markov,
    /// Quota multiset shuffle.
    Quota,
}

/// A way of producing one student's event sequence.
///
/// Implementations draw all randomness from the supplied generator so that a
/// whole simulation is reproducible from a single seed.
pub trait SequenceStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Generate a sequence of (at most) `total_time` time units.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] if the strategy's model does not fit the
    /// catalogue or `total_time` does not fit in memory.
    fn generate<R: Rng + ?Sized>(
        &self,
        catalog: &EventCatalog,
        total_time: u64,
        rng: &mut R,
    ) -> Result<StudentSequence, SimulationError>;
}

/// Markov-chain driven generation.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkovStrategy {
    chain: MarkovChain,
}

impl MarkovStrategy {
    /// Use the given chain. Its state count must equal the catalogue size.
    pub const fn new(chain: MarkovChain) -> Self {
        Self { chain }
    }

    /// The underlying chain.
    pub const fn chain(&self) -> &MarkovChain {
        &self.chain
    }
}

impl SequenceStrategy for MarkovStrategy {
    fn name(&self) -> &'static str {
        "markov"
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        catalog: &EventCatalog,
        total_time: u64,
        rng: &mut R,
    ) -> Result<StudentSequence, SimulationError> {
        if self.chain.state_count() != catalog.len() {
            return Err(SimulationError::InvalidTransitionMatrix {
                reason: format!(
                    "chain has {} states but catalog has {} events",
                    self.chain.state_count(),
                    catalog.len()
                ),
            });
        }

        let mut events = reserved_window(total_time)?;
        let mut visited = Vec::new();
        let mut remaining = total_time;
        let mut current = self.chain.initial_state(rng);

        while remaining > 0 {
            let duration = catalog.get(current).map_or(1, Event::duration);
            visited.push(current);
            for _ in 0..duration {
                if remaining == 0 {
                    break;
                }
                events.push(current);
                remaining = remaining.saturating_sub(1);
            }
            current = self.chain.next_state(current, rng)?;
        }

        debug!(
            occurrences = visited.len(),
            likelihood = self.chain.sequence_likelihood(&visited),
            "Markov sequence generated"
        );

        Ok(StudentSequence::new(events, total_time))
    }
}

/// Quota multiset shuffle generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaStrategy;

impl QuotaStrategy {
    /// Create the quota strategy.
    pub const fn new() -> Self {
        Self
    }
}

impl SequenceStrategy for QuotaStrategy {
    fn name(&self) -> &'static str {
        "quota"
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        catalog: &EventCatalog,
        total_time: u64,
        rng: &mut R,
    ) -> Result<StudentSequence, SimulationError> {
        let length = expected_quota_length(catalog, total_time);
        if length > total_time {
            return Err(SimulationError::invalid(format!(
                "event proportions need {length} time units but the window has {total_time}"
            )));
        }

        let quotas = quota_multiset(catalog, total_time);
        let mut events = reserved_window(length)?;
        let mut pool = reserved_window(quotas.values().sum())?;
        for (&id, &count) in &quotas {
            for _ in 0..count {
                pool.push(id);
            }
        }

        while !pool.is_empty() {
            let picked = pool.swap_remove(rng.random_range(0..pool.len()));
            let duration = catalog.get(picked).map_or(1, Event::duration);
            for _ in 0..duration {
                events.push(picked);
            }
        }

        Ok(StudentSequence::new(events, total_time))
    }
}

/// Whole occurrences of `event` needed to approach its target over
/// `total_time`: `floor(total_time * proportion / (100 * duration))`.
pub fn quota(event: &Event, total_time: u64) -> u64 {
    #[allow(clippy::cast_precision_loss)]
    let total = total_time as f64;
    let exact = total * event.proportion() / (100.0 * f64::from(event.duration()));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = exact.floor() as u64;
    whole
}

/// Quota of every event in the catalogue.
pub fn quota_multiset(catalog: &EventCatalog, total_time: u64) -> BTreeMap<EventId, u64> {
    catalog
        .iter()
        .map(|(id, event)| (id, quota(event, total_time)))
        .collect()
}

/// Length of a quota sequence: `Σ quota_i * duration_i`, never above
/// `total_time`.
pub fn expected_quota_length(catalog: &EventCatalog, total_time: u64) -> u64 {
    catalog.iter().fold(0_u64, |acc, (_, event)| {
        acc.saturating_add(quota(event, total_time).saturating_mul(u64::from(event.duration())))
    })
}

/// The strategy selected for a simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStrategy {
    /// Markov-chain random walk.
    Markov(MarkovStrategy),
    /// Quota multiset shuffle.
    Quota(QuotaStrategy),
}

impl GenerationStrategy {
    /// Build the strategy of the given kind for a catalogue.
    ///
    /// # Errors
    ///
    /// Propagates [`MarkovChain::build`] errors.
    pub fn for_catalog(kind: StrategyKind, catalog: &EventCatalog) -> Result<Self, SimulationError> {
        Ok(match kind {
            StrategyKind::Markov => Self::Markov(MarkovStrategy::new(MarkovChain::build(catalog)?)),
            StrategyKind::Quota => Self::Quota(QuotaStrategy::new()),
        })
    }

    /// The Markov chain, when the Markov strategy is active.
    pub const fn chain(&self) -> Option<&MarkovChain> {
        match self {
            Self::Markov(m) => Some(m.chain()),
            Self::Quota(_) => None,
        }
    }

    /// Generate one sequence per student.
    ///
    /// # Errors
    ///
    /// Propagates the strategy's generation errors.
    pub fn generate_class<R: Rng + ?Sized>(
        &self,
        catalog: &EventCatalog,
        students: usize,
        total_time: u64,
        rng: &mut R,
    ) -> Result<Vec<StudentSequence>, SimulationError> {
        let mut sequences = Vec::with_capacity(students);
        for _ in 0..students {
            sequences.push(self.generate(catalog, total_time, rng)?);
        }

        if let Some(first) = sequences.first()
            && first.shortfall() > 0
        {
            warn!(
                strategy = self.name(),
                produced = first.len(),
                requested = total_time,
                shortfall = first.shortfall(),
                "Generated sequences are shorter than the observation window"
            );
        }

        Ok(sequences)
    }
}

impl SequenceStrategy for GenerationStrategy {
    fn name(&self) -> &'static str {
        match self {
            Self::Markov(m) => m.name(),
            Self::Quota(q) => q.name(),
        }
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        catalog: &EventCatalog,
        total_time: u64,
        rng: &mut R,
    ) -> Result<StudentSequence, SimulationError> {
        match self {
            Self::Markov(m) => m.generate(catalog, total_time, rng),
            Self::Quota(q) => q.generate(catalog, total_time, rng),
        }
    }
}

/// An empty buffer with room for `len` time units.
fn reserved_window(len: u64) -> Result<Vec<EventId>, SimulationError> {
    let capacity = usize::try_from(len).map_err(|e| {
        SimulationError::invalid(format!("observation window of {len} units does not fit in memory: {e}"))
    })?;
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(capacity).map_err(|e| {
        SimulationError::invalid(format!("observation window of {len} units cannot be allocated: {e}"))
    })?;
    Ok(buffer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn catalog(events: &[(&str, u32, f64)]) -> EventCatalog {
        EventCatalog::new(
            events
                .iter()
                .map(|(n, d, p)| Event::new(*n, *d, *p).unwrap())
                .collect(),
        )
        .unwrap()
    }

    fn counts(seq: &StudentSequence) -> BTreeMap<EventId, u64> {
        let mut map = BTreeMap::new();
        for id in seq.as_slice() {
            *map.entry(*id).or_insert(0) += 1;
        }
        map
    }

    #[test]
    fn markov_fills_exact_window() {
        let catalog = catalog(&[("on task", 7, 60.0), ("off task", 3, 30.0), ("confused", 11, 10.0)]);
        let strategy = GenerationStrategy::for_catalog(StrategyKind::Markov, &catalog).unwrap();
        for seed in 0..50_u64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            for total in [1_u64, 2, 10, 97, 600] {
                let seq = strategy.generate(&catalog, total, &mut rng).unwrap();
                assert_eq!(seq.len() as u64, total, "seed={seed} total={total}");
                assert_eq!(seq.shortfall(), 0);
            }
        }
    }

    #[test]
    fn markov_runs_last_for_event_duration() {
        let catalog = catalog(&[("long", 5, 100.0)]);
        let strategy = GenerationStrategy::for_catalog(StrategyKind::Markov, &catalog).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let seq = strategy.generate(&catalog, 12, &mut rng).unwrap();
        assert_eq!(seq.as_slice(), vec![EventId(0); 12].as_slice());
    }

    #[test]
    fn markov_is_reproducible_under_seed() {
        let catalog = catalog(&[("a", 2, 50.0), ("b", 3, 50.0)]);
        let strategy = GenerationStrategy::for_catalog(StrategyKind::Markov, &catalog).unwrap();
        let run = |seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            strategy.generate_class(&catalog, 3, 40, &mut rng).unwrap()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn markov_rejects_mismatched_chain() {
        let small = catalog(&[("a", 1, 50.0), ("b", 1, 50.0)]);
        let big = catalog(&[("a", 1, 40.0), ("b", 1, 30.0), ("c", 1, 30.0)]);
        let strategy = MarkovStrategy::new(MarkovChain::build(&small).unwrap());
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(strategy.generate(&big, 10, &mut rng).is_err());
    }

    #[test]
    fn quota_single_full_event() {
        let catalog = catalog(&[("Q", 1, 100.0)]);
        for seed in 0..5_u64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let seq = QuotaStrategy::new().generate(&catalog, 5, &mut rng).unwrap();
            assert_eq!(seq.as_slice(), [EventId(0); 5].as_slice());
        }
    }

    #[test]
    fn quota_even_split_has_five_of_each() {
        let catalog = catalog(&[("A", 1, 50.0), ("B", 1, 50.0)]);
        let mut rng = SmallRng::seed_from_u64(42);
        let seq = QuotaStrategy::new().generate(&catalog, 10, &mut rng).unwrap();
        assert_eq!(seq.len(), 10);
        let counts = counts(&seq);
        assert_eq!(counts.get(&EventId(0)), Some(&5));
        assert_eq!(counts.get(&EventId(1)), Some(&5));
    }

    #[test]
    fn quota_length_and_multiset_match_quotas() {
        let catalog = catalog(&[("on task", 3, 62.5), ("off task", 4, 25.0), ("gaming", 7, 12.5)]);
        let total = 101;
        let quotas = quota_multiset(&catalog, total);
        // floor(101*62.5/300)=21, floor(101*25/400)=6, floor(101*12.5/700)=1
        assert_eq!(quotas.values().copied().collect::<Vec<_>>(), vec![21, 6, 1]);
        let expected_len = expected_quota_length(&catalog, total);
        assert_eq!(expected_len, 21 * 3 + 6 * 4 + 7);
        assert!(expected_len <= total);

        let mut rng = SmallRng::seed_from_u64(3);
        let seq = QuotaStrategy::new().generate(&catalog, total, &mut rng).unwrap();
        assert_eq!(seq.len() as u64, expected_len);
        assert_eq!(seq.shortfall(), total - expected_len);

        let counts = counts(&seq);
        for (id, event) in catalog.iter() {
            let units = quotas[&id] * u64::from(event.duration());
            assert_eq!(counts.get(&id).copied().unwrap_or(0), units);
        }
    }

    #[test]
    fn quota_occurrences_are_contiguous() {
        let catalog = catalog(&[("a", 4, 50.0), ("b", 2, 50.0)]);
        let mut rng = SmallRng::seed_from_u64(11);
        let seq = QuotaStrategy::new().generate(&catalog, 40, &mut rng).unwrap();
        // Runs of "a" are always a multiple of its duration.
        let mut run = 0;
        for id in seq.as_slice().iter().chain(std::iter::once(&EventId(1))) {
            if *id == EventId(0) {
                run += 1;
            } else {
                assert_eq!(run % 4, 0);
                run = 0;
            }
        }
    }

    #[test]
    fn quota_can_be_empty() {
        let catalog = catalog(&[("rare", 10, 1.0)]);
        let mut rng = SmallRng::seed_from_u64(0);
        let seq = QuotaStrategy::new().generate(&catalog, 50, &mut rng).unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.shortfall(), 50);
    }

    #[test]
    fn quota_stays_within_window_when_proportions_fill_it() {
        let catalog = catalog(&[("on task", 3, 55.5), ("off task", 4, 30.0), ("gaming", 7, 14.5)]);
        for total in [1_u64, 7, 10, 99, 100, 101, 257, 600, 1001] {
            let mut rng = SmallRng::seed_from_u64(total);
            let seq = QuotaStrategy::new().generate(&catalog, total, &mut rng).unwrap();
            assert!(seq.len() as u64 <= total, "T={total} len={}", seq.len());
            assert_eq!(seq.len() as u64 + seq.shortfall(), total);
        }
    }

    #[test]
    fn quota_rejects_proportions_beyond_window() {
        let catalog = catalog(&[("A", 1, 100.0), ("B", 1, 100.0)]);
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(matches!(
            QuotaStrategy::new().generate(&catalog, 10, &mut rng),
            Err(SimulationError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn oversized_window_is_an_error() {
        let catalog = catalog(&[("A", 1, 100.0)]);
        let total = 1_u64 << 62;
        let mut rng = SmallRng::seed_from_u64(0);
        for kind in [StrategyKind::Markov, StrategyKind::Quota] {
            let strategy = GenerationStrategy::for_catalog(kind, &catalog).unwrap();
            assert!(matches!(
                strategy.generate(&catalog, total, &mut rng),
                Err(SimulationError::InvalidConfiguration { .. })
            ));
        }
    }

    #[test]
    fn strategy_kind_parses_lowercase() {
        let kind: StrategyKind = serde_yml::from_str("quota").unwrap();
        assert_eq!(kind, StrategyKind::Quota);
        assert_eq!(StrategyKind::default(), StrategyKind::Markov);
    }
}
