//! Markov chain over event indices.
//!
//! The simulator models a student's behavior as a Markov chain whose states
//! are the catalogue's [`EventId`]s. The transition matrix built from a
//! catalogue is uniform (every row is `1/N`), so the next event does not
//! depend on the current one. [`TransitionMatrix::from_rows`] accepts any
//! row-stochastic matrix, and every operation here works for the general
//! case.
//!
//! # Steady state
//!
//! The stationary distribution is the left eigenvector of the matrix for
//! eigenvalue 1, i.e. the null vector of `Pᵀ - I`. One equation of that
//! system is always redundant, so it is replaced by the normalization
//! `Σπ = 1` and the system is solved by Gaussian elimination. A chain with
//! more than one closed class leaves the system singular and is reported as
//! [`SimulationError::DegenerateStationaryDistribution`].

use possums_types::{EventCatalog, EventId};
use rand::Rng;

use crate::error::SimulationError;

/// Allowed deviation of a row sum from 1.
const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Pivots smaller than this are treated as zero.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Allowed residual of `πP - π` for the eigenvalue to count as 1.
const EIGEN_TOLERANCE: f64 = 1e-8;

/// Square row-stochastic matrix indexed by event.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    rows: Vec<Vec<f64>>,
}

impl TransitionMatrix {
    /// Uniform matrix of the given size: every entry is `1/size`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidTransitionMatrix`] if `size` is 0.
    pub fn uniform(size: usize) -> Result<Self, SimulationError> {
        if size == 0 {
            return Err(SimulationError::InvalidTransitionMatrix {
                reason: "matrix must have at least one state".to_owned(),
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let p = 1.0 / size as f64;
        Ok(Self {
            rows: vec![vec![p; size]; size],
        })
    }

    /// Build a matrix from explicit rows.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidTransitionMatrix`] if the matrix is
    /// empty or not square, or if any row has a negative or non-finite
    /// entry or does not sum to 1.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, SimulationError> {
        let size = rows.len();
        if size == 0 {
            return Err(SimulationError::InvalidTransitionMatrix {
                reason: "matrix must have at least one state".to_owned(),
            });
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(SimulationError::InvalidTransitionMatrix {
                    reason: format!("row {i} has {} entries, expected {size}", row.len()),
                });
            }
            if row.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(SimulationError::InvalidTransitionMatrix {
                    reason: format!("row {i} has a negative or non-finite entry"),
                });
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(SimulationError::InvalidTransitionMatrix {
                    reason: format!("row {i} sums to {sum}, expected 1"),
                });
            }
        }
        Ok(Self { rows })
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Outgoing distribution of state `from`.
    pub fn row(&self, from: EventId) -> Option<&[f64]> {
        self.rows.get(from.index()).map(Vec::as_slice)
    }

    /// Probability of moving from `from` to `to`; 0 for unknown states.
    pub fn probability(&self, from: EventId, to: EventId) -> f64 {
        self.row(from)
            .and_then(|row| row.get(to.index()))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Markov model driving the Markov generation strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkovChain {
    matrix: TransitionMatrix,
}

impl MarkovChain {
    /// Build the uniform chain over the catalogue's events.
    ///
    /// # Errors
    ///
    /// Propagates [`TransitionMatrix::uniform`] errors.
    pub fn build(catalog: &EventCatalog) -> Result<Self, SimulationError> {
        Ok(Self {
            matrix: TransitionMatrix::uniform(catalog.len())?,
        })
    }

    /// Wrap an explicit transition matrix.
    pub const fn from_matrix(matrix: TransitionMatrix) -> Self {
        Self { matrix }
    }

    /// The transition matrix.
    pub const fn matrix(&self) -> &TransitionMatrix {
        &self.matrix
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.matrix.size()
    }

    /// Pick a starting state uniformly at random.
    pub fn initial_state<R: Rng + ?Sized>(&self, rng: &mut R) -> EventId {
        EventId(rng.random_range(0..self.matrix.size().max(1)))
    }

    /// Sample the state that follows `current`.
    ///
    /// Draws from the categorical distribution in row `current` by inverse
    /// CDF. Floating-point slack at the top of the CDF falls to the last
    /// state with non-zero probability.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidTransitionMatrix`] if `current` is
    /// not a state of this chain.
    pub fn next_state<R: Rng + ?Sized>(
        &self,
        current: EventId,
        rng: &mut R,
    ) -> Result<EventId, SimulationError> {
        let row = self
            .matrix
            .row(current)
            .ok_or_else(|| SimulationError::InvalidTransitionMatrix {
                reason: format!("state {current} out of range"),
            })?;

        let u: f64 = rng.random();
        let mut cumulative = 0.0;
        let mut last_reachable = 0;
        for (j, p) in row.iter().enumerate() {
            if *p > 0.0 {
                last_reachable = j;
            }
            cumulative += p;
            if u < cumulative {
                return Ok(EventId(j));
            }
        }
        Ok(EventId(last_reachable))
    }

    /// Long-run share of time spent in each state, summing to 1.
    ///
    /// For the uniform chain this is `[1/N; N]`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::DegenerateStationaryDistribution`] if no
    /// unique eigenvector for eigenvalue 1 exists within tolerance.
    pub fn steady_state_distribution(&self) -> Result<Vec<f64>, SimulationError> {
        let n = self.matrix.size();

        // A = Pᵀ - I with the last equation replaced by Σπ = 1.
        let mut a: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        let p = self.matrix.probability(EventId(j), EventId(i));
                        if i == j { p - 1.0 } else { p }
                    })
                    .collect()
            })
            .collect();
        let mut b = vec![0.0; n];
        if let (Some(last_row), Some(last_b)) = (a.last_mut(), b.last_mut()) {
            last_row.iter_mut().for_each(|x| *x = 1.0);
            *last_b = 1.0;
        }

        let mut pi =
            solve_linear_system(&mut a, &mut b).ok_or(SimulationError::DegenerateStationaryDistribution)?;

        // Reject solutions that are not actually fixed points of the chain.
        for j in 0..n {
            let projected: f64 = pi
                .iter()
                .enumerate()
                .map(|(i, x)| x * self.matrix.probability(EventId(i), EventId(j)))
                .sum();
            let current = pi.get(j).copied().unwrap_or(0.0);
            if (projected - current).abs() > EIGEN_TOLERANCE {
                return Err(SimulationError::DegenerateStationaryDistribution);
            }
        }
        if pi.iter().any(|x| *x < -EIGEN_TOLERANCE) {
            return Err(SimulationError::DegenerateStationaryDistribution);
        }

        for x in &mut pi {
            *x = x.max(0.0);
        }
        let sum: f64 = pi.iter().sum();
        if sum <= 0.0 {
            return Err(SimulationError::DegenerateStationaryDistribution);
        }
        for x in &mut pi {
            *x /= sum;
        }
        Ok(pi)
    }

    /// Probability of observing `states` as a path through the chain.
    ///
    /// Product of `P[s_i][s_{i+1}]` over consecutive pairs; 1.0 for empty or
    /// single-state paths.
    pub fn sequence_likelihood(&self, states: &[EventId]) -> f64 {
        states
            .windows(2)
            .map(|pair| match pair {
                [from, to] => self.matrix.probability(*from, *to),
                _ => 1.0,
            })
            .product()
    }
}

/// Solve `a x = b` in place by Gaussian elimination with partial pivoting.
///
/// Returns `None` when the system is singular within [`SINGULAR_TOLERANCE`].
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
fn solve_linear_system(a: &mut [Vec<f64>], b: &mut [f64]) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_TOLERANCE {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use possums_types::Event;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn catalog(n: usize) -> EventCatalog {
        EventCatalog::new(
            (0..n)
                .map(|i| Event::new(format!("event{i}"), 1, 10.0).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn uniform_rows_are_distributions() {
        let chain = MarkovChain::build(&catalog(4)).unwrap();
        assert_eq!(chain.state_count(), 4);
        for i in 0..4 {
            let row = chain.matrix().row(EventId(i)).unwrap();
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            assert!(row.iter().all(|p| (p - 0.25).abs() < 1e-12));
        }
    }

    #[test]
    fn uniform_steady_state_is_uniform() {
        for n in 1..=7 {
            let chain = MarkovChain::build(&catalog(n)).unwrap();
            let pi = chain.steady_state_distribution().unwrap();
            assert_eq!(pi.len(), n);
            #[allow(clippy::cast_precision_loss)]
            let expected = 1.0 / n as f64;
            for p in pi {
                assert!((p - expected).abs() < 1e-9, "n={n} p={p}");
            }
        }
    }

    #[test]
    fn non_uniform_steady_state() {
        let matrix = TransitionMatrix::from_rows(vec![vec![0.9, 0.1], vec![0.5, 0.5]]).unwrap();
        let pi = MarkovChain::from_matrix(matrix)
            .steady_state_distribution()
            .unwrap();
        assert!((pi[0] - 5.0 / 6.0).abs() < 1e-9);
        assert!((pi[1] - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn reducible_chain_is_degenerate() {
        let identity = TransitionMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let result = MarkovChain::from_matrix(identity).steady_state_distribution();
        assert_eq!(result, Err(SimulationError::DegenerateStationaryDistribution));
    }

    #[test]
    fn from_rows_validates_shape_and_sums() {
        assert!(TransitionMatrix::from_rows(Vec::new()).is_err());
        assert!(TransitionMatrix::from_rows(vec![vec![0.5, 0.5]]).is_err());
        assert!(TransitionMatrix::from_rows(vec![vec![0.6, 0.6], vec![0.5, 0.5]]).is_err());
        assert!(TransitionMatrix::from_rows(vec![vec![1.5, -0.5], vec![0.5, 0.5]]).is_err());
        assert!(TransitionMatrix::uniform(0).is_err());
    }

    #[test]
    fn next_state_follows_deterministic_rows() {
        let matrix = TransitionMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let chain = MarkovChain::from_matrix(matrix);
        let mut rng = SmallRng::seed_from_u64(42);
        let mut state = EventId(0);
        for step in 0..10 {
            state = chain.next_state(state, &mut rng).unwrap();
            assert_eq!(state, EventId((step + 1) % 2));
        }
        assert!(chain.next_state(EventId(5), &mut rng).is_err());
    }

    #[test]
    fn next_state_is_reproducible_under_seed() {
        let chain = MarkovChain::build(&catalog(5)).unwrap();
        let walk = |seed: u64| {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut state = chain.initial_state(&mut rng);
            let mut path = vec![state];
            for _ in 0..50 {
                state = chain.next_state(state, &mut rng).unwrap();
                path.push(state);
            }
            path
        };
        assert_eq!(walk(7), walk(7));
        assert!(walk(7).iter().all(|s| s.index() < 5));
    }

    #[test]
    fn sequence_likelihood_multiplies_transitions() {
        let chain = MarkovChain::build(&catalog(2)).unwrap();
        assert!((chain.sequence_likelihood(&[]) - 1.0).abs() < f64::EPSILON);
        assert!((chain.sequence_likelihood(&[EventId(1)]) - 1.0).abs() < f64::EPSILON);
        let path = [EventId(0), EventId(1), EventId(1), EventId(0)];
        assert!((chain.sequence_likelihood(&path) - 0.125).abs() < 1e-12);

        let matrix = TransitionMatrix::from_rows(vec![vec![0.9, 0.1], vec![0.5, 0.5]]).unwrap();
        let chain = MarkovChain::from_matrix(matrix);
        let likelihood = chain.sequence_likelihood(&[EventId(0), EventId(0), EventId(1)]);
        assert!((likelihood - 0.09).abs() < 1e-12);
    }
}
