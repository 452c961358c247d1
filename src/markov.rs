//! Finite-state Markov approximations of the AR(1) log-productivity process
//! `ln z' = (1 - rho) mu + rho ln z + eps`, `eps ~ N(0, sigma_eps^2)`.
//!
//! Transition matrices are row-stochastic: row `i` is the distribution of
//! tomorrow's state given today's state `i`.

use ndarray::{Array1, Array2, Axis};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::warn;

use crate::config::{MarkovMethod, ShockParams};
use crate::error::{ConfigError, SolveError, SolveResult};

/// Largest accepted deviation of a transition row sum from one.
pub const ROW_SUM_TOL: f64 = 1e-9;
const STATIONARY_TOL: f64 = 1e-14;
const STATIONARY_MAX_ITER: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub struct MarkovChain {
    /// Log-productivity states, increasing.
    pub log_states: Array1<f64>,
    /// `transitions[[i, j]] = P(z' = j | z = i)`.
    pub transitions: Array2<f64>,
}

impl MarkovChain {
    pub fn from_params(shocks: &ShockParams) -> Result<MarkovChain, ConfigError> {
        match shocks.method {
            MarkovMethod::Rouwenhorst => rouwenhorst(shocks.rho, shocks.mu, shocks.step(), shocks.sizez),
            MarkovMethod::Tauchen => {
                tauchen(shocks.rho, shocks.mu, shocks.sigma_eps, shocks.num_sigma, shocks.sizez)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.log_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_states.is_empty()
    }

    /// Productivity levels `z = exp(ln z)`.
    pub fn levels(&self) -> Array1<f64> {
        self.log_states.mapv(f64::exp)
    }

    /// Index of the median state. With an even number of states this is
    /// the lower of the two middle states. Zero for an empty chain.
    pub fn median_index(&self) -> usize {
        self.len().saturating_sub(1) / 2
    }

    /// Largest deviation of any row sum from one.
    pub fn row_sum_error(&self) -> f64 {
        self.transitions
            .sum_axis(Axis(1))
            .iter()
            .fold(0.0_f64, |acc, s| acc.max((s - 1.0).abs()))
    }

    /// Reject chains whose rows are not probability distributions: every
    /// entry finite and non-negative, every row summing to one within
    /// [`ROW_SUM_TOL`].
    pub fn check_stochastic(&self) -> SolveResult<()> {
        for (row, probs) in self.transitions.outer_iter().enumerate() {
            let sum = probs.sum();
            let min = probs.iter().fold(f64::INFINITY, |acc, &p| acc.min(p));
            let finite = probs.iter().all(|p| p.is_finite());
            if !finite || min < 0.0 || (sum - 1.0).abs() > ROW_SUM_TOL {
                return Err(SolveError::NonStochasticChain { row, sum, min });
            }
        }
        Ok(())
    }

    /// Invariant distribution by power iteration from the uniform distribution.
    pub fn stationary_distribution(&self) -> Array1<f64> {
        let n = self.len();
        let mut dist = Array1::from_elem(n, 1.0 / n as f64);
        let mut diff = f64::INFINITY;
        for _ in 0..STATIONARY_MAX_ITER {
            let next = dist.dot(&self.transitions);
            diff = next
                .iter()
                .zip(dist.iter())
                .fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
            dist = next;
            if diff < STATIONARY_TOL {
                return dist;
            }
        }
        if n > 0 {
            warn!(iterations = STATIONARY_MAX_ITER, diff, "stationary distribution did not settle");
        }
        dist
    }
}

fn check_rho(rho: f64) -> Result<(), ConfigError> {
    if !rho.is_finite() || rho.abs() >= 1.0 {
        return Err(ConfigError::Persistence { value: rho, reason: "must satisfy |rho| < 1" });
    }
    Ok(())
}

/// Rouwenhorst discretization on the equally spaced grid
/// `mu + (i - (sizez - 1) / 2) * step`, with `p = q = (1 + rho) / 2`.
pub fn rouwenhorst(rho: f64, mu: f64, step: f64, sizez: usize) -> Result<MarkovChain, ConfigError> {
    check_rho(rho)?;
    if sizez == 0 {
        return Err(ConfigError::ProductivityStates { value: sizez });
    }

    let center = (sizez as f64 - 1.0) / 2.0;
    let log_states = Array1::from_shape_fn(sizez, |i| mu + (i as f64 - center) * step);

    let p = (1.0 + rho) / 2.0;
    let q = p;

    let mut transitions = Array2::from_elem((1, 1), 1.0);
    for n in 2..=sizez {
        let prev = transitions;
        let mut next = Array2::<f64>::zeros((n, n));
        for i in 0..n - 1 {
            for j in 0..n - 1 {
                let x = prev[[i, j]];
                next[[i, j]] += p * x;
                next[[i, j + 1]] += (1.0 - p) * x;
                next[[i + 1, j]] += (1.0 - q) * x;
                next[[i + 1, j + 1]] += q * x;
            }
        }
        // Interior rows were hit twice.
        for i in 1..n - 1 {
            next.row_mut(i).mapv_inplace(|x| x / 2.0);
        }
        transitions = next;
    }

    Ok(MarkovChain { log_states, transitions })
}

/// Tauchen discretization on an equally spaced grid spanning
/// `mu +/- num_sigma * sigma_z`.
pub fn tauchen(
    rho: f64, mu: f64, sigma_eps: f64, num_sigma: f64, sizez: usize,
) -> Result<MarkovChain, ConfigError> {
    check_rho(rho)?;
    if sizez == 0 {
        return Err(ConfigError::ProductivityStates { value: sizez });
    }
    let shock = Normal::new(0.0, sigma_eps)
        .map_err(|_| ConfigError::ShockVolatility { value: sigma_eps, reason: "must be finite and positive" })?;

    if sizez == 1 {
        return Ok(MarkovChain {
            log_states: Array1::from_elem(1, mu),
            transitions: Array2::from_elem((1, 1), 1.0),
        });
    }

    let sigma_z = sigma_eps / (1.0 - rho * rho).sqrt();
    let top = num_sigma * sigma_z;
    let step = 2.0 * top / (sizez as f64 - 1.0);
    let deviations = Array1::from_shape_fn(sizez, |i| -top + i as f64 * step);

    let mut transitions = Array2::<f64>::zeros((sizez, sizez));
    for i in 0..sizez {
        let mean = rho * deviations[i];
        for j in 0..sizez {
            let upper = deviations[j] + step / 2.0 - mean;
            let lower = deviations[j] - step / 2.0 - mean;
            transitions[[i, j]] = if j == 0 {
                shock.cdf(upper)
            } else if j == sizez - 1 {
                1.0 - shock.cdf(lower)
            } else {
                shock.cdf(upper) - shock.cdf(lower)
            };
        }
    }

    Ok(MarkovChain { log_states: deviations.mapv(|d| d + mu), transitions })
}
