//! Error taxonomy for the investment solver.
//!
//! Configuration problems are rejected before any grid is built. Numerical
//! degeneracy is surfaced as soon as a non-finite number shows up, because a
//! single NaN in the value function poisons every later iteration.
//! Running out of iterations is *not* an error from [`crate::vfi::Solver::solve`];
//! it is only turned into one by [`crate::vfi::Solution::into_converged`].

use thiserror::Error;

/// Crate-wide result alias.
pub type SolveResult<T> = Result<T, SolveError>;

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid capital share alpha_k = {value}: {reason}")]
    CapitalShare { value: f64, reason: &'static str },

    #[error("invalid labor share alpha_l = {value}: {reason}")]
    LaborShare { value: f64, reason: &'static str },

    #[error("alpha_k + alpha_l = {sum} must be below 1 for a finite optimal capital stock")]
    ReturnsToScale { sum: f64 },

    #[error("invalid depreciation rate delta = {value}: {reason}")]
    Depreciation { value: f64, reason: &'static str },

    #[error("invalid fixed adjustment cost F = {value}: {reason}")]
    FixedCost { value: f64, reason: &'static str },

    #[error("invalid wage w = {value}: {reason}")]
    Wage { value: f64, reason: &'static str },

    #[error("invalid interest rate r = {value}: {reason}")]
    InterestRate { value: f64, reason: &'static str },

    #[error("invalid persistence rho = {value}: {reason}")]
    Persistence { value: f64, reason: &'static str },

    #[error("invalid shock mean mu = {value}: {reason}")]
    ShockMean { value: f64, reason: &'static str },

    #[error("invalid shock volatility sigma_eps = {value}: {reason}")]
    ShockVolatility { value: f64, reason: &'static str },

    #[error("invalid grid width num_sigma = {value}: {reason}")]
    NumSigma { value: f64, reason: &'static str },

    #[error("productivity grid needs at least one state, got {value}")]
    ProductivityStates { value: usize },

    #[error("capital grid density must be at least 1, got {value}")]
    Density { value: usize },

    #[error("invalid capital lower bound lb_k = {value}: {reason}")]
    LowerBound { value: f64, reason: &'static str },

    #[error("capital upper bound kbar = {kbar} must exceed the lower bound lb_k = {lb_k}")]
    Bounds { kbar: f64, lb_k: f64 },

    #[error("invalid capital cap multiple = {value}: {reason}")]
    CapMultiple { value: f64, reason: &'static str },

    #[error("invalid tolerance = {value}: {reason}")]
    Tolerance { value: f64, reason: &'static str },

    #[error("max_iterations must be at least 1")]
    MaxIterations,
}

/// Which flow-payoff tensor a non-finite entry was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Active,
    Inactive,
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Branch::Active => write!(f, "active"),
            Branch::Inactive => write!(f, "inactive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("transition matrix row {row} is not a probability distribution (sum = {sum}, min = {min})")]
    NonStochasticChain { row: usize, sum: f64, min: f64 },

    #[error("non-finite {branch} flow payoff at z index {z}, k index {k}")]
    NonFinitePayoff { branch: Branch, z: usize, k: usize },

    #[error("non-finite value at iteration {iteration}, z index {z}, k index {k}")]
    NonFiniteValue { iteration: usize, z: usize, k: usize },

    #[error("value function iteration stopped after {iterations} iterations at distance {distance:e}")]
    NotConverged { iterations: usize, distance: f64 },

    #[error("policy index {index} is outside the capital grid of size {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_convert_into_solve_errors() {
        let err: SolveError = ConfigError::MaxIterations.into();
        assert_eq!(err, SolveError::Config(ConfigError::MaxIterations));
        assert_eq!(err.to_string(), "max_iterations must be at least 1");
    }

    #[test]
    fn payoff_error_names_the_branch() {
        let err = SolveError::NonFinitePayoff { branch: Branch::Active, z: 2, k: 0 };
        assert_eq!(err.to_string(), "non-finite active flow payoff at z index 2, k index 0");
    }
}
