//! Capital grid and flow payoffs.
//!
//! The capital grid is geometric with ratio `(1 - delta)^(1 / dens)`, so
//! moving `dens` positions down the grid is exactly one period of pure
//! depreciation. Flow payoffs are tabulated once per parameter set.

use ndarray::{Array1, Array2, Array3};
use tracing::{debug, info};

use crate::config::{FirmParams, SolverConfig};
use crate::error::{Branch, ConfigError, SolveError, SolveResult};
use crate::markov::MarkovChain;

/// Static operating profit with labor chosen optimally:
/// `(1 - alpha_l) (alpha_l / w)^(alpha_l / (1 - alpha_l)) (z k^alpha_k)^(1 / (1 - alpha_l))`.
pub fn operating_profit(firm: &FirmParams, z: f64, k: f64) -> f64 {
    let labor_exp = firm.alpha_l / (1.0 - firm.alpha_l);
    (1.0 - firm.alpha_l)
        * (firm.alpha_l / firm.wage).powf(labor_exp)
        * (z * k.powf(firm.alpha_k)).powf(1.0 / (1.0 - firm.alpha_l))
}

/// Capital stock that equates the marginal operating profit at productivity
/// `z` with the user cost `1/beta - 1 + delta`.
pub fn frictionless_capital(firm: &FirmParams, z: f64) -> f64 {
    let gamma = firm.alpha_k / (1.0 - firm.alpha_l);
    let scale = (1.0 - firm.alpha_l)
        * (firm.alpha_l / firm.wage).powf(firm.alpha_l / (1.0 - firm.alpha_l))
        * z.powf(1.0 / (1.0 - firm.alpha_l));
    let user_cost = 1.0 / firm.beta() - 1.0 + firm.delta;
    (user_cost / (gamma * scale)).powf(1.0 / (gamma - 1.0))
}

/// Number of depreciation steps from `kbar` down to `lb_k`.
pub fn depreciation_steps(kbar: f64, lb_k: f64, delta: f64) -> usize {
    ((lb_k / kbar).ln() / (1.0 - delta).ln()).ceil().max(1.0) as usize
}

/// Increasing capital grid of length `depreciation_steps * dens` whose top
/// point is `kbar`.
pub fn capital_grid(kbar: f64, lb_k: f64, delta: f64, dens: usize) -> Array1<f64> {
    let size = depreciation_steps(kbar, lb_k, delta) * dens;
    let ratio = (1.0 - delta).powf(1.0 / dens as f64);
    // Built from the top down, stored bottom up.
    Array1::from_shape_fn(size, |i| kbar * ratio.powi((size - 1 - i) as i32))
}

/// Everything the Bellman operator needs that does not change across
/// iterations.
#[derive(Debug, Clone)]
pub struct StateSpace {
    pub firm: FirmParams,
    pub beta: f64,
    pub dens: usize,
    /// Productivity levels.
    pub z: Array1<f64>,
    /// Row-stochastic transition matrix.
    pub pi: Array2<f64>,
    pub kvec: Array1<f64>,
    /// Frictionless capital at the median productivity state.
    pub kstar: f64,
    pub kbar: f64,
    /// `e_inactive[[z, k]]`
    pub e_inactive: Array2<f64>,
    /// `e_active[[z, k, k']]`
    pub e_active: Array3<f64>,
}

impl StateSpace {
    pub fn build(config: &SolverConfig) -> SolveResult<StateSpace> {
        config.validate()?;
        let chain = MarkovChain::from_params(&config.shocks)?;
        StateSpace::from_chain(config, &chain)
    }

    /// Build on a caller-supplied productivity chain.
    pub fn from_chain(config: &SolverConfig, chain: &MarkovChain) -> SolveResult<StateSpace> {
        config.validate()?;
        if chain.is_empty() {
            return Err(ConfigError::ProductivityStates { value: 0 }.into());
        }
        let firm = config.firm;
        let z = chain.levels();
        if chain.transitions.dim() != (z.len(), z.len()) {
            let (rows, cols) = chain.transitions.dim();
            return Err(SolveError::ShapeMismatch { expected: vec![z.len(), z.len()], found: vec![rows, cols] });
        }
        chain.check_stochastic()?;

        let kstar = frictionless_capital(&firm, z[chain.median_index()]);
        let kbar = config.grid.upper.resolve(kstar);
        if !kbar.is_finite() || kbar <= config.grid.lb_k {
            return Err(ConfigError::Bounds { kbar, lb_k: config.grid.lb_k }.into());
        }
        let kvec = capital_grid(kbar, config.grid.lb_k, firm.delta, config.grid.dens);
        info!(
            sizez = z.len(),
            sizek = kvec.len(),
            kstar,
            kbar,
            kmin = kvec[0],
            "built state space"
        );

        let e_inactive = Array2::from_shape_fn((z.len(), kvec.len()), |(iz, ik)| {
            operating_profit(&firm, z[iz], kvec[ik])
        });
        check_finite(e_inactive.indexed_iter().map(|((iz, ik), v)| (iz, ik, *v)), Branch::Inactive)?;

        let e_active = Array3::from_shape_fn((z.len(), kvec.len(), kvec.len()), |(iz, ik, ikp)| {
            let k = kvec[ik];
            e_inactive[[iz, ik]] - kvec[ikp] + (1.0 - firm.delta) * k - firm.fixed_cost * k
        });
        check_finite(e_active.indexed_iter().map(|((iz, ik, _), v)| (iz, ik, *v)), Branch::Active)?;
        debug!(entries = e_active.len(), "tabulated active payoffs");

        Ok(StateSpace {
            firm,
            beta: firm.beta(),
            dens: config.grid.dens,
            z,
            pi: chain.transitions.clone(),
            kvec,
            kstar,
            kbar,
            e_inactive,
            e_active,
        })
    }

    pub fn sizez(&self) -> usize {
        self.z.len()
    }

    pub fn sizek(&self) -> usize {
        self.kvec.len()
    }
}

fn check_finite(entries: impl Iterator<Item = (usize, usize, f64)>, branch: Branch) -> SolveResult<()> {
    for (z, k, v) in entries {
        if !v.is_finite() {
            return Err(SolveError::NonFinitePayoff { branch, z, k });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CapitalCap, SolverConfig};
    use approx::assert_relative_eq;

    #[test]
    fn grid_is_increasing_and_tops_out_at_kbar() {
        let kvec = capital_grid(12.0, 0.001, 0.154, 5);
        assert_eq!(kvec.len(), 57 * 5);
        assert_relative_eq!(kvec[kvec.len() - 1], 12.0, epsilon = 1e-12);
        assert!(kvec.windows(2).into_iter().all(|w| w[1] > w[0]));
        assert!(kvec[0] > 0.0);
    }

    #[test]
    fn dens_steps_are_one_period_of_depreciation() {
        let delta = 0.154;
        let kvec = capital_grid(12.0, 0.001, delta, 5);
        for j in 5..kvec.len() {
            assert_relative_eq!(kvec[j - 5], (1.0 - delta) * kvec[j], max_relative = 1e-12);
        }
    }

    #[test]
    fn frictionless_capital_satisfies_first_order_condition() {
        let firm = FirmParams::default();
        let kstar = frictionless_capital(&firm, 1.0);
        let h = 1e-6 * kstar;
        let marginal = (operating_profit(&firm, 1.0, kstar + h) - operating_profit(&firm, 1.0, kstar - h)) / (2.0 * h);
        assert_relative_eq!(marginal, 1.0 / firm.beta() - 1.0 + firm.delta, max_relative = 1e-6);
    }

    #[test]
    fn active_payoff_charges_investment_and_fixed_cost() {
        let space = StateSpace::build(&SolverConfig::default()).unwrap();
        let firm = space.firm;
        let (iz, ik, ikp) = (3, 100, 140);
        let k = space.kvec[ik];
        let expected = operating_profit(&firm, space.z[iz], k) - space.kvec[ikp] + (1.0 - firm.delta) * k
            - firm.fixed_cost * k;
        assert_relative_eq!(space.e_active[[iz, ik, ikp]], expected, max_relative = 1e-12);
        assert_relative_eq!(space.e_inactive[[iz, ik]], operating_profit(&firm, space.z[iz], k));
    }

    #[test]
    fn fixed_cost_is_charged_even_on_the_depreciation_path() {
        let space = StateSpace::build(&SolverConfig::default()).unwrap();
        let (iz, ik) = (4, 60);
        let ikp = ik - space.dens;
        let gap = space.e_inactive[[iz, ik]] - space.e_active[[iz, ik, ikp]];
        assert_relative_eq!(gap, space.firm.fixed_cost * space.kvec[ik], max_relative = 1e-9);
    }

    #[test]
    fn cap_can_scale_with_kstar() {
        let mut config = SolverConfig::default();
        config.grid.upper = CapitalCap::MultipleOfKstar(2.0);
        let space = StateSpace::build(&config).unwrap();
        assert_relative_eq!(space.kbar, 2.0 * space.kstar, max_relative = 1e-12);
        assert_relative_eq!(space.kvec[space.sizek() - 1], space.kbar, max_relative = 1e-12);
    }

    #[test]
    fn invalid_config_builds_nothing() {
        let mut config = SolverConfig::default();
        config.grid.upper = CapitalCap::Fixed(0.0005);
        assert!(matches!(StateSpace::build(&config), Err(SolveError::Config(_))));
    }

    #[test]
    fn caller_chain_must_be_row_stochastic() {
        let chain = MarkovChain {
            log_states: Array1::zeros(3),
            transitions: Array2::from_elem((3, 3), 0.6),
        };
        assert!(matches!(
            StateSpace::from_chain(&SolverConfig::default(), &chain),
            Err(SolveError::NonStochasticChain { row: 0, .. })
        ));
    }

    #[test]
    fn empty_chain_is_an_error_not_a_panic() {
        let chain = MarkovChain { log_states: Array1::zeros(0), transitions: Array2::zeros((0, 0)) };
        assert_eq!(
            StateSpace::from_chain(&SolverConfig::default(), &chain).unwrap_err(),
            SolveError::Config(ConfigError::ProductivityStates { value: 0 })
        );
    }

    #[test]
    fn overflowing_payoffs_are_reported() {
        let mut config = SolverConfig::default();
        config.shocks.mu = 500.0;
        assert!(matches!(
            StateSpace::build(&config),
            Err(SolveError::NonFinitePayoff { branch: Branch::Inactive, .. })
        ));
    }
}
