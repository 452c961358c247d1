//! Solver configuration.
//!
//! All parameters live in one immutable [`SolverConfig`]. `Default` gives the
//! reference calibration; [`SolverConfig::validate`] must pass before any grid
//! is built.

use crate::error::ConfigError;

// 1. Firm technology and prices
pub const ALPHA_K: f64 = 0.29715; // Elasticity of output w.r.t. capital
pub const ALPHA_L: f64 = 0.65; // Elasticity of output w.r.t. labor
pub const DELTA: f64 = 0.154; // Depreciation rate
pub const FIXED_COST: f64 = 0.02; // Fixed adjustment cost, fraction of capital
pub const WAGE: f64 = 0.7;
pub const INTEREST_RATE: f64 = 0.04;

// 2. Log-productivity AR(1)
pub const RHO: f64 = 0.7605;
pub const MU: f64 = 0.0;
pub const SIGMA_EPS: f64 = 0.213;

// 3. Dimensions to generate the grids
pub const SIZE_Z: usize = 9;
pub const NUM_SIGMA: f64 = 3.0;
pub const DENSITY: usize = 5;
pub const KBAR: f64 = 12.0;
pub const LB_K: f64 = 0.001;

// 4. Convergence
pub const TOLERANCE: f64 = 1e-6;
pub const MAX_ITERATIONS: usize = 3000;

/// Technology, prices and adjustment cost of the firm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirmParams {
    pub alpha_k: f64,
    pub alpha_l: f64,
    pub delta: f64,
    /// Fixed cost `F`, paid as `F * k` whenever capital is adjusted.
    pub fixed_cost: f64,
    pub wage: f64,
    pub interest_rate: f64,
}

impl Default for FirmParams {
    fn default() -> Self {
        FirmParams {
            alpha_k: ALPHA_K,
            alpha_l: ALPHA_L,
            delta: DELTA,
            fixed_cost: FIXED_COST,
            wage: WAGE,
            interest_rate: INTEREST_RATE,
        }
    }
}

impl FirmParams {
    /// Discount factor `1 / (1 + r)`.
    pub fn beta(&self) -> f64 {
        1.0 / (1.0 + self.interest_rate)
    }
}

/// Discretization scheme for the productivity process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkovMethod {
    #[default]
    Rouwenhorst,
    Tauchen,
}

/// AR(1) log-productivity `ln z' = (1 - rho) mu + rho ln z + eps`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShockParams {
    pub rho: f64,
    pub mu: f64,
    pub sigma_eps: f64,
    pub sizez: usize,
    /// Half-width of the grid in unconditional standard deviations.
    pub num_sigma: f64,
    pub method: MarkovMethod,
}

impl Default for ShockParams {
    fn default() -> Self {
        ShockParams {
            rho: RHO,
            mu: MU,
            sigma_eps: SIGMA_EPS,
            sizez: SIZE_Z,
            num_sigma: NUM_SIGMA,
            method: MarkovMethod::default(),
        }
    }
}

impl ShockParams {
    /// Unconditional standard deviation of log productivity.
    pub fn sigma_z(&self) -> f64 {
        self.sigma_eps / (1.0 - self.rho * self.rho).sqrt()
    }

    /// Spacing between adjacent log-productivity states.
    pub fn step(&self) -> f64 {
        if self.sizez < 2 {
            return 0.0;
        }
        self.num_sigma * self.sigma_z() / (self.sizez as f64 / 2.0)
    }
}

/// Upper end of the capital grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapitalCap {
    Fixed(f64),
    /// `kbar = multiple * kstar`.
    MultipleOfKstar(f64),
}

impl Default for CapitalCap {
    fn default() -> Self {
        CapitalCap::Fixed(KBAR)
    }
}

impl CapitalCap {
    pub fn resolve(&self, kstar: f64) -> f64 {
        match *self {
            CapitalCap::Fixed(kbar) => kbar,
            CapitalCap::MultipleOfKstar(multiple) => multiple * kstar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParams {
    /// Grid points per pure-depreciation step.
    pub dens: usize,
    pub upper: CapitalCap,
    pub lb_k: f64,
}

impl Default for GridParams {
    fn default() -> Self {
        GridParams { dens: DENSITY, upper: CapitalCap::default(), lb_k: LB_K }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceParams {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl ConvergenceParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::Tolerance { value: self.tolerance, reason: "must be finite and positive" });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::MaxIterations);
        }
        Ok(())
    }
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        ConvergenceParams { tolerance: TOLERANCE, max_iterations: MAX_ITERATIONS }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverConfig {
    pub firm: FirmParams,
    pub shocks: ShockParams,
    pub grid: GridParams,
    pub convergence: ConvergenceParams,
}

impl SolverConfig {
    pub fn beta(&self) -> f64 {
        self.firm.beta()
    }

    /// Reject anything that would make grid construction or the contraction
    /// argument meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.firm;
        let s = &self.shocks;
        let g = &self.grid;
        let c = &self.convergence;

        if !f.alpha_k.is_finite() || f.alpha_k <= 0.0 || f.alpha_k >= 1.0 {
            return Err(ConfigError::CapitalShare { value: f.alpha_k, reason: "must lie in (0, 1)" });
        }
        if !f.alpha_l.is_finite() || f.alpha_l <= 0.0 || f.alpha_l >= 1.0 {
            return Err(ConfigError::LaborShare { value: f.alpha_l, reason: "must lie in (0, 1)" });
        }
        if f.alpha_k + f.alpha_l >= 1.0 {
            return Err(ConfigError::ReturnsToScale { sum: f.alpha_k + f.alpha_l });
        }
        if !f.delta.is_finite() || f.delta <= 0.0 || f.delta >= 1.0 {
            return Err(ConfigError::Depreciation { value: f.delta, reason: "must lie in (0, 1)" });
        }
        if !f.fixed_cost.is_finite() || f.fixed_cost < 0.0 {
            return Err(ConfigError::FixedCost { value: f.fixed_cost, reason: "must be finite and non-negative" });
        }
        if !f.wage.is_finite() || f.wage <= 0.0 {
            return Err(ConfigError::Wage { value: f.wage, reason: "must be finite and positive" });
        }
        if !f.interest_rate.is_finite() || f.interest_rate <= 0.0 {
            return Err(ConfigError::InterestRate {
                value: f.interest_rate,
                reason: "must be positive so that beta < 1",
            });
        }

        if !s.rho.is_finite() || s.rho.abs() >= 1.0 {
            return Err(ConfigError::Persistence { value: s.rho, reason: "must satisfy |rho| < 1" });
        }
        if !s.mu.is_finite() {
            return Err(ConfigError::ShockMean { value: s.mu, reason: "must be finite" });
        }
        if !s.sigma_eps.is_finite() || s.sigma_eps <= 0.0 {
            return Err(ConfigError::ShockVolatility { value: s.sigma_eps, reason: "must be finite and positive" });
        }
        if !s.num_sigma.is_finite() || s.num_sigma <= 0.0 {
            return Err(ConfigError::NumSigma { value: s.num_sigma, reason: "must be finite and positive" });
        }
        if s.sizez == 0 {
            return Err(ConfigError::ProductivityStates { value: s.sizez });
        }

        if g.dens == 0 {
            return Err(ConfigError::Density { value: g.dens });
        }
        if !g.lb_k.is_finite() || g.lb_k <= 0.0 {
            return Err(ConfigError::LowerBound { value: g.lb_k, reason: "must be finite and positive" });
        }
        match g.upper {
            CapitalCap::Fixed(kbar) => {
                if !kbar.is_finite() || kbar <= g.lb_k {
                    return Err(ConfigError::Bounds { kbar, lb_k: g.lb_k });
                }
            }
            CapitalCap::MultipleOfKstar(multiple) => {
                if !multiple.is_finite() || multiple <= 0.0 {
                    return Err(ConfigError::CapMultiple { value: multiple, reason: "must be finite and positive" });
                }
            }
        }

        c.validate()
    }
}
