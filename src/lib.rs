//! Value function iteration for a firm's investment problem with a fixed
//! adjustment cost.
//!
//! Each period the firm either lets capital depreciate (inactive) or pays
//! `F * k` to pick any next-period capital on the grid (active). Productivity
//! follows a discretized AR(1) in logs.
//!
//! ```no_run
//! use firm_vfi::{SolverConfig, Solver};
//!
//! let solver = Solver::new(&SolverConfig::default())?;
//! let solution = solver.solve()?.into_converged()?;
//! let rates = solution.investment_rates()?;
//! # Ok::<(), firm_vfi::SolveError>(())
//! ```

pub mod bellman;
pub mod config;
pub mod error;
pub mod logging;
pub mod markov;
pub mod policy;
pub mod state_space;
pub mod vfi;

pub use config::{CapitalCap, ConvergenceParams, FirmParams, GridParams, MarkovMethod, ShockParams, SolverConfig};
pub use error::{ConfigError, SolveError, SolveResult};
pub use markov::MarkovChain;
pub use policy::PolicyFunctions;
pub use state_space::StateSpace;
pub use vfi::{Solution, Solver, Termination};
