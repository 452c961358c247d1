//! Value function iteration driver.
//!
//! Starts from `V = 0` and applies the Bellman operator until the sup-norm
//! distance between successive iterates drops below the tolerance, or the
//! iteration ceiling is hit. Each iterate is written to a fresh buffer before
//! it replaces `V`.

use ndarray::{Array1, Array2};
use scoped_threadpool::Pool;
use tracing::{debug, info, warn};

use crate::bellman::{depreciated_index, sup_distance, BellmanOperator, BellmanStep};
use crate::config::{ConvergenceParams, SolverConfig};
use crate::error::{SolveError, SolveResult};
use crate::policy::{self, PolicyFunctions};
use crate::state_space::StateSpace;

pub const INACTIVE: u8 = 0;
pub const ACTIVE: u8 = 1;

/// How the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    MaxIterExceeded,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Converged => write!(f, "converged"),
            Termination::MaxIterExceeded => write!(f, "max iterations exceeded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub termination: Termination,
    /// Number of Bellman steps taken.
    pub iterations: usize,
    /// Sup-norm distance of the last step.
    pub distance: f64,
    /// Distance after every step, in order.
    pub distances: Vec<f64>,
    pub value: Array2<f64>,
    /// `ACTIVE` or `INACTIVE` per `(z, k)`.
    pub pf_discrete: Array2<u8>,
    /// Index into `kvec` of next period's capital.
    pub pf_continuous: Array2<usize>,
    pub kvec: Array1<f64>,
    pub z: Array1<f64>,
    pub kstar: f64,
    pub delta: f64,
    pub dens: usize,
}

impl Solution {
    pub fn is_converged(&self) -> bool {
        self.termination == Termination::Converged
    }

    /// Treat running out of iterations as an error.
    pub fn into_converged(self) -> SolveResult<Solution> {
        match self.termination {
            Termination::Converged => Ok(self),
            Termination::MaxIterExceeded => {
                Err(SolveError::NotConverged { iterations: self.iterations, distance: self.distance })
            }
        }
    }

    /// Fraction of states where the firm lets capital depreciate.
    pub fn inaction_share(&self) -> f64 {
        let inactive = self.pf_discrete.iter().filter(|&&d| d == INACTIVE).count();
        inactive as f64 / self.pf_discrete.len() as f64
    }

    pub fn policies(&self) -> SolveResult<PolicyFunctions> {
        policy::extract(&self.pf_continuous, &self.kvec, self.delta)
    }

    /// `optI / k`
    pub fn investment_rates(&self) -> SolveResult<Array2<f64>> {
        Ok(self.policies()?.investment_rates(&self.kvec))
    }
}

pub struct Solver {
    space: StateSpace,
    convergence: ConvergenceParams,
}

impl Solver {
    pub fn new(config: &SolverConfig) -> SolveResult<Solver> {
        let space = StateSpace::build(config)?;
        Ok(Solver { space, convergence: config.convergence })
    }

    /// Wrap a prebuilt state space. The convergence settings get the same
    /// checks as in [`SolverConfig::validate`].
    pub fn from_space(space: StateSpace, convergence: ConvergenceParams) -> SolveResult<Solver> {
        convergence.validate()?;
        Ok(Solver { space, convergence })
    }

    pub fn space(&self) -> &StateSpace {
        &self.space
    }

    pub fn solve(&self) -> SolveResult<Solution> {
        self.solve_from(self.zero_value(), None)
    }

    pub fn solve_with_pool(&self, pool: &mut Pool) -> SolveResult<Solution> {
        self.solve_from(self.zero_value(), Some(pool))
    }

    pub fn zero_value(&self) -> Array2<f64> {
        Array2::zeros((self.space.sizez(), self.space.sizek()))
    }

    /// Iterate from an arbitrary starting value function.
    pub fn solve_from(&self, v0: Array2<f64>, mut pool: Option<&mut Pool>) -> SolveResult<Solution> {
        let operator = BellmanOperator::new(&self.space);
        let ConvergenceParams { tolerance, max_iterations } = self.convergence;

        let mut value = v0;
        let mut distances = Vec::new();
        let mut iteration = 1;

        let (step, termination) = loop {
            let step = match pool {
                Some(ref mut pool) => operator.apply_with_pool(&value, pool)?,
                None => operator.apply(&value)?,
            };
            let next = step.next_value();
            // NaN loses every comparison in the max, so look at the expectation too.
            let bad = step.ev.indexed_iter().chain(next.indexed_iter()).find(|(_, v)| !v.is_finite());
            if let Some(((z, k), _)) = bad {
                return Err(SolveError::NonFiniteValue { iteration, z, k });
            }

            let distance = sup_distance(&next, &value);
            value = next;
            distances.push(distance);

            let finished = distance < tolerance;
            if iteration % 10 == 0 || iteration == 1 || finished {
                debug!(iteration, distance, "Sup Diff");
            }
            if finished {
                break (step, Termination::Converged);
            }
            if iteration >= max_iterations {
                break (step, Termination::MaxIterExceeded);
            }
            iteration += 1;
        };

        let distance = distances.last().copied().unwrap_or(f64::INFINITY);
        match termination {
            Termination::Converged => info!(iterations = iteration, distance, "value function converged"),
            Termination::MaxIterExceeded => {
                warn!(iterations = iteration, distance, tolerance, "value function did not converge")
            }
        }

        let (pf_discrete, pf_continuous) = discrete_choice(&step, self.space.dens);
        Ok(Solution {
            termination,
            iterations: iteration,
            distance,
            distances,
            value,
            pf_discrete,
            pf_continuous,
            kvec: self.space.kvec.clone(),
            z: self.space.z.clone(),
            kstar: self.space.kstar,
            delta: self.space.firm.delta,
            dens: self.space.dens,
        })
    }
}

/// Resolve the adjust / wait choice. Inaction wins ties and follows the
/// depreciation path; action takes the stored argmax.
pub fn discrete_choice(step: &BellmanStep, dens: usize) -> (Array2<u8>, Array2<usize>) {
    let shape = step.v_active.dim();
    let mut pf_discrete = Array2::zeros(shape);
    let mut pf_continuous = Array2::zeros(shape);
    for ((iz, ik), discrete) in pf_discrete.indexed_iter_mut() {
        if step.is_inactive(iz, ik) {
            *discrete = INACTIVE;
            pf_continuous[[iz, ik]] = depreciated_index(ik, dens);
        } else {
            *discrete = ACTIVE;
            pf_continuous[[iz, ik]] = step.argmax[[iz, ik]];
        }
    }
    (pf_discrete, pf_continuous)
}
