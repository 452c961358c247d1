//! One application of the Bellman operator.
//!
//! Given the current value function `V[z, k]` it produces the expected
//! continuation value, the value of the best active choice together with its
//! argmax, and the value of staying inactive. `V` is only read, so rows can
//! be split across a thread pool.

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use scoped_threadpool::Pool;

use crate::error::{SolveError, SolveResult};
use crate::state_space::StateSpace;

/// Grid index reached from `k` after one period of pure depreciation,
/// clamped at the bottom of the grid.
#[inline]
pub fn depreciated_index(k: usize, dens: usize) -> usize {
    k.saturating_sub(dens)
}

/// `EV_inactive[z, j] = EV[z, depreciated_index(j, dens)]`.
pub fn inactive_continuation(ev: &Array2<f64>, dens: usize) -> Array2<f64> {
    let (nz, nk) = ev.dim();
    Array2::from_shape_fn((nz, nk), |(iz, ik)| ev[[iz, depreciated_index(ik, dens)]])
}

/// Output of one Bellman step.
#[derive(Debug, Clone, PartialEq)]
pub struct BellmanStep {
    /// `EV[z, k'] = sum_z' Pi[z, z'] V[z', k']`
    pub ev: Array2<f64>,
    pub ev_inactive: Array2<f64>,
    pub v_active: Array2<f64>,
    /// Index of the best `k'` under the active branch. First maximum wins.
    pub argmax: Array2<usize>,
    pub v_inactive: Array2<f64>,
}

impl BellmanStep {
    /// `max(V_active, V_inactive)`, written to a fresh buffer.
    pub fn next_value(&self) -> Array2<f64> {
        let mut next = self.v_active.clone();
        Zip::from(&mut next).and(&self.v_inactive).for_each(|a, &i| {
            if i >= *a {
                *a = i;
            }
        });
        next
    }

    /// True where the inactive branch is at least as good. Ties go to inaction.
    pub fn is_inactive(&self, iz: usize, ik: usize) -> bool {
        self.v_inactive[[iz, ik]] >= self.v_active[[iz, ik]]
    }
}

pub struct BellmanOperator<'a> {
    space: &'a StateSpace,
}

impl<'a> BellmanOperator<'a> {
    pub fn new(space: &'a StateSpace) -> Self {
        BellmanOperator { space }
    }

    fn check_shape(&self, v: &Array2<f64>) -> SolveResult<()> {
        let expected = (self.space.sizez(), self.space.sizek());
        if v.dim() != expected {
            return Err(SolveError::ShapeMismatch {
                expected: vec![expected.0, expected.1],
                found: v.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// `Pi . V`
    pub fn expectation(&self, v: &Array2<f64>) -> SolveResult<Array2<f64>> {
        self.check_shape(v)?;
        let mut ev = Array2::zeros(v.dim());
        for (pi_row, ev_row) in self.space.pi.axis_iter(Axis(0)).zip(ev.axis_iter_mut(Axis(0))) {
            expect_row(pi_row, v.view(), ev_row);
        }
        Ok(ev)
    }

    /// `Vmat[z, k, k'] = e_active[z, k, k'] + beta * EV[z, k']`.
    pub fn candidate_values(&self, ev: &Array2<f64>) -> SolveResult<Array3<f64>> {
        self.check_shape(ev)?;
        let beta = self.space.beta;
        let e_active = &self.space.e_active;
        Ok(Array3::from_shape_fn(e_active.dim(), |(iz, ik, ikp)| {
            e_active[[iz, ik, ikp]] + beta * ev[[iz, ikp]]
        }))
    }

    pub fn apply(&self, v: &Array2<f64>) -> SolveResult<BellmanStep> {
        self.check_shape(v)?;
        let mut step = self.empty_step();
        let space = self.space;

        for (pi_row, ev_row) in space.pi.axis_iter(Axis(0)).zip(step.ev.axis_iter_mut(Axis(0))) {
            expect_row(pi_row, v.view(), ev_row);
        }

        for iz in 0..space.sizez() {
            let out = RowOut {
                ev_inactive: step.ev_inactive.row_mut(iz),
                v_active: step.v_active.row_mut(iz),
                argmax: step.argmax.row_mut(iz),
                v_inactive: step.v_inactive.row_mut(iz),
            };
            maximize_row(space, iz, step.ev.row(iz), out);
        }
        Ok(step)
    }

    /// Same result as [`BellmanOperator::apply`], rows spread over `pool`.
    pub fn apply_with_pool(&self, v: &Array2<f64>, pool: &mut Pool) -> SolveResult<BellmanStep> {
        self.check_shape(v)?;
        let mut step = self.empty_step();
        let space = self.space;

        pool.scoped(|scoped| {
            for (pi_row, ev_row) in space.pi.axis_iter(Axis(0)).zip(step.ev.axis_iter_mut(Axis(0))) {
                // Only capture refs
                let v = v.view();
                scoped.execute(move || expect_row(pi_row, v, ev_row));
            }
        });

        let BellmanStep { ev, ev_inactive, v_active, argmax, v_inactive } = &mut step;
        pool.scoped(|scoped| {
            let rows = ev_inactive
                .axis_iter_mut(Axis(0))
                .zip(v_active.axis_iter_mut(Axis(0)))
                .zip(argmax.axis_iter_mut(Axis(0)))
                .zip(v_inactive.axis_iter_mut(Axis(0)))
                .enumerate();
            for (iz, (((ev_inactive, v_active), argmax), v_inactive)) in rows {
                let ev_row = ev.row(iz);
                let out = RowOut { ev_inactive, v_active, argmax, v_inactive };
                scoped.execute(move || maximize_row(space, iz, ev_row, out));
            }
        });
        Ok(step)
    }

    fn empty_step(&self) -> BellmanStep {
        let shape = (self.space.sizez(), self.space.sizek());
        BellmanStep {
            ev: Array2::zeros(shape),
            ev_inactive: Array2::zeros(shape),
            v_active: Array2::zeros(shape),
            argmax: Array2::zeros(shape),
            v_inactive: Array2::zeros(shape),
        }
    }
}

struct RowOut<'r> {
    ev_inactive: ArrayViewMut1<'r, f64>,
    v_active: ArrayViewMut1<'r, f64>,
    argmax: ArrayViewMut1<'r, usize>,
    v_inactive: ArrayViewMut1<'r, f64>,
}

fn expect_row(pi_row: ArrayView1<f64>, v: ArrayView2<f64>, mut ev_row: ArrayViewMut1<f64>) {
    for (ik, ev) in ev_row.iter_mut().enumerate() {
        *ev = pi_row
            .iter()
            .zip(v.column(ik).iter())
            .fold(0.0_f64, |acc, (transition, value)| acc + transition * value);
    }
}

fn maximize_row(space: &StateSpace, iz: usize, ev: ArrayView1<f64>, mut out: RowOut) {
    let beta = space.beta;
    let payoffs = space.e_active.index_axis(Axis(0), iz);

    for ik in 0..space.sizek() {
        let mut value_high = f64::NEG_INFINITY;
        let mut choice = 0;
        for (ikp, (payoff, continuation)) in payoffs.row(ik).iter().zip(ev.iter()).enumerate() {
            let value_provisional = payoff + beta * continuation;
            if value_provisional > value_high {
                value_high = value_provisional;
                choice = ikp;
            }
        }
        out.v_active[ik] = value_high;
        out.argmax[ik] = choice;

        let continuation = ev[depreciated_index(ik, space.dens)];
        out.ev_inactive[ik] = continuation;
        out.v_inactive[ik] = space.e_inactive[[iz, ik]] + beta * continuation;
    }
}

/// Sup-norm distance between two value functions.
pub fn sup_distance(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    Zip::from(a).and(b).fold(0.0_f64, |acc, x, y| acc.max((x - y).abs()))
}

/// Row-wise argmax of `Vmat` over `k'`, for callers that materialize it.
pub fn argmax_last_axis(vmat: &Array3<f64>) -> (Array2<f64>, Array2<usize>) {
    let (nz, nk, _) = vmat.dim();
    let mut values = Array2::from_elem((nz, nk), f64::NEG_INFINITY);
    let mut index = Array2::zeros((nz, nk));
    for ((iz, ik, ikp), &x) in vmat.indexed_iter() {
        if x > values[[iz, ik]] {
            values[[iz, ik]] = x;
            index[[iz, ik]] = ikp;
        }
    }
    (values, index)
}
