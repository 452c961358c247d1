//! Policy functions in levels.
//!
//! Maps the grid-index policy to next-period capital and net investment, and
//! lays out investment rates against productivity at fixed capital levels.

use ndarray::{Array1, Array2};

use crate::error::{SolveError, SolveResult};
use crate::vfi::Solution;

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyFunctions {
    /// `optK[z, k] = kvec[PF_continuous[z, k]]`
    pub opt_k: Array2<f64>,
    /// `optI[z, k] = optK[z, k] - (1 - delta) kvec[k]`
    pub opt_i: Array2<f64>,
}

impl PolicyFunctions {
    /// `optI[z, k] / kvec[k]`
    pub fn investment_rates(&self, kvec: &Array1<f64>) -> Array2<f64> {
        Array2::from_shape_fn(self.opt_i.dim(), |(iz, ik)| self.opt_i[[iz, ik]] / kvec[ik])
    }
}

pub fn extract(pf_continuous: &Array2<usize>, kvec: &Array1<f64>, delta: f64) -> SolveResult<PolicyFunctions> {
    let (nz, nk) = pf_continuous.dim();
    if nk != kvec.len() {
        return Err(SolveError::ShapeMismatch { expected: vec![nz, kvec.len()], found: vec![nz, nk] });
    }
    if let Some(&index) = pf_continuous.iter().find(|&&i| i >= kvec.len()) {
        return Err(SolveError::IndexOutOfRange { index, len: kvec.len() });
    }

    let opt_k = pf_continuous.mapv(|i| kvec[i]);
    let opt_i = Array2::from_shape_fn((nz, nk), |(iz, ik)| opt_k[[iz, ik]] - (1.0 - delta) * kvec[ik]);
    Ok(PolicyFunctions { opt_k, opt_i })
}

/// Investment rate across productivity states at one capital level.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentRow {
    pub k_index: usize,
    pub capital: f64,
    /// `(z, I / k)` in increasing `z`.
    pub rates: Vec<(f64, f64)>,
}

pub fn investment_table(solution: &Solution, capital_indices: &[usize]) -> SolveResult<Vec<InvestmentRow>> {
    let rates = solution.investment_rates()?;
    capital_indices
        .iter()
        .map(|&ik| {
            if ik >= solution.kvec.len() {
                return Err(SolveError::IndexOutOfRange { index: ik, len: solution.kvec.len() });
            }
            Ok(InvestmentRow {
                k_index: ik,
                capital: solution.kvec[ik],
                rates: solution.z.iter().zip(rates.column(ik).iter()).map(|(&z, &r)| (z, r)).collect(),
            })
        })
        .collect()
}

/// Grid indices nearest to each requested capital level.
pub fn nearest_indices(kvec: &Array1<f64>, levels: &[f64]) -> Vec<usize> {
    levels
        .iter()
        .map(|&level| {
            kvec.iter()
                .enumerate()
                .fold((0, f64::INFINITY), |(best, gap), (i, &k)| {
                    let g = (k - level).abs();
                    if g < gap {
                        (i, g)
                    } else {
                        (best, gap)
                    }
                })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn maps_indices_to_levels_and_investment() {
        let kvec = array![1.0, 2.0, 4.0];
        let pf = array![[2, 0, 1]];
        let out = extract(&pf, &kvec, 0.5).unwrap();
        assert_eq!(out.opt_k, array![[4.0, 1.0, 2.0]]);
        assert_relative_eq!(out.opt_i[[0, 0]], 4.0 - 0.5);
        assert_relative_eq!(out.opt_i[[0, 1]], 1.0 - 1.0);
        assert_relative_eq!(out.opt_i[[0, 2]], 2.0 - 2.0);
        let rates = out.investment_rates(&kvec);
        assert_relative_eq!(rates[[0, 0]], 3.5);
    }

    #[test]
    fn depreciation_path_has_zero_investment() {
        let delta: f64 = 0.2;
        let ratio = (1.0 - delta).sqrt();
        let kvec = Array1::from_shape_fn(6, |i| 10.0 * ratio.powi(5 - i as i32));
        let pf = Array2::from_shape_fn((1, 6), |(_, ik)| ik.saturating_sub(2));
        let out = extract(&pf, &kvec, delta).unwrap();
        for ik in 2..6 {
            assert_relative_eq!(out.opt_i[[0, ik]], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let kvec = array![1.0, 2.0];
        let pf = array![[0, 2]];
        assert_eq!(extract(&pf, &kvec, 0.1), Err(SolveError::IndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn nearest_indices_pick_closest_grid_points() {
        let kvec = array![0.5, 1.0, 2.0, 4.0];
        assert_eq!(nearest_indices(&kvec, &[0.1, 1.4, 1.6, 100.0]), vec![0, 1, 2, 3]);
    }
}
