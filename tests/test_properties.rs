//! Property-based tests for the discretization and grid helpers.

use proptest::prelude::*;

use firm_vfi::bellman::{depreciated_index, inactive_continuation};
use firm_vfi::markov::{rouwenhorst, tauchen};
use firm_vfi::state_space::capital_grid;
use ndarray::Array2;

proptest! {
    // 1. Rouwenhorst rows are probability distributions
    #[test]
    fn rouwenhorst_row_stochastic(rho in -0.99..0.99f64, step in 0.01..1.0f64, sizez in 1..15usize) {
        let chain = rouwenhorst(rho, 0.0, step, sizez).unwrap();
        prop_assert_eq!(chain.transitions.dim(), (sizez, sizez));
        prop_assert!(chain.row_sum_error() < 1e-9, "row sum error {}", chain.row_sum_error());
        prop_assert!(chain.transitions.iter().all(|&x| x >= 0.0));
    }

    // 2. Tauchen rows are probability distributions
    #[test]
    fn tauchen_row_stochastic(
        rho in -0.99..0.99f64, sigma in 0.01..1.0f64, num_sigma in 1.0..4.0f64, sizez in 1..15usize,
    ) {
        let chain = tauchen(rho, 0.0, sigma, num_sigma, sizez).unwrap();
        prop_assert!(chain.row_sum_error() < 1e-9, "row sum error {}", chain.row_sum_error());
        prop_assert!(chain.transitions.iter().all(|&x| x >= 0.0));
    }

    // 3. Log-productivity states are increasing
    #[test]
    fn states_increasing(rho in -0.9..0.9f64, step in 0.01..1.0f64, sizez in 2..15usize) {
        let chain = rouwenhorst(rho, 0.2, step, sizez).unwrap();
        prop_assert!(chain.log_states.windows(2).into_iter().all(|w| w[1] > w[0]));
    }

    // 4. Capital grid is strictly increasing, positive and ends at kbar
    #[test]
    fn capital_grid_strictly_increasing(
        kbar in 1.0..50.0f64, lb_k in 1e-3..0.5f64, delta in 0.02..0.5f64, dens in 1..6usize,
    ) {
        let kvec = capital_grid(kbar, lb_k, delta, dens);
        prop_assert_eq!(kvec.len() % dens, 0);
        prop_assert!(kvec[0] > 0.0);
        prop_assert!(kvec.windows(2).into_iter().all(|w| w[1] > w[0]));
        prop_assert!((kvec[kvec.len() - 1] - kbar).abs() < 1e-9 * kbar);
        // Within one depreciation step of the lower bound
        prop_assert!(kvec[0] * (1.0 - delta) <= lb_k * (1.0 + 1e-9));
    }

    // 5. Depreciation shift stays on the grid
    #[test]
    fn depreciated_index_in_range(k in 0..10_000usize, dens in 1..20usize) {
        let j = depreciated_index(k, dens);
        prop_assert!(j <= k);
        if k >= dens {
            prop_assert_eq!(j, k - dens);
        } else {
            prop_assert_eq!(j, 0);
        }
    }

    // 6. Shifted continuation values come from the same row
    #[test]
    fn inactive_continuation_reads_own_row(nz in 1..5usize, nk in 1..40usize, dens in 1..8usize) {
        let ev = Array2::from_shape_fn((nz, nk), |(iz, ik)| (1000 * iz + ik) as f64);
        let shifted = inactive_continuation(&ev, dens);
        for iz in 0..nz {
            for ik in 0..nk {
                prop_assert_eq!(shifted[[iz, ik]], ev[[iz, depreciated_index(ik, dens)]]);
            }
        }
    }
}
