use std::env::args;
use std::process;

use scoped_threadpool::Pool;
use time::precise_time_s;
use tracing::error;

use firm_vfi::logging::init_tracing;
use firm_vfi::policy::{investment_table, nearest_indices};
use firm_vfi::{MarkovChain, MarkovMethod, SolveResult, Solution, Solver, SolverConfig};

const SAMPLES: usize = 5;

/// Worker count from `FIRM_VFI_THREADS`, falling back to the number of CPUs.
fn thread_count() -> u32 {
    std::env::var("FIRM_VFI_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n: &u32| n > 0)
        .unwrap_or_else(|| num_cpus::get() as u32)
}

fn solve(solver: &Solver, pool: Option<&mut Pool>) -> SolveResult<Solution> {
    match pool {
        Some(pool) => solver.solve_with_pool(pool),
        None => solver.solve(),
    }
}

fn report(solution: &Solution, chain: &MarkovChain) -> SolveResult<()> {
    println!(
        "kstar = {}, iterations = {}, sup diff = {:e}, status = {}",
        solution.kstar, solution.iterations, solution.distance, solution.termination
    );
    println!("Share of inactive states = {:.4}\n", solution.inaction_share());

    println!("Stationary productivity distribution:");
    for (z, mass) in solution.z.iter().zip(chain.stationary_distribution().iter()) {
        println!("    z = {:.4}  mass = {:.4}", z, mass);
    }
    println!();

    // Investment rate against productivity at a few capital levels around kstar.
    let levels = [0.5 * solution.kstar, solution.kstar, 1.5 * solution.kstar];
    let rows = investment_table(solution, &nearest_indices(&solution.kvec, &levels))?;
    for row in rows {
        println!("k = {:.4} (index {})", row.capital, row.k_index);
        for (z, rate) in row.rates {
            println!("    z = {:.4}  I/k = {:.4}", z, rate);
        }
    }
    Ok(())
}

fn run() -> SolveResult<()> {
    let sample = args().any(|arg| arg == "--sample");
    let serial = args().any(|arg| arg == "--serial");

    let mut config = SolverConfig::default();
    if args().any(|arg| arg == "--tauchen") {
        config.shocks.method = MarkovMethod::Tauchen;
    }

    let solver = Solver::new(&config)?;
    let ref mut pool = Pool::new(thread_count());

    if sample {
        let mut samples = Vec::with_capacity(SAMPLES);
        for i in 0..SAMPLES {
            let cpu0 = precise_time_s();
            let solution = solve(&solver, if serial { None } else { Some(&mut *pool) })?;
            let cpu1 = precise_time_s();

            let diff = cpu1 - cpu0;
            println!("Sample #{}, Time: {}s, iterations: {}", i + 1, diff, solution.iterations);
            samples.push(diff);
        }

        samples.sort_by(|a, b| a.total_cmp(b));
        println!("\nMedian time is = {}", samples[SAMPLES / 2]);
    } else {
        let cpu0 = precise_time_s();
        let solution = solve(&solver, if serial { None } else { Some(&mut *pool) })?;
        let cpu1 = precise_time_s();

        report(&solution, &MarkovChain::from_params(&config.shocks)?)?;
        println!("\nElapsed time is = {}", cpu1 - cpu0);
        solution.into_converged()?;
    }
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        error!("{err}");
        process::exit(1);
    }
}
