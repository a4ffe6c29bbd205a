//! Solve -u'' = 1 on (0, 1) with homogeneous Dirichlet ends through the generic solver interface.
//!
//! Runtime options are read from `KRYLINK_OPTIONS`, for instance
//! `KRYLINK_OPTIONS="-ksp_type cg -pc_type jacobi" cargo run --example poisson_1d`.

use krylink::config::options::OptionsDatabase;
use krylink::engine::Engine;
use krylink::error::KError;
use krylink::interface::{KrylovInterface, LinearSolverInterface};
use krylink::matrix::sparse::CsrMatrix;
use krylink::parallel::UniverseComm;

fn main() -> Result<(), KError> {
    let n = 100;
    let h = 1.0 / (n + 1) as f64;
    let mut t = Vec::new();
    for i in 0..n {
        t.push((i, i, 2.0 / (h * h)));
        if i > 0 {
            t.push((i, i - 1, -1.0 / (h * h)));
        }
        if i + 1 < n {
            t.push((i, i + 1, -1.0 / (h * h)));
        }
    }
    let a = CsrMatrix::from_triplets(n, n, &t)?;
    let b = vec![1.0; n];
    let mut u = vec![0.0; n];

    let engine = Engine::new();
    let comm = UniverseComm::default();
    let mut solver = KrylovInterface::<f64>::new(&engine, &comm);
    let options = OptionsDatabase::from_env()?;
    if !options.is_empty() {
        solver.set_options(options);
    }
    let stats = solver.solve(&a, &mut u, &b, 1e-10, 1000)?;
    println!(
        "{:?} + {:?}: {} after {} iterations, residual norm {:.3e}",
        solver.solver_type(),
        solver.preconditioner_type(),
        stats.reason,
        stats.iterations,
        stats.final_residual
    );

    // exact solution u(x) = x(1 - x) / 2
    let err = u
        .iter()
        .enumerate()
        .map(|(i, ui)| {
            let x = (i + 1) as f64 * h;
            (ui - x * (1.0 - x) / 2.0).abs()
        })
        .fold(0.0, f64::max);
    println!("max nodal error {err:.3e}");
    Ok(())
}
