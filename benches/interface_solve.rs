use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use krylink::engine::Engine;
use krylink::interface::{KrylovInterface, LinearSolverInterface, PreconditionerType, SolverType};
use krylink::matrix::sparse::CsrMatrix;
use krylink::parallel::SerialComm;

fn laplace2d(m: usize) -> CsrMatrix<f64> {
    let n = m * m;
    let mut t = Vec::with_capacity(5 * n);
    for i in 0..m {
        for j in 0..m {
            let row = i * m + j;
            t.push((row, row, 4.0));
            if i > 0 {
                t.push((row, row - m, -1.0));
            }
            if i + 1 < m {
                t.push((row, row + m, -1.0));
            }
            if j > 0 {
                t.push((row, row - 1, -1.0));
            }
            if j + 1 < m {
                t.push((row, row + 1, -1.0));
            }
        }
    }
    CsrMatrix::from_triplets(n, n, &t).unwrap()
}

fn bench_methods(c: &mut Criterion) {
    let a = laplace2d(32);
    let n = a.nrows();
    let b: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();
    let engine = Engine::new();

    let mut group = c.benchmark_group("laplace2d_32");
    for (st, pt) in [
        (SolverType::Cg, PreconditionerType::Jacobi),
        (SolverType::Cg, PreconditionerType::Icc),
        (SolverType::Gmres, PreconditionerType::Ilu),
        (SolverType::Bicgstab, PreconditionerType::Ilu),
        (SolverType::Minres, PreconditionerType::Jacobi),
    ] {
        let mut solver = KrylovInterface::<f64>::new(&engine, &SerialComm);
        solver.set_solver_type(st);
        solver.set_preconditioner_type(pt);
        let id = BenchmarkId::new(format!("{st:?}"), format!("{pt:?}"));
        group.bench_function(id, |ben| {
            ben.iter(|| {
                let mut x = vec![0.0; n];
                let stats = solver.solve(black_box(&a), &mut x, black_box(&b), 1e-8, 2000).unwrap();
                black_box(stats.iterations)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_methods);
criterion_main!(benches);
