//! Krylov solver interfaces.
//!
//! Every method works against `&dyn SparseMatrix<T>` and `&dyn Preconditioner<T>`, starts from
//! the iterate passed in `x`, and reports through [`SolveStats`]. Breakdowns are reported as a
//! [`ConvergedReason`](crate::utils::convergence::ConvergedReason) in the stats, not as errors;
//! errors are reserved for malformed input and failing preconditioner applications.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{norm2, residual};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::utils::convergence::{Convergence, SolveStats};

/// Common interface for the iterative solvers.
pub trait LinearSolver<T> {
    /// Solve A·x = b, writing result into `x` (which holds the initial guess on entry).
    fn solve(
        &mut self,
        a: &dyn SparseMatrix<T>,
        pc: &dyn Preconditioner<T>,
        b: &[T],
        x: &mut [T],
    ) -> Result<SolveStats<T>, KError>;

    /// Stopping criteria and the residual history of the last solve.
    fn convergence(&self) -> &Convergence<T>;
}

/// Check that `a` is square and matches `b` and `x`; returns n.
pub(crate) fn check_dims<T>(a: &dyn SparseMatrix<T>, b: &[T], x: &[T]) -> Result<usize, KError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(KError::DimensionMismatch { what: "operator columns", expected: n, found: a.ncols() });
    }
    if b.len() != n {
        return Err(KError::DimensionMismatch { what: "right-hand side", expected: n, found: b.len() });
    }
    if x.len() != n {
        return Err(KError::DimensionMismatch { what: "solution", expected: n, found: x.len() });
    }
    Ok(n)
}

/// `||b - A x||_2`, recomputed from the iterate.
pub(crate) fn true_residual_norm<T: EngineScalar>(a: &dyn SparseMatrix<T>, b: &[T], x: &[T]) -> T {
    let mut r = vec![T::zero(); b.len()];
    residual(a, x, b, &mut r);
    norm2(&r)
}

/// Exactly zero or not a number: the scalar cannot be divided by.
pub(crate) fn is_breakdown<T: EngineScalar>(v: T) -> bool {
    v == T::zero() || !v.is_finite()
}

pub mod bicg;
pub use bicg::BiCgSolver;

pub mod bicgstab;
pub use bicgstab::BiCgStabSolver;

pub mod cg;
pub use cg::CgSolver;

pub mod cgs;
pub use cgs::CgsSolver;

pub mod chebyshev;
pub use chebyshev::ChebyshevSolver;

pub mod cr;
pub use cr::CrSolver;

pub mod gmres;
pub use gmres::GmresSolver;

pub mod lsqr;
pub use lsqr::LsqrSolver;

pub mod minres;
pub use minres::MinresSolver;

pub mod preonly;
pub use preonly::PreonlySolver;

pub mod qmr;
pub use qmr::TcqmrSolver;

pub mod richardson;
pub use richardson::RichardsonSolver;

pub mod tfqmr;
pub use tfqmr::TfqmrSolver;

#[cfg(test)]
pub(crate) mod test_systems {
    use crate::matrix::sparse::CsrMatrix;

    /// 1-D Laplacian, SPD.
    pub fn laplace1d(n: usize) -> CsrMatrix<f64> {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 2.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_triplets(n, n, &t).unwrap()
    }

    /// Convection-diffusion stencil, nonsymmetric and diagonally dominant.
    pub fn convection(n: usize) -> CsrMatrix<f64> {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 4.0));
            if i > 0 {
                t.push((i, i - 1, -1.5));
            }
            if i + 1 < n {
                t.push((i, i + 1, -0.5));
            }
        }
        CsrMatrix::from_triplets(n, n, &t).unwrap()
    }

    pub fn residual_norm(a: &CsrMatrix<f64>, x: &[f64], b: &[f64]) -> f64 {
        let mut r = vec![0.0; b.len()];
        crate::core::vector_ops::residual(a, x, b, &mut r);
        crate::core::vector_ops::norm2(&r)
    }
}
