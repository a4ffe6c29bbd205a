//! Preconditioned Conjugate Gradient per Saad §9.2.
//!
//! Monitors the unpreconditioned residual norm. A non-positive curvature `pᵀAp` stops the
//! iteration with `DivergedIndefiniteMat`, a negative `rᵀM⁻¹r` with `DivergedIndefinitePc`.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, dot, norm2, residual, xpay};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct CgSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> CgSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for CgSolver<T> {
    fn solve(
        &mut self,
        a: &dyn SparseMatrix<T>,
        pc: &dyn Preconditioner<T>,
        b: &[T],
        x: &mut [T],
    ) -> Result<SolveStats<T>, KError> {
        let n = check_dims(a, b, x)?;
        let mut r = vec![T::zero(); n];
        residual(a, x, b, &mut r);
        let mut res_norm = norm2(&r);
        if let Some(reason) = self.conv.check(0, res_norm) {
            return Ok(self.conv.stats(0, res_norm, reason));
        }
        let mut z = vec![T::zero(); n];
        pc.apply(&r, &mut z)?;
        let mut rz = dot(&r, &z);
        if rz < T::zero() {
            return Ok(self.conv.stats(0, res_norm, ConvergedReason::DivergedIndefinitePc));
        }
        if rz == T::zero() {
            return Ok(self.conv.stats(0, res_norm, ConvergedReason::DivergedBreakdown));
        }
        let mut p = z.clone();
        let mut ap = vec![T::zero(); n];
        let mut i = 0;
        loop {
            i += 1;
            a.spmv(&p, &mut ap);
            let pap = dot(&p, &ap);
            if pap <= T::zero() || !pap.is_finite() {
                let reason = if pap.is_finite() {
                    ConvergedReason::DivergedIndefiniteMat
                } else {
                    ConvergedReason::DivergedNanOrInf
                };
                return Ok(self.conv.stats(i - 1, res_norm, reason));
            }
            let alpha = rz / pap;
            axpy(alpha, &p, x);
            axpy(-alpha, &ap, &mut r);
            res_norm = norm2(&r);
            if let Some(reason) = self.conv.check(i, res_norm) {
                return Ok(self.conv.stats(i, res_norm, reason));
            }
            pc.apply(&r, &mut z)?;
            let rz_new = dot(&r, &z);
            if rz_new < T::zero() {
                return Ok(self.conv.stats(i, res_norm, ConvergedReason::DivergedIndefinitePc));
            }
            let beta = rz_new / rz;
            // p = z + beta * p
            xpay(&z, beta, &mut p);
            rz = rz_new;
        }
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::sparse::CsrMatrix;
    use crate::preconditioner::{Identity, Jacobi};
    use crate::solver::test_systems::{laplace1d, residual_norm};

    #[test]
    fn cg_solves_simple_spd() {
        // SPD system: [[4,1],[1,3]] x = [1,2]
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]).unwrap();
        let b = vec![1.0, 2.0];
        let mut x = vec![0.0f64, 0.0];
        let mut solver = CgSolver::new(1e-10, 20);
        let stats = solver.solve(&a, &Identity, &b, &mut x).unwrap();
        let expected = vec![0.09090909090909091f64, 0.6363636363636364];
        let tol = 1e-8;
        for (xi, ei) in x.iter().zip(expected.iter()) {
            assert!((xi - ei).abs() < tol, "xi = {}, expected = {}", xi, ei);
        }
        assert!(stats.converged, "CG did not converge");
        assert!(stats.iterations <= 2);
    }

    #[test]
    fn jacobi_preconditioned_laplacian() {
        let a = laplace1d(50);
        let b = vec![1.0; 50];
        let mut x = vec![0.0; 50];
        let mut pc = Jacobi::new();
        pc.setup(&a).unwrap();
        let mut solver = CgSolver::new(1e-10, 200);
        let stats = solver.solve(&a, &pc, &b, &mut x).unwrap();
        assert!(stats.converged, "{:?}", stats.reason);
        assert!(residual_norm(&a, &x, &b) <= 2e-10 * 50f64.sqrt());
        assert_eq!(solver.convergence().history().len(), stats.iterations + 1);
    }

    #[test]
    fn indefinite_matrix_is_detected() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, -1.0)]).unwrap();
        let mut x = vec![0.0; 2];
        let stats = CgSolver::new(1e-10, 10).solve(&a, &Identity, &[0.0, 1.0], &mut x).unwrap();
        assert_eq!(stats.reason, ConvergedReason::DivergedIndefiniteMat);
    }
}
