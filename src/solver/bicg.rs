//! Biconjugate Gradient. Needs products with both A and Aᵀ, and the preconditioner transpose.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, dot, norm2, residual, xpay};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, is_breakdown, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct BiCgSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> BiCgSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for BiCgSolver<T> {
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
        let mut r_tld = r.clone();
        let mut z = vec![T::zero(); n];
        let mut z_tld = vec![T::zero(); n];
        let mut p = vec![T::zero(); n];
        let mut p_tld = vec![T::zero(); n];
        let mut q = vec![T::zero(); n];
        let mut q_tld = vec![T::zero(); n];
        let mut rho_prev = T::one();
        let mut i = 0;
        loop {
            i += 1;
            pc.apply(&r, &mut z)?;
            pc.apply_transpose(&r_tld, &mut z_tld)?;
            let rho = dot(&z, &r_tld);
            if is_breakdown(rho) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdownBicg));
            }
            if i == 1 {
                p.copy_from_slice(&z);
                p_tld.copy_from_slice(&z_tld);
            } else {
                let beta = rho / rho_prev;
                xpay(&z, beta, &mut p);
                xpay(&z_tld, beta, &mut p_tld);
            }
            a.spmv(&p, &mut q);
            a.spmv_transpose(&p_tld, &mut q_tld);
            let pq = dot(&p_tld, &q);
            if is_breakdown(pq) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdownBicg));
            }
            let alpha = rho / pq;
            axpy(alpha, &p, x);
            axpy(-alpha, &q, &mut r);
            axpy(-alpha, &q_tld, &mut r_tld);
            res_norm = norm2(&r);
            if let Some(reason) = self.conv.check(i, res_norm) {
                return Ok(self.conv.stats(i, res_norm, reason));
            }
            rho_prev = rho;
        }
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::{Identity, Jacobi, Sor};
    use crate::solver::test_systems::{convection, residual_norm};

    #[test]
    fn bicg_with_jacobi() {
        let a = convection(30);
        let b: Vec<f64> = (0..30).map(|i| 1.0 + i as f64 / 30.0).collect();
        let mut x = vec![0.0; 30];
        let mut pc = Jacobi::new();
        pc.setup(&a).unwrap();
        let stats = BiCgSolver::new(1e-10, 200).solve(&a, &pc, &b, &mut x).unwrap();
        assert!(stats.converged, "{:?}", stats.reason);
        assert!(residual_norm(&a, &x, &b) < 1e-8);

        let mut x = vec![0.0; 30];
        let stats = BiCgSolver::new(1e-10, 200).solve(&a, &Identity, &b, &mut x).unwrap();
        assert!(stats.converged);
    }

    #[test]
    fn preconditioner_without_transpose_is_an_error() {
        let a = convection(10);
        let mut pc = Sor::default();
        pc.setup(&a).unwrap();
        let mut x = vec![0.0; 10];
        let err = BiCgSolver::new(1e-10, 50).solve(&a, &pc, &[1.0; 10], &mut x).unwrap_err();
        assert!(matches!(err, KError::Unsupported(_)));
    }
}
