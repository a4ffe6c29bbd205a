//! Conjugate Gradient Squared (Sonneveld), right-preconditioned, following the Templates book.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, dot, norm2, residual};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, is_breakdown, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct CgsSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> CgsSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for CgsSolver<T> {
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
        let r_tld = r.clone();
        let mut u = vec![T::zero(); n];
        let mut p = vec![T::zero(); n];
        let mut q = vec![T::zero(); n];
        let mut p_hat = vec![T::zero(); n];
        let mut v_hat = vec![T::zero(); n];
        let mut u_hat = vec![T::zero(); n];
        let mut q_hat = vec![T::zero(); n];
        let mut uq = vec![T::zero(); n];
        let mut rho_prev = T::one();
        let mut i = 0;
        loop {
            i += 1;
            let rho = dot(&r_tld, &r);
            if is_breakdown(rho) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdown));
            }
            if i == 1 {
                u.copy_from_slice(&r);
                p.copy_from_slice(&u);
            } else {
                let beta = rho / rho_prev;
                for j in 0..n {
                    u[j] = r[j] + beta * q[j];
                    p[j] = u[j] + beta * (q[j] + beta * p[j]);
                }
            }
            pc.apply(&p, &mut p_hat)?;
            a.spmv(&p_hat, &mut v_hat);
            let sigma = dot(&r_tld, &v_hat);
            if is_breakdown(sigma) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdown));
            }
            let alpha = rho / sigma;
            for j in 0..n {
                q[j] = u[j] - alpha * v_hat[j];
                uq[j] = u[j] + q[j];
            }
            pc.apply(&uq, &mut u_hat)?;
            axpy(alpha, &u_hat, x);
            a.spmv(&u_hat, &mut q_hat);
            axpy(-alpha, &q_hat, &mut r);
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
