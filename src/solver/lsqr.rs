//! LSQR (Paige & Saunders) via Golub-Kahan bidiagonalization.
//!
//! Solves the least-squares problem min ||b - Ax|| and needs products with A and Aᵀ. The
//! preconditioner is not used. The monitored norm is the recurrence estimate `φ̄` of the
//! residual, which equals ||b - Ax|| in exact arithmetic.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, norm2, residual, scale};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, is_breakdown, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct LsqrSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> LsqrSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for LsqrSolver<T> {
    fn solve(
        &mut self,
        a: &dyn SparseMatrix<T>,
        _pc: &dyn Preconditioner<T>,
        b: &[T],
        x: &mut [T],
    ) -> Result<SolveStats<T>, KError> {
        let n = check_dims(a, b, x)?;
        let mut u = vec![T::zero(); n];
        residual(a, x, b, &mut u);
        let mut beta = norm2(&u);
        if let Some(reason) = self.conv.check(0, beta) {
            return Ok(self.conv.stats(0, beta, reason));
        }
        scale(T::one() / beta, &mut u);
        let mut v = vec![T::zero(); n];
        a.spmv_transpose(&u, &mut v);
        let mut alpha = norm2(&v);
        if is_breakdown(alpha) {
            return Ok(self.conv.stats(0, beta, ConvergedReason::DivergedBreakdown));
        }
        scale(T::one() / alpha, &mut v);
        let mut w = v.clone();
        let mut tmp = vec![T::zero(); n];
        let mut phibar = beta;
        let mut rhobar = alpha;
        let mut i = 0;
        loop {
            i += 1;
            // u = A v - alpha u
            a.spmv(&v, &mut tmp);
            for j in 0..n {
                u[j] = tmp[j] - alpha * u[j];
            }
            beta = norm2(&u);
            if beta > T::zero() {
                scale(T::one() / beta, &mut u);
            }
            // v = Aᵀ u - beta v
            a.spmv_transpose(&u, &mut tmp);
            for j in 0..n {
                v[j] = tmp[j] - beta * v[j];
            }
            alpha = norm2(&v);
            if alpha > T::zero() {
                scale(T::one() / alpha, &mut v);
            }

            let rho = (rhobar * rhobar + beta * beta).sqrt();
            if is_breakdown(rho) {
                return Ok(self.conv.stats(i - 1, phibar, ConvergedReason::DivergedBreakdown));
            }
            let c = rhobar / rho;
            let s = beta / rho;
            let theta = s * alpha;
            rhobar = -c * alpha;
            let phi = c * phibar;
            phibar = s * phibar;

            axpy(phi / rho, &w, x);
            let t = theta / rho;
            for j in 0..n {
                w[j] = v[j] - t * w[j];
            }
            if let Some(reason) = self.conv.check(i, phibar) {
                return Ok(self.conv.stats(i, phibar, reason));
            }
        }
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}
