//! Transpose-free QMR (Freund), right-preconditioned.
//!
//! Each iteration takes two half steps, both of which update the iterate. Convergence is
//! monitored on the quasi-residual bound `τ·√(m+1)`; the true residual is reported at exit.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, dot, norm2, residual};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, is_breakdown, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct TfqmrSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> TfqmrSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for TfqmrSolver<T> {
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
        let r0_norm = norm2(&r);
        if let Some(reason) = self.conv.check(0, r0_norm) {
            return Ok(self.conv.stats(0, r0_norm, reason));
        }
        let r_tld = r.clone();
        let mut w = r.clone();
        let mut y1 = r.clone();
        let mut y2 = vec![T::zero(); n];
        // yhat = M⁻¹ y, u = A yhat
        let mut y1_hat = vec![T::zero(); n];
        let mut y2_hat = vec![T::zero(); n];
        let mut u1 = vec![T::zero(); n];
        let mut u2 = vec![T::zero(); n];
        pc.apply(&y1, &mut y1_hat)?;
        a.spmv(&y1_hat, &mut u1);
        let mut v = u1.clone();
        let mut d_hat = vec![T::zero(); n];
        let mut theta = T::zero();
        let mut eta = T::zero();
        let mut tau = r0_norm;
        let mut rho = tau * tau;
        let mut k = 0;
        let stop = loop {
            k += 1;
            let sigma = dot(&r_tld, &v);
            if is_breakdown(sigma) {
                break (k - 1, ConvergedReason::DivergedBreakdown);
            }
            let alpha = rho / sigma;
            let mut reason = None;
            for j in 1..=2 {
                if j == 2 {
                    for l in 0..n {
                        y2[l] = y1[l] - alpha * v[l];
                    }
                    pc.apply(&y2, &mut y2_hat)?;
                    a.spmv(&y2_hat, &mut u2);
                }
                let (u, y_hat) = if j == 1 { (&u1, &y1_hat) } else { (&u2, &y2_hat) };
                let m = 2 * k - 2 + j;
                axpy(-alpha, u, &mut w);
                let coef = theta * theta * eta / alpha;
                for l in 0..n {
                    d_hat[l] = y_hat[l] + coef * d_hat[l];
                }
                theta = norm2(&w) / tau;
                let c = T::one() / (T::one() + theta * theta).sqrt();
                tau = tau * theta * c;
                eta = c * c * alpha;
                axpy(eta, &d_hat, x);
                let estimate = tau * T::from_real((m + 1) as f64).sqrt();
                if j == 2 || self.conv.meets_tolerance(estimate) {
                    reason = self.conv.check(k, estimate);
                    if reason.is_some() {
                        break;
                    }
                }
            }
            if let Some(reason) = reason {
                break (k, reason);
            }
            let rho_new = dot(&r_tld, &w);
            if is_breakdown(rho_new) {
                break (k, ConvergedReason::DivergedBreakdown);
            }
            let beta = rho_new / rho;
            rho = rho_new;
            for l in 0..n {
                y1[l] = w[l] + beta * y2[l];
            }
            pc.apply(&y1, &mut y1_hat)?;
            a.spmv(&y1_hat, &mut u1);
            for l in 0..n {
                v[l] = u1[l] + beta * (u2[l] + beta * v[l]);
            }
        };
        let (iterations, reason) = stop;
        residual(a, x, b, &mut r);
        Ok(self.conv.stats(iterations, norm2(&r), reason))
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::{Identity, Jacobi};
    use crate::solver::test_systems::{convection, laplace1d, residual_norm};

    #[test]
    fn tfqmr_solves_nonsymmetric() {
        let a = convection(40);
        let b: Vec<f64> = (0..40).map(|i| ((i % 7) as f64) - 3.0).collect();
        let mut x = vec![0.0; 40];
        let stats = TfqmrSolver::new(1e-10, 200).solve(&a, &Identity, &b, &mut x).unwrap();
        assert!(stats.converged, "{:?}", stats.reason);
        assert!(residual_norm(&a, &x, &b) < 1e-7);
        assert!((stats.final_residual - residual_norm(&a, &x, &b)).abs() < 1e-12);
    }

    #[test]
    fn tfqmr_with_jacobi_on_laplacian() {
        let a = laplace1d(25);
        let b = vec![1.0; 25];
        let mut x = vec![0.0; 25];
        let mut pc = Jacobi::new();
        pc.setup(&a).unwrap();
        let stats = TfqmrSolver::new(1e-10, 200).solve(&a, &pc, &b, &mut x).unwrap();
        assert!(stats.converged, "{:?}", stats.reason);
        assert!(residual_norm(&a, &x, &b) < 1e-6);
    }
}
