//! BiCGStab solver (Saad §7.1), right-preconditioned.
//!
//! The half-step residual `s` is tested before the stabilizing step; when it already meets the
//! tolerance the iterate is finished with the half update.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, dot, norm2, residual};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, is_breakdown, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct BiCgStabSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> BiCgStabSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for BiCgStabSolver<T> {
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
        // shadow residual
        let r_hat = r.clone();
        let mut p = vec![T::zero(); n];
        let mut v = vec![T::zero(); n];
        let mut s = vec![T::zero(); n];
        let mut t = vec![T::zero(); n];
        let mut p_hat = vec![T::zero(); n];
        let mut s_hat = vec![T::zero(); n];
        let mut rho_prev = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();
        let mut i = 0;
        loop {
            i += 1;
            let rho = dot(&r_hat, &r);
            if is_breakdown(rho) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdown));
            }
            if i == 1 {
                p.copy_from_slice(&r);
            } else {
                let beta = (rho / rho_prev) * (alpha / omega);
                for j in 0..n {
                    p[j] = r[j] + beta * (p[j] - omega * v[j]);
                }
            }
            pc.apply(&p, &mut p_hat)?;
            a.spmv(&p_hat, &mut v);
            let rv = dot(&r_hat, &v);
            if is_breakdown(rv) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdown));
            }
            alpha = rho / rv;
            for j in 0..n {
                s[j] = r[j] - alpha * v[j];
            }
            let s_norm = norm2(&s);
            if self.conv.meets_tolerance(s_norm) {
                axpy(alpha, &p_hat, x);
                r.copy_from_slice(&s);
                res_norm = s_norm;
                let reason = self.conv.check(i, res_norm).unwrap_or(ConvergedReason::ConvergedRtol);
                return Ok(self.conv.stats(i, res_norm, reason));
            }
            pc.apply(&s, &mut s_hat)?;
            a.spmv(&s_hat, &mut t);
            let tt = dot(&t, &t);
            if is_breakdown(tt) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdown));
            }
            omega = dot(&t, &s) / tt;
            for j in 0..n {
                x[j] += alpha * p_hat[j] + omega * s_hat[j];
                r[j] = s[j] - omega * t[j];
            }
            res_norm = norm2(&r);
            if let Some(reason) = self.conv.check(i, res_norm) {
                return Ok(self.conv.stats(i, res_norm, reason));
            }
            if is_breakdown(omega) {
                return Ok(self.conv.stats(i, res_norm, ConvergedReason::DivergedBreakdown));
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
    use crate::matrix::sparse::CsrMatrix;
    use crate::preconditioner::{Identity, Ilu0, Jacobi};
    use crate::solver::test_systems::{convection, residual_norm};

    #[test]
    fn bicgstab_solves_nonsymmetric_2x2() {
        // [[4,1],[2,3]] x = [1,2]
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 2.0), (1, 1, 3.0)]).unwrap();
        let b = vec![1.0, 2.0];
        let mut x = vec![0.0f64, 0.0];
        let stats = BiCgStabSolver::new(1e-12, 20).solve(&a, &Identity, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert!((x[0] - 0.1).abs() < 1e-10);
        assert!((x[1] - 0.6).abs() < 1e-10);
    }

    #[test]
    fn preconditioners_reduce_iterations() {
        let a = convection(60);
        let b = vec![1.0; 60];
        let mut x = vec![0.0; 60];
        let plain = BiCgStabSolver::new(1e-10, 300).solve(&a, &Identity, &b, &mut x).unwrap();
        assert!(plain.converged);
        assert!(residual_norm(&a, &x, &b) < 1e-8);

        let mut jac = Jacobi::new();
        jac.setup(&a).unwrap();
        let mut x = vec![0.0; 60];
        let stats = BiCgStabSolver::new(1e-10, 300).solve(&a, &jac, &b, &mut x).unwrap();
        assert!(stats.converged);

        let ilu = Ilu0::factor(&a).unwrap();
        let mut x = vec![0.0; 60];
        let stats = BiCgStabSolver::new(1e-10, 300).solve(&a, &ilu, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert!(stats.iterations <= plain.iterations);
        assert!(residual_norm(&a, &x, &b) < 1e-8);
    }
}
