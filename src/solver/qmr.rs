//! Quasi-Minimal Residual with coupled two-term recurrences (Freund & Nachtigal), as given in
//! the Templates book. The preconditioner is applied on the right, so M⁻ᵀ is needed for the
//! left Lanczos sequence along with Aᵀ.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, dot, norm2, residual, scale};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, is_breakdown, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct TcqmrSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> TcqmrSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for TcqmrSolver<T> {
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
        let breakdown = |i: usize, res: T| (i, res, ConvergedReason::DivergedBreakdown);

        let mut v = r.clone();
        let mut rho = norm2(&v);
        let mut w_vec = r.clone();
        let mut z = vec![T::zero(); n];
        pc.apply_transpose(&w_vec, &mut z)?;
        let mut xi = norm2(&z);

        let mut y_tld = vec![T::zero(); n];
        let mut p = vec![T::zero(); n];
        let mut q = vec![T::zero(); n];
        let mut p_tld = vec![T::zero(); n];
        let mut atq = vec![T::zero(); n];
        let mut d = vec![T::zero(); n];
        let mut s = vec![T::zero(); n];

        let mut gamma_prev = T::one();
        let mut eta = -T::one();
        let mut theta_prev = T::zero();
        let mut eps_prev = T::one();
        let mut i = 0;
        let (iterations, final_res, reason) = loop {
            i += 1;
            if is_breakdown(rho) || is_breakdown(xi) {
                break breakdown(i - 1, res_norm);
            }
            // y = v / rho holds the unit right Lanczos vector, z / xi the left one.
            scale(T::one() / rho, &mut v);
            scale(T::one() / xi, &mut w_vec);
            scale(T::one() / xi, &mut z);
            let delta = dot(&z, &v);
            if is_breakdown(delta) {
                break breakdown(i - 1, res_norm);
            }
            pc.apply(&v, &mut y_tld)?;
            if i == 1 {
                p.copy_from_slice(&y_tld);
                q.copy_from_slice(&z);
            } else {
                let cp = xi * delta / eps_prev;
                let cq = rho * delta / eps_prev;
                for j in 0..n {
                    p[j] = y_tld[j] - cp * p[j];
                    q[j] = z[j] - cq * q[j];
                }
            }
            a.spmv(&p, &mut p_tld);
            let eps = dot(&q, &p_tld);
            if is_breakdown(eps) {
                break breakdown(i - 1, res_norm);
            }
            let beta = eps / delta;
            if is_breakdown(beta) {
                break breakdown(i - 1, res_norm);
            }
            for j in 0..n {
                v[j] = p_tld[j] - beta * v[j];
            }
            let rho_next = norm2(&v);
            a.spmv_transpose(&q, &mut atq);
            for j in 0..n {
                w_vec[j] = atq[j] - beta * w_vec[j];
            }
            pc.apply_transpose(&w_vec, &mut z)?;
            let xi_next = norm2(&z);

            let theta = rho_next / (gamma_prev * beta.abs());
            let gamma = T::one() / (T::one() + theta * theta).sqrt();
            if is_breakdown(gamma) {
                break breakdown(i - 1, res_norm);
            }
            eta = -eta * rho * gamma * gamma / (beta * gamma_prev * gamma_prev);
            if i == 1 {
                for j in 0..n {
                    d[j] = eta * p[j];
                    s[j] = eta * p_tld[j];
                }
            } else {
                let c = (theta_prev * gamma) * (theta_prev * gamma);
                for j in 0..n {
                    d[j] = eta * p[j] + c * d[j];
                    s[j] = eta * p_tld[j] + c * s[j];
                }
            }
            axpy(T::one(), &d, x);
            axpy(-T::one(), &s, &mut r);
            res_norm = norm2(&r);
            if let Some(reason) = self.conv.check(i, res_norm) {
                break (i, res_norm, reason);
            }
            rho = rho_next;
            xi = xi_next;
            gamma_prev = gamma;
            theta_prev = theta;
            eps_prev = eps;
        };
        Ok(self.conv.stats(iterations, final_res, reason))
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}
