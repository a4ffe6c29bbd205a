//! Generalized Minimal Residual (GMRES) solver with fixed restart (Saad §6.4)
//!
//! Restarted GMRES for large, sparse, possibly nonsymmetric systems. The Arnoldi basis is built
//! with modified Gram-Schmidt and a second orthogonalization pass; the Hessenberg least-squares
//! problem is reduced with Givens rotations as the basis grows.
//!
//! With right preconditioning (the default) the Arnoldi process runs on A·M⁻¹ and the monitored
//! estimate is the unpreconditioned residual norm. With left preconditioning it runs on M⁻¹·A
//! and the preconditioned residual norm is monitored.
//!
//! The iteration counter runs across restarts. At each restart the residual is recomputed from
//! the current iterate.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §6.4

use crate::config::options::PcSide;
use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, dot, norm2, residual, scale};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

/// GMRES solver with restart length and preconditioning side.
pub struct GmresSolver<T> {
    /// Number of Arnoldi vectors before restart
    pub restart: usize,
    pub conv: Convergence<T>,
    pub side: PcSide,
}

impl<T: EngineScalar> GmresSolver<T> {
    pub fn new(restart: usize, tol: T, max_iters: usize) -> Self {
        Self {
            restart: restart.max(1),
            conv: Convergence::new(tol, max_iters),
            side: PcSide::Right,
        }
    }

    pub fn with_side(mut self, side: PcSide) -> Self {
        self.side = side;
        self
    }

    /// Orthogonalize `w` against `basis` twice (MGS plus one refinement pass), filling column `j`
    /// of `h`. Returns true on happy breakdown, otherwise pushes the normalized vector.
    fn arnoldi(basis: &mut Vec<Vec<T>>, mut w: Vec<T>, h: &mut [Vec<T>], j: usize) -> bool {
        let w_norm0 = norm2(&w);
        for i in 0..=j {
            h[i][j] = dot(&w, &basis[i]);
            axpy(-h[i][j], &basis[i], &mut w);
        }
        for i in 0..=j {
            let tmp = dot(&w, &basis[i]);
            h[i][j] += tmp;
            axpy(-tmp, &basis[i], &mut w);
        }
        let h_next = norm2(&w);
        h[j + 1][j] = h_next;
        if h_next <= T::epsilon() * w_norm0 || h_next == T::zero() {
            return true;
        }
        scale(T::one() / h_next, &mut w);
        basis.push(w);
        false
    }

    /// Apply previous rotations to column `j` of `h`, form the new rotation and update `g`.
    /// Returns true when the rotated column has no pivot left.
    fn apply_givens_and_update_g(h: &mut [Vec<T>], g: &mut [T], cs: &mut [T], sn: &mut [T], j: usize) -> bool {
        for i in 0..j {
            let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
            h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
            h[i][j] = temp;
        }
        let h_kk = h[j][j];
        let h_k1k = h[j + 1][j];
        let r = (h_kk * h_kk + h_k1k * h_k1k).sqrt();
        let degenerate = r == T::zero();
        if degenerate {
            cs[j] = T::one();
            sn[j] = T::zero();
        } else {
            cs[j] = h_kk / r;
            sn[j] = h_k1k / r;
        }
        h[j][j] = cs[j] * h_kk + sn[j] * h_k1k;
        h[j + 1][j] = T::zero();
        let temp = cs[j] * g[j] + sn[j] * g[j + 1];
        g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
        g[j] = temp;
        degenerate
    }

    /// Solve the m×m upper-triangular system Hy = g, skipping zero pivots.
    fn back_substitution(h: &[Vec<T>], g: &[T], m: usize) -> Vec<T> {
        let mut y = vec![T::zero(); m];
        for i in (0..m).rev() {
            let mut acc = g[i];
            for j in (i + 1)..m {
                acc -= h[i][j] * y[j];
            }
            y[i] = if h[i][i] != T::zero() { acc / h[i][i] } else { T::zero() };
        }
        y
    }

    /// Residual as monitored on this side: `b - Ax`, or `M⁻¹(b - Ax)` for left preconditioning.
    fn monitored_residual(
        &self,
        a: &dyn SparseMatrix<T>,
        pc: &dyn Preconditioner<T>,
        b: &[T],
        x: &[T],
    ) -> Result<Vec<T>, KError> {
        let mut r = vec![T::zero(); b.len()];
        residual(a, x, b, &mut r);
        match self.side {
            PcSide::Right => Ok(r),
            PcSide::Left => {
                let mut z = vec![T::zero(); b.len()];
                pc.apply(&r, &mut z)?;
                Ok(z)
            }
        }
    }
}

impl<T: EngineScalar> LinearSolver<T> for GmresSolver<T> {
    fn solve(
        &mut self,
        a: &dyn SparseMatrix<T>,
        pc: &dyn Preconditioner<T>,
        b: &[T],
        x: &mut [T],
    ) -> Result<SolveStats<T>, KError> {
        let n = check_dims(a, b, x)?;
        let restart = self.restart;
        let mut r = self.monitored_residual(a, pc, b, x)?;
        let mut beta = norm2(&r);
        if let Some(reason) = self.conv.check(0, beta) {
            return Ok(self.conv.stats(0, beta, reason));
        }
        let mut its = 0;
        let mut tmp = vec![T::zero(); n];
        loop {
            let mut v_basis: Vec<Vec<T>> = Vec::with_capacity(restart + 1);
            // M⁻¹ v_j, kept for the right-preconditioned update
            let mut z_basis: Vec<Vec<T>> = Vec::with_capacity(restart);
            scale(T::one() / beta, &mut r);
            v_basis.push(r);
            let mut h = vec![vec![T::zero(); restart]; restart + 1];
            let mut g = vec![T::zero(); restart + 1];
            g[0] = beta;
            let mut cs = vec![T::zero(); restart];
            let mut sn = vec![T::zero(); restart];
            let mut m = 0;
            let mut stop = None;
            let mut invariant = false;
            let mut res_norm = beta;
            for j in 0..restart {
                its += 1;
                let mut w = vec![T::zero(); n];
                match self.side {
                    PcSide::Right => {
                        let mut z = vec![T::zero(); n];
                        pc.apply(&v_basis[j], &mut z)?;
                        a.spmv(&z, &mut w);
                        z_basis.push(z);
                    }
                    PcSide::Left => {
                        a.spmv(&v_basis[j], &mut tmp);
                        pc.apply(&tmp, &mut w)?;
                    }
                }
                let happy = Self::arnoldi(&mut v_basis, w, &mut h, j);
                let degenerate = Self::apply_givens_and_update_g(&mut h, &mut g, &mut cs, &mut sn, j);
                m = j + 1;
                // the least-squares estimate is meaningless once the Krylov space stops growing
                if happy || degenerate {
                    invariant = true;
                    break;
                }
                res_norm = g[j + 1].abs();
                stop = self.conv.check(its, res_norm);
                if stop.is_some() {
                    break;
                }
            }

            let y = Self::back_substitution(&h, &g, m);
            let update = match self.side {
                PcSide::Right => &z_basis,
                PcSide::Left => &v_basis,
            };
            for (yj, dir) in y.iter().zip(update) {
                axpy(*yj, dir, x);
            }
            if let Some(reason) = stop {
                return Ok(self.conv.stats(its, res_norm, reason));
            }

            r = self.monitored_residual(a, pc, b, x)?;
            beta = norm2(&r);
            if invariant {
                let reason = match self.conv.check(its, beta) {
                    Some(reason) if reason.is_converged() => reason,
                    _ => {
                        log::debug!("gmres: invariant Krylov space without a solution after {its} iterations");
                        ConvergedReason::DivergedBreakdown
                    }
                };
                return Ok(self.conv.stats(its, beta, reason));
            }
            if !beta.is_finite() {
                return Ok(self.conv.stats(its, beta, ConvergedReason::DivergedNanOrInf));
            }
            if self.conv.meets_tolerance(beta) {
                log::trace!("gmres: converged at restart after {its} iterations");
                return Ok(self.conv.stats(its, beta, self.conv.tolerance_reason(beta)));
            }
            if its >= self.conv.max_iters {
                return Ok(self.conv.stats(its, beta, ConvergedReason::DivergedIts));
            }
        }
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}
