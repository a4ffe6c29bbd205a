//! Preconditioned Conjugate Residual (Saad §6.8, M-inner-product form).
//!
//! For symmetric A and symmetric positive definite M. One product with A and one application
//! of M per iteration; the unpreconditioned residual is carried alongside.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, dot, norm2, residual, xpay};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, is_breakdown, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct CrSolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> CrSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for CrSolver<T> {
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
        let mut az = vec![T::zero(); n];
        a.spmv(&z, &mut az);
        let mut z_az = dot(&z, &az);
        let mut p = z.clone();
        let mut ap = az.clone();
        let mut map = vec![T::zero(); n];
        let mut i = 0;
        loop {
            i += 1;
            if is_breakdown(z_az) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdown));
            }
            // map = M⁻¹ A p
            pc.apply(&ap, &mut map)?;
            let denom = dot(&ap, &map);
            if is_breakdown(denom) {
                return Ok(self.conv.stats(i - 1, res_norm, ConvergedReason::DivergedBreakdown));
            }
            let alpha = z_az / denom;
            axpy(alpha, &p, x);
            axpy(-alpha, &ap, &mut r);
            axpy(-alpha, &map, &mut z);
            res_norm = norm2(&r);
            if let Some(reason) = self.conv.check(i, res_norm) {
                return Ok(self.conv.stats(i, res_norm, reason));
            }
            a.spmv(&z, &mut az);
            let z_az_new = dot(&z, &az);
            let beta = z_az_new / z_az;
            xpay(&z, beta, &mut p);
            xpay(&az, beta, &mut ap);
            z_az = z_az_new;
        }
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}
