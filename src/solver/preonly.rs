//! Apply the preconditioner once: `x = M⁻¹ b`. Meant for direct preconditioners (LU, Cholesky).

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{norm2, residual};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct PreonlySolver<T> {
    pub conv: Convergence<T>,
}

impl<T: EngineScalar> PreonlySolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self { conv: Convergence::new(tol, max_iters) }
    }
}

impl<T: EngineScalar> LinearSolver<T> for PreonlySolver<T> {
    fn solve(
        &mut self,
        a: &dyn SparseMatrix<T>,
        pc: &dyn Preconditioner<T>,
        b: &[T],
        x: &mut [T],
    ) -> Result<SolveStats<T>, KError> {
        let n = check_dims(a, b, x)?;
        pc.apply(b, x)?;
        let mut r = vec![T::zero(); n];
        residual(a, x, b, &mut r);
        let res_norm = norm2(&r);
        let reason = if res_norm.is_finite() {
            ConvergedReason::ConvergedIts
        } else {
            ConvergedReason::DivergedNanOrInf
        };
        Ok(self.conv.stats(1, res_norm, reason))
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}
