//! Preconditioned Richardson iteration: `x ← x + s·M⁻¹(b − Ax)`.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, norm2, residual};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, LinearSolver};
use crate::utils::convergence::{Convergence, SolveStats};

pub struct RichardsonSolver<T> {
    pub conv: Convergence<T>,
    /// Damping factor `s`
    pub scale: T,
}

impl<T: EngineScalar> RichardsonSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self {
            conv: Convergence::new(tol, max_iters),
            scale: T::one(),
        }
    }

    pub fn with_scale(mut self, scale: T) -> Self {
        self.scale = scale;
        self
    }
}

impl<T: EngineScalar> LinearSolver<T> for RichardsonSolver<T> {
    fn solve(
        &mut self,
        a: &dyn SparseMatrix<T>,
        pc: &dyn Preconditioner<T>,
        b: &[T],
        x: &mut [T],
    ) -> Result<SolveStats<T>, KError> {
        let n = check_dims(a, b, x)?;
        let mut r = vec![T::zero(); n];
        let mut z = vec![T::zero(); n];
        let mut i = 0;
        loop {
            residual(a, x, b, &mut r);
            let res_norm = norm2(&r);
            if let Some(reason) = self.conv.check(i, res_norm) {
                return Ok(self.conv.stats(i, res_norm, reason));
            }
            pc.apply(&r, &mut z)?;
            axpy(self.scale, &z, x);
            i += 1;
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
    use crate::utils::convergence::ConvergedReason;

    #[test]
    fn jacobi_richardson_converges_on_dominant_matrix() {
        let a = convection(20);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];
        let mut pc = Jacobi::new();
        pc.setup(&a).unwrap();
        let stats = RichardsonSolver::new(1e-8, 500).solve(&a, &pc, &b, &mut x).unwrap();
        assert!(stats.converged, "{:?}", stats.reason);
        assert!(residual_norm(&a, &x, &b) < 1e-7);
    }

    #[test]
    fn gauss_seidel_beats_jacobi() {
        let a = convection(20);
        let b = vec![1.0; 20];
        let mut jac = Jacobi::new();
        jac.setup(&a).unwrap();
        let mut sor = Sor::default();
        sor.setup(&a).unwrap();
        let mut x = vec![0.0; 20];
        let j = RichardsonSolver::new(1e-8, 500).solve(&a, &jac, &b, &mut x).unwrap();
        let mut x = vec![0.0; 20];
        let s = RichardsonSolver::new(1e-8, 500).solve(&a, &sor, &b, &mut x).unwrap();
        assert!(s.converged);
        assert!(s.iterations < j.iterations);
    }

    #[test]
    fn unpreconditioned_unit_scale_diverges() {
        let a = convection(10);
        let b = vec![1.0; 10];
        let mut x = vec![0.0; 10];
        let mut solver = RichardsonSolver::new(1e-8, 200).with_scale(1.0);
        solver.conv.dtol = 1e3;
        // Unpreconditioned with unit scale: spectral radius of I - A exceeds one.
        let stats = solver.solve(&a, &Identity, &b, &mut x).unwrap();
        assert_eq!(stats.reason, ConvergedReason::DivergedDtol);
    }
}
