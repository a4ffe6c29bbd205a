//! Chebyshev iteration (Saad Alg. 12.1) on the preconditioned operator M⁻¹A.
//!
//! Needs an interval `[emin, emax]` enclosing the spectrum of M⁻¹A. When none is given, `emax`
//! is estimated by power iteration and the interval `[0.1·λmax, 1.1·λmax]` is used.

use crate::core::traits::EngineScalar;
use crate::core::vector_ops::{axpy, norm2, residual, scale};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::preconditioner::Preconditioner;
use crate::solver::{check_dims, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

const POWER_ITS: usize = 20;

pub struct ChebyshevSolver<T> {
    pub conv: Convergence<T>,
    /// `(emin, emax)`; estimated on every solve when `None`
    pub bounds: Option<(T, T)>,
}

impl<T: EngineScalar> ChebyshevSolver<T> {
    pub fn new(tol: T, max_iters: usize) -> Self {
        Self {
            conv: Convergence::new(tol, max_iters),
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, emin: T, emax: T) -> Self {
        self.bounds = Some((emin, emax));
        self
    }

    /// Power iteration on M⁻¹A from a fixed start vector. Returns `None` when the iteration
    /// collapses onto the null space.
    fn estimate_max_eigenvalue(
        a: &dyn SparseMatrix<T>,
        pc: &dyn Preconditioner<T>,
        n: usize,
    ) -> Result<Option<T>, KError> {
        let mut v: Vec<T> = (0..n).map(|i| T::one() + T::from_real(i as f64 / n as f64)).collect();
        let v_norm = norm2(&v);
        scale(T::one() / v_norm, &mut v);
        let mut t = vec![T::zero(); n];
        let mut w = vec![T::zero(); n];
        let mut lambda = T::zero();
        for _ in 0..POWER_ITS {
            a.spmv(&v, &mut t);
            pc.apply(&t, &mut w)?;
            lambda = norm2(&w);
            if lambda == T::zero() || !lambda.is_finite() {
                return Ok(None);
            }
            for (vi, &wi) in v.iter_mut().zip(&w) {
                *vi = wi / lambda;
            }
        }
        Ok(Some(lambda))
    }
}

impl<T: EngineScalar> LinearSolver<T> for ChebyshevSolver<T> {
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
        let (emin, emax) = match self.bounds {
            Some((emin, emax)) => {
                if !(emin > T::zero() && emin < emax && emax.is_finite()) {
                    return Err(KError::InvalidInput(format!(
                        "chebyshev bounds must satisfy 0 < emin < emax, got [{emin}, {emax}]"
                    )));
                }
                (emin, emax)
            }
            None => match Self::estimate_max_eigenvalue(a, pc, n)? {
                Some(lmax) => {
                    log::trace!("chebyshev: estimated largest eigenvalue {lmax:e}");
                    (T::from_real(0.1) * lmax, T::from_real(1.1) * lmax)
                }
                None => return Ok(self.conv.stats(0, res_norm, ConvergedReason::DivergedBreakdown)),
            },
        };

        let two = T::from_real(2.0);
        let theta = (emax + emin) / two;
        let delta = (emax - emin) / two;
        let sigma = theta / delta;
        let mut rho = T::one() / sigma;
        let mut z = vec![T::zero(); n];
        pc.apply(&r, &mut z)?;
        let mut d: Vec<T> = z.iter().map(|&zi| zi / theta).collect();
        let mut ad = vec![T::zero(); n];
        let mut i = 0;
        loop {
            i += 1;
            axpy(T::one(), &d, x);
            a.spmv(&d, &mut ad);
            axpy(-T::one(), &ad, &mut r);
            res_norm = norm2(&r);
            if let Some(reason) = self.conv.check(i, res_norm) {
                return Ok(self.conv.stats(i, res_norm, reason));
            }
            pc.apply(&r, &mut z)?;
            let rho_next = T::one() / (two * sigma - rho);
            let c1 = rho_next * rho;
            let c2 = two * rho_next / delta;
            for j in 0..n {
                d[j] = c1 * d[j] + c2 * z[j];
            }
            rho = rho_next;
        }
    }

    fn convergence(&self) -> &Convergence<T> {
        &self.conv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::{Identity, Jacobi};
    use crate::solver::test_systems::{convection, residual_norm};

    #[test]
    fn estimated_bounds_with_jacobi() {
        let a = convection(30);
        let b = vec![1.0; 30];
        let mut x = vec![0.0; 30];
        let mut pc = Jacobi::new();
        pc.setup(&a).unwrap();
        let stats = ChebyshevSolver::new(1e-8, 300).solve(&a, &pc, &b, &mut x).unwrap();
        assert!(stats.converged, "{:?}", stats.reason);
        assert!(residual_norm(&a, &x, &b) < 1e-6);
    }

    #[test]
    fn explicit_bounds() {
        // eigenvalues of the convection stencil lie in (4 - √3, 4 + √3)
        let a = convection(30);
        let b = vec![1.0; 30];
        let mut x = vec![0.0; 30];
        let stats = ChebyshevSolver::new(1e-8, 300)
            .with_bounds(2.2, 5.8)
            .solve(&a, &Identity, &b, &mut x)
            .unwrap();
        assert!(stats.converged, "{:?}", stats.reason);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let a = convection(5);
        let mut x = vec![0.0; 5];
        let err = ChebyshevSolver::new(1e-8, 10)
            .with_bounds(3.0, 1.0)
            .solve(&a, &Identity, &[1.0; 5], &mut x)
            .unwrap_err();
        assert!(matches!(err, KError::InvalidInput(_)));
    }
}
