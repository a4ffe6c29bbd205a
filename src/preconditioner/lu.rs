//! Dense LU preconditioner using Faer (full pivoting).
//!
//! The operator is densified and factored in `f64` whatever the engine scalar, which makes
//! this an exact solve for small systems and a direct-solver fallback for `-pc_type lu`.

use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

use crate::core::traits::EngineScalar;
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::preconditioner::Preconditioner;

/// Exact LU factorization of A.
pub struct Lu {
    /// Cached LU factorization (if computed)
    factor: Option<FullPivLu<f64>>,
    n: usize,
}

impl Lu {
    pub fn new() -> Self {
        Lu { factor: None, n: 0 }
    }

    fn solve_with<T: EngineScalar>(&self, r: &[T], z: &mut [T], transpose: bool) -> Result<(), KError> {
        let factor = self.factor.as_ref().ok_or(KError::NotInitialized)?;
        let mut x: Vec<f64> = r.iter().map(|v| v.to_real()).collect();
        let x_mat = MatMut::from_column_major_slice_mut(&mut x, self.n, 1);
        if transpose {
            factor.solve_transpose_in_place_with_conj(Conj::No, x_mat);
        } else {
            factor.solve_in_place_with_conj(Conj::No, x_mat);
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(KError::FactorError("LU solve produced non-finite values; matrix is singular".into()));
        }
        for (zi, xi) in z.iter_mut().zip(x) {
            *zi = T::from_real(xi);
        }
        Ok(())
    }
}

impl Default for Lu {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EngineScalar> Preconditioner<T> for Lu {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(KError::DimensionMismatch { what: "lu operator columns", expected: n, found: a.ncols() });
        }
        let mut dense = Mat::<f64>::zeros(n, n);
        for i in 0..n {
            let (cols, vals) = a.row(i);
            if vals.iter().all(|v| *v == T::zero()) {
                return Err(KError::ZeroPivot(i));
            }
            for (&j, &v) in cols.iter().zip(vals) {
                dense[(i, j)] = v.to_real();
            }
        }
        self.factor = Some(FullPivLu::new(dense.as_ref()));
        self.n = n;
        log::trace!("lu: factored dense {n}x{n}");
        Ok(())
    }

    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.solve_with(r, z, false)
    }

    fn apply_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.solve_with(r, z, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lu_solves_dense_system() {
        // 3x3 system: [[2,1,1],[1,3,2],[1,0,0]] x = [4,5,6]
        // True solution: [6,15,-23]
        let a = CsrMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 2.0), (0, 1, 1.0), (0, 2, 1.0), (1, 0, 1.0), (1, 1, 3.0), (1, 2, 2.0), (2, 0, 1.0)],
        )
        .unwrap();
        let mut lu = Lu::new();
        lu.setup(&a).unwrap();
        let mut x = vec![0.0f64; 3];
        lu.apply(&[4.0, 5.0, 6.0][..], &mut x[..]).unwrap();
        let expected = [6.0f64, 15.0, -23.0];
        for (xi, ei) in x.iter().zip(expected.iter()) {
            assert!((xi - ei).abs() < 1e-10, "xi = {}, expected = {}", xi, ei);
        }
        // Aᵀ y = [4, 4, 3] has y = [1, 1, 1]
        lu.apply_transpose(&[4.0, 4.0, 3.0][..], &mut x[..]).unwrap();
        for xi in &x {
            assert!((xi - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn empty_row_is_a_zero_pivot() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0)]).unwrap();
        assert_eq!(Preconditioner::<f64>::setup(&mut Lu::new(), &a), Err(KError::ZeroPivot(1)));
    }
}
