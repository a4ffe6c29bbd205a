//! ILU(0) factorization with zero fill (Saad §10.3, IKJ variant) on CSR storage.

use crate::core::traits::EngineScalar;
use crate::error::KError;
use crate::matrix::sparse::{CsrMatrix, SparseMatrix};
use crate::preconditioner::Preconditioner;

/// Incomplete LU with the sparsity pattern of A.
///
/// `L` (unit lower) and `U` share one CSR array laid over A's pattern.
#[derive(Clone, Debug, Default)]
pub struct Ilu0<T> {
    factors: Option<CsrMatrix<T>>,
    diag: Vec<usize>,
}

impl<T: EngineScalar> Ilu0<T> {
    pub fn new() -> Self {
        Self {
            factors: None,
            diag: Vec::new(),
        }
    }

    /// Factor `a` directly.
    pub fn factor(a: &CsrMatrix<T>) -> Result<Self, KError> {
        let mut ilu = Self::new();
        ilu.setup(a)?;
        Ok(ilu)
    }

    fn parts(&self) -> Result<(&CsrMatrix<T>, &[usize]), KError> {
        match &self.factors {
            Some(f) => Ok((f, &self.diag)),
            None => Err(KError::NotInitialized),
        }
    }

    /// z = (LU)⁻¹ r
    pub(crate) fn solve(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        let (f, diag) = self.parts()?;
        let (ptr, cols, vals) = (f.row_ptr(), f.col_idx(), f.values());
        let n = diag.len();
        // L y = r
        for i in 0..n {
            let mut s = r[i];
            for k in ptr[i]..diag[i] {
                s -= vals[k] * z[cols[k]];
            }
            z[i] = s;
        }
        // U z = y
        for i in (0..n).rev() {
            let mut s = z[i];
            for k in (diag[i] + 1)..ptr[i + 1] {
                s -= vals[k] * z[cols[k]];
            }
            z[i] = s / vals[diag[i]];
        }
        Ok(())
    }

    /// z = (LU)⁻ᵀ r = L⁻ᵀ U⁻ᵀ r
    pub(crate) fn solve_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        let (f, diag) = self.parts()?;
        let (ptr, cols, vals) = (f.row_ptr(), f.col_idx(), f.values());
        let n = diag.len();
        z.copy_from_slice(r);
        // Uᵀ y = r, column sweep over rows of U
        for i in 0..n {
            z[i] = z[i] / vals[diag[i]];
            let yi = z[i];
            for k in (diag[i] + 1)..ptr[i + 1] {
                z[cols[k]] -= vals[k] * yi;
            }
        }
        // Lᵀ z = y
        for i in (0..n).rev() {
            let zi = z[i];
            for k in ptr[i]..diag[i] {
                z[cols[k]] -= vals[k] * zi;
            }
        }
        Ok(())
    }
}

impl<T: EngineScalar> Preconditioner<T> for Ilu0<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        let n = a.nrows();
        let mut f = a.clone();
        let mut diag = Vec::with_capacity(n);
        for i in 0..n {
            diag.push(f.find(i, i).ok_or(KError::ZeroPivot(i))?);
        }
        let ptr = f.row_ptr().to_vec();
        let cols = f.col_idx().to_vec();
        let vals = f.values_mut();
        // column -> position in the current row
        let mut iw = vec![usize::MAX; n];
        for i in 0..n {
            for k in ptr[i]..ptr[i + 1] {
                iw[cols[k]] = k;
            }
            for k in ptr[i]..diag[i] {
                let col = cols[k];
                let pivot = vals[diag[col]];
                if pivot == T::zero() {
                    return Err(KError::ZeroPivot(col));
                }
                let lik = vals[k] / pivot;
                vals[k] = lik;
                for kk in (diag[col] + 1)..ptr[col + 1] {
                    let pos = iw[cols[kk]];
                    if pos != usize::MAX {
                        let upd = lik * vals[kk];
                        vals[pos] -= upd;
                    }
                }
            }
            if vals[diag[i]] == T::zero() {
                return Err(KError::ZeroPivot(i));
            }
            for k in ptr[i]..ptr[i + 1] {
                iw[cols[k]] = usize::MAX;
            }
        }
        log::trace!("ilu(0): factored {n} rows, {} entries", f.nnz());
        self.factors = Some(f);
        self.diag = diag;
        Ok(())
    }

    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.solve(r, z)
    }

    fn apply_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.solve_transpose(r, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tridiag(n: usize) -> CsrMatrix<f64> {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 4.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -2.0));
            }
        }
        CsrMatrix::from_triplets(n, n, &t).unwrap()
    }

    #[test]
    fn exact_on_tridiagonal() {
        // no fill for a tridiagonal matrix, so ILU(0) is the exact LU
        let a = tridiag(6);
        let ilu = Ilu0::factor(&a).unwrap();
        let x = vec![1.0, -2.0, 3.0, 0.5, 1.5, -1.0];
        let mut b = vec![0.0; 6];
        a.spmv(&x, &mut b);
        let mut z = vec![0.0; 6];
        ilu.apply(&b, &mut z).unwrap();
        for (zi, xi) in z.iter().zip(&x) {
            assert_abs_diff_eq!(*zi, *xi, epsilon = 1e-12);
        }
        a.spmv_transpose(&x, &mut b);
        ilu.apply_transpose(&b, &mut z).unwrap();
        for (zi, xi) in z.iter().zip(&x) {
            assert_abs_diff_eq!(*zi, *xi, epsilon = 1e-12);
        }
    }

    #[test]
    fn missing_diagonal_is_a_zero_pivot() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]).unwrap();
        assert_eq!(Ilu0::factor(&a).unwrap_err(), KError::ZeroPivot(0));
    }

    #[test]
    fn apply_before_setup_fails() {
        let ilu = Ilu0::<f64>::new();
        let mut z = vec![0.0; 1];
        assert_eq!(ilu.apply(&[1.0], &mut z), Err(KError::NotInitialized));
    }
}
