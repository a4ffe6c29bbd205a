//! Incomplete Cholesky IC(0) on the lower-triangular pattern of A.

use crate::core::traits::EngineScalar;
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::preconditioner::Preconditioner;

/// `A ≈ L Lᵀ` with `L` restricted to the pattern of `tril(A)`.
#[derive(Clone, Debug, Default)]
pub struct Icc0<T> {
    /// Rows of L, diagonal stored last in each row.
    l: Option<CsrMatrix<T>>,
}

impl<T: EngineScalar> Icc0<T> {
    pub fn new() -> Self {
        Self { l: None }
    }

    fn factor(&self) -> Result<&CsrMatrix<T>, KError> {
        self.l.as_ref().ok_or(KError::NotInitialized)
    }
}

impl<T: EngineScalar> Preconditioner<T> for Icc0<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        let n = a.nrows();
        let mut row_ptr = vec![0usize];
        let mut col_idx: Vec<usize> = Vec::new();
        let mut values: Vec<T> = Vec::new();
        // dense scatter of the row being factored
        let mut w = vec![T::zero(); n];
        let mut in_row = vec![false; n];
        for i in 0..n {
            let (cols, vals) = a.row(i);
            let start = col_idx.len();
            let mut aii = T::zero();
            for (&j, &v) in cols.iter().zip(vals) {
                if j < i {
                    col_idx.push(j);
                    values.push(v);
                } else if j == i {
                    aii = v;
                }
            }
            for k in start..col_idx.len() {
                w[col_idx[k]] = values[k];
                in_row[col_idx[k]] = true;
            }
            let mut d = aii;
            for k in start..col_idx.len() {
                let j = col_idx[k];
                // l_ij = (a_ij - Σ_{m<j} l_im l_jm) / l_jj
                let (js, je) = (row_ptr[j], row_ptr[j + 1]);
                let mut s = w[j];
                for m in js..je - 1 {
                    let c = col_idx[m];
                    if in_row[c] {
                        s -= w[c] * values[m];
                    }
                }
                let lij = s / values[je - 1];
                w[j] = lij;
                values[k] = lij;
                d -= lij * lij;
            }
            for k in start..col_idx.len() {
                w[col_idx[k]] = T::zero();
                in_row[col_idx[k]] = false;
            }
            if d <= T::zero() || d.is_nan() {
                return Err(KError::NotPositiveDefinite(i));
            }
            col_idx.push(i);
            values.push(d.sqrt());
            row_ptr.push(col_idx.len());
        }
        self.l = Some(CsrMatrix::from_csr(n, n, row_ptr, col_idx, values)?);
        log::trace!("icc(0): factored {n} rows");
        Ok(())
    }

    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        let l = self.factor()?;
        let n = l.nrows();
        // L y = r
        for i in 0..n {
            let (cols, vals) = l.row(i);
            let last = cols.len() - 1;
            let mut s = r[i];
            for k in 0..last {
                s -= vals[k] * z[cols[k]];
            }
            z[i] = s / vals[last];
        }
        // Lᵀ z = y
        for i in (0..n).rev() {
            let (cols, vals) = l.row(i);
            let last = cols.len() - 1;
            z[i] = z[i] / vals[last];
            let zi = z[i];
            for k in 0..last {
                z[cols[k]] -= vals[k] * zi;
            }
        }
        Ok(())
    }

    fn apply_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.apply(r, z)
    }
}
