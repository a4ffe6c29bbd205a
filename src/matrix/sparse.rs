// SparseMatrix trait and the engine's CSR storage

use crate::core::traits::EngineScalar;
use crate::error::KError;

/// A read‐only sparse operator supporting y = A * x and row access.
pub trait SparseMatrix<T> {
    /// Number of rows.
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize;
    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    fn spmv(&self, x: &[T], y: &mut [T]);
    /// Compute y = A^T * x.  `x.len() == nrows()`, `y.len() == ncols()`.
    fn spmv_transpose(&self, x: &[T], y: &mut [T]);
    /// Fill `cols`/`vals` with the stored entries of row `i` (cleared first).
    fn get_row(&self, i: usize, cols: &mut Vec<usize>, vals: &mut Vec<T>);
    /// Number of stored entries.
    fn nnz(&self) -> usize;
}

/// Compressed sparse row matrix with sorted, duplicate-free rows.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix<T> {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

#[cfg(feature = "rayon")]
const PAR_ROWS: usize = 4096;

impl<T: EngineScalar> CsrMatrix<T> {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    ///
    /// Column indices within a row may arrive unsorted or repeated; rows are sorted and
    /// duplicates summed.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, KError> {
        if row_ptr.len() != nrows + 1 {
            return Err(KError::DimensionMismatch {
                what: "CSR row pointer",
                expected: nrows + 1,
                found: row_ptr.len(),
            });
        }
        if col_idx.len() != values.len() {
            return Err(KError::DimensionMismatch {
                what: "CSR values",
                expected: col_idx.len(),
                found: values.len(),
            });
        }
        if row_ptr[0] != 0 || row_ptr[nrows] != col_idx.len() {
            return Err(KError::InvalidInput(format!(
                "CSR row pointer must span 0..{}, got {}..{}",
                col_idx.len(),
                row_ptr[0],
                row_ptr[nrows]
            )));
        }
        if row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(KError::InvalidInput("CSR row pointer is not monotone".into()));
        }
        if let Some(&c) = col_idx.iter().find(|&&c| c >= ncols) {
            return Err(KError::InvalidInput(format!(
                "column index {c} out of range for {ncols} columns"
            )));
        }

        let mut new_ptr = Vec::with_capacity(nrows + 1);
        let mut new_cols = Vec::with_capacity(col_idx.len());
        let mut new_vals = Vec::with_capacity(values.len());
        new_ptr.push(0);
        let mut scratch: Vec<(usize, T)> = Vec::new();
        for i in 0..nrows {
            scratch.clear();
            scratch.extend((row_ptr[i]..row_ptr[i + 1]).map(|k| (col_idx[k], values[k])));
            scratch.sort_by_key(|&(c, _)| c);
            for &(c, v) in &scratch {
                if new_cols.len() > new_ptr[i] && new_cols.last() == Some(&c) {
                    if let Some(last) = new_vals.last_mut() {
                        *last += v;
                    }
                } else {
                    new_cols.push(c);
                    new_vals.push(v);
                }
            }
            new_ptr.push(new_cols.len());
        }
        Ok(Self {
            nrows,
            ncols,
            row_ptr: new_ptr,
            col_idx: new_cols,
            values: new_vals,
        })
    }

    /// Assemble from `(row, col, value)` triplets; repeated positions are summed.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: &[(usize, usize, T)],
    ) -> Result<Self, KError> {
        let mut counts = vec![0usize; nrows + 1];
        for &(i, j, _) in triplets {
            if i >= nrows || j >= ncols {
                return Err(KError::InvalidInput(format!(
                    "triplet ({i}, {j}) outside a {nrows}x{ncols} matrix"
                )));
            }
            counts[i + 1] += 1;
        }
        for i in 0..nrows {
            counts[i + 1] += counts[i];
        }
        let mut next = counts.clone();
        let mut col_idx = vec![0usize; triplets.len()];
        let mut values = vec![T::zero(); triplets.len()];
        for &(i, j, v) in triplets {
            let k = next[i];
            col_idx[k] = j;
            values[k] = v;
            next[i] += 1;
        }
        Self::from_csr(nrows, ncols, counts, col_idx, values)
    }

    /// The n×n identity.
    pub fn identity(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: vec![T::one(); n],
        }
    }

    /// Snapshot any operator into CSR through its row access.
    pub fn from_operator(a: &dyn SparseMatrix<T>) -> Self {
        let n = a.nrows();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(a.nnz());
        let mut values = Vec::with_capacity(a.nnz());
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        row_ptr.push(0);
        for i in 0..n {
            a.get_row(i, &mut cols, &mut vals);
            let mut row: Vec<(usize, T)> = cols.iter().copied().zip(vals.iter().copied()).collect();
            row.sort_by_key(|&(c, _)| c);
            for (c, v) in row {
                if col_idx.len() > row_ptr[i] && col_idx.last() == Some(&c) {
                    if let Some(last) = values.last_mut() {
                        *last += v;
                    }
                } else {
                    col_idx.push(c);
                    values.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }
        Self {
            nrows: n,
            ncols: a.ncols(),
            row_ptr,
            col_idx,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[T]) {
        let (s, e) = (self.row_ptr[i], self.row_ptr[i + 1]);
        (&self.col_idx[s..e], &self.values[s..e])
    }

    /// Stored entry at (i, j), zero if absent.
    pub fn get(&self, i: usize, j: usize) -> T {
        let (cols, vals) = self.row(i);
        match cols.binary_search(&j) {
            Ok(k) => vals[k],
            Err(_) => T::zero(),
        }
    }

    /// Position of (i, j) in the value array.
    pub fn find(&self, i: usize, j: usize) -> Option<usize> {
        let s = self.row_ptr[i];
        self.col_idx[s..self.row_ptr[i + 1]]
            .binary_search(&j)
            .ok()
            .map(|k| s + k)
    }

    pub fn diagonal(&self) -> Vec<T> {
        (0..self.nrows.min(self.ncols)).map(|i| self.get(i, i)).collect()
    }

    /// Principal submatrix on `indices` (in the given order).
    pub fn submatrix(&self, indices: &[usize]) -> Self {
        let mut local = vec![usize::MAX; self.ncols];
        for (k, &g) in indices.iter().enumerate() {
            local[g] = k;
        }
        let mut row_ptr = Vec::with_capacity(indices.len() + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for &g in indices {
            let (cols, vals) = self.row(g);
            let mut row: Vec<(usize, T)> = cols
                .iter()
                .zip(vals)
                .filter(|&(&c, _)| local[c] != usize::MAX)
                .map(|(&c, &v)| (local[c], v))
                .collect();
            row.sort_by_key(|&(c, _)| c);
            for (c, v) in row {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        Self {
            nrows: indices.len(),
            ncols: indices.len(),
            row_ptr,
            col_idx,
            values,
        }
    }

    fn row_dot(&self, i: usize, x: &[T]) -> T {
        let (cols, vals) = self.row(i);
        cols.iter().zip(vals).map(|(&c, &v)| v * x[c]).sum()
    }
}

impl<T: EngineScalar> SparseMatrix<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows
    }
    fn ncols(&self) -> usize {
        self.ncols
    }
    fn spmv(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        #[cfg(feature = "rayon")]
        {
            if self.nrows >= PAR_ROWS {
                use rayon::prelude::*;
                y.par_iter_mut()
                    .enumerate()
                    .for_each(|(i, yi)| *yi = self.row_dot(i, x));
                return;
            }
        }
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row_dot(i, x);
        }
    }
    fn spmv_transpose(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.nrows);
        assert_eq!(y.len(), self.ncols);
        y.iter_mut().for_each(|v| *v = T::zero());
        for (i, &xi) in x.iter().enumerate() {
            let (cols, vals) = self.row(i);
            for (&c, &v) in cols.iter().zip(vals) {
                y[c] += v * xi;
            }
        }
    }
    fn get_row(&self, i: usize, cols: &mut Vec<usize>, vals: &mut Vec<T>) {
        let (c, v) = self.row(i);
        cols.clear();
        vals.clear();
        cols.extend_from_slice(c);
        vals.extend_from_slice(v);
    }
    fn nnz(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_spmv() {
        // 3×3 identity in CSR: row_ptr=[0,1,2,3], col_idx=[0,1,2], vals=[1,1,1]
        let m = CsrMatrix::from_csr(3, 3, vec![0, 1, 2, 3], vec![0, 1, 2], vec![1.0, 1.0, 1.0])
            .unwrap();
        let x = vec![2.0, 3.0, 5.0];
        let mut y = vec![0.0; 3];
        m.spmv(&x, &mut y);
        assert_eq!(y, x);
        assert_eq!(m, CsrMatrix::identity(3));
    }

    #[test]
    fn simple_pattern() {
        // 2×3 matrix [[1,2,0],[0,3,4]]
        let m = CsrMatrix::from_csr(2, 3, vec![0, 2, 4], vec![0, 1, 1, 2], vec![1.0, 2.0, 3.0, 4.0])
            .unwrap();
        let x = vec![1.0, 1.0, 1.0];
        let mut y = vec![0.0; 2];
        m.spmv(&x, &mut y);
        assert_eq!(y, vec![3.0, 7.0]);
        let mut z = vec![0.0; 3];
        m.spmv_transpose(&[1.0, 2.0], &mut z);
        assert_eq!(z, vec![1.0, 8.0, 8.0]);
    }

    #[test]
    fn unsorted_rows_are_sorted_and_merged() {
        let m = CsrMatrix::from_csr(2, 2, vec![0, 3, 4], vec![1, 0, 1, 0], vec![1.0, 2.0, 3.0, 5.0])
            .unwrap();
        assert_eq!(m.row(0), (&[0usize, 1][..], &[2.0, 4.0][..]));
        assert_eq!(m.get(1, 0), 5.0);
        assert_eq!(m.get(1, 1), 0.0);
        assert_eq!(m.nnz(), 3);
    }

    #[test]
    fn malformed_csr_is_rejected() {
        assert!(matches!(
            CsrMatrix::<f64>::from_csr(2, 2, vec![0, 1], vec![0], vec![1.0]),
            Err(KError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            CsrMatrix::<f64>::from_csr(1, 2, vec![0, 1], vec![2], vec![1.0]),
            Err(KError::InvalidInput(_))
        ));
    }

    #[test]
    fn triplets_and_submatrix() {
        let m = CsrMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 4.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 4.0), (1, 2, -1.0), (2, 1, -1.0), (2, 2, 4.0), (2, 2, 1.0)],
        )
        .unwrap();
        assert_eq!(m.diagonal(), vec![4.0, 4.0, 5.0]);
        let s = m.submatrix(&[1, 2]);
        assert_eq!(s.get(0, 0), 4.0);
        assert_eq!(s.get(0, 1), -1.0);
        assert_eq!(s.get(1, 1), 5.0);
        let copy = CsrMatrix::from_operator(&m);
        assert_eq!(copy, m);
    }
}
