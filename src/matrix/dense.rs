//! Dense operators on top of Faer.
//!
//! `faer::Mat<T>` implements [`SparseMatrix`] so small or test systems can be handed to the
//! engine without assembling CSR first. Row access reports every entry, zeros included.

use crate::core::traits::EngineScalar;
use crate::matrix::sparse::SparseMatrix;
use faer::Mat;

/// Construct a Faer matrix from raw column-major storage.
pub fn from_column_major<T: EngineScalar>(nrows: usize, ncols: usize, data: &[T]) -> Mat<T> {
    Mat::from_fn(nrows, ncols, |i, j| data[j * nrows + i])
}

impl<T: EngineScalar> SparseMatrix<T> for Mat<T> {
    fn nrows(&self) -> usize {
        Mat::nrows(self)
    }
    fn ncols(&self) -> usize {
        Mat::ncols(self)
    }
    fn spmv(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), Mat::ncols(self));
        assert_eq!(y.len(), Mat::nrows(self));
        for (i, yi) in y.iter_mut().enumerate() {
            let mut acc = T::zero();
            for (j, &xj) in x.iter().enumerate() {
                acc += self[(i, j)] * xj;
            }
            *yi = acc;
        }
    }
    fn spmv_transpose(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), Mat::nrows(self));
        assert_eq!(y.len(), Mat::ncols(self));
        for (j, yj) in y.iter_mut().enumerate() {
            let mut acc = T::zero();
            for (i, &xi) in x.iter().enumerate() {
                acc += self[(i, j)] * xi;
            }
            *yj = acc;
        }
    }
    fn get_row(&self, i: usize, cols: &mut Vec<usize>, vals: &mut Vec<T>) {
        cols.clear();
        vals.clear();
        for j in 0..Mat::ncols(self) {
            cols.push(j);
            vals.push(self[(i, j)]);
        }
    }
    fn nnz(&self) -> usize {
        Mat::nrows(self) * Mat::ncols(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::sparse::CsrMatrix;

    #[test]
    fn dense_operator_matches_csr_snapshot() {
        let a = from_column_major(2, 2, &[2.0, 1.0, 0.0, 3.0]);
        let mut y = vec![0.0; 2];
        a.spmv(&[1.0, 1.0], &mut y);
        assert_eq!(y, vec![2.0, 4.0]);
        a.spmv_transpose(&[1.0, 1.0], &mut y);
        assert_eq!(y, vec![3.0, 3.0]);
        let csr = CsrMatrix::from_operator(&a);
        assert_eq!(csr.get(1, 0), 1.0);
        assert_eq!(csr.get(0, 1), 0.0);
    }
}
