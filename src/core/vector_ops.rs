//! Vector kernels shared by the Krylov methods and preconditioners.
//!
//! Dot products and norms switch to Rayon parallel iterators for long vectors when the
//! `rayon` feature is enabled; short vectors always take the sequential path so small
//! systems are not dominated by scheduling overhead.

use crate::core::traits::EngineScalar;
use crate::matrix::sparse::SparseMatrix;

/// Vectors at least this long use the parallel kernels.
#[cfg(feature = "rayon")]
pub(crate) const PAR_THRESHOLD: usize = 4096;

/// Computes `x^T y`.
pub fn dot<T: EngineScalar>(x: &[T], y: &[T]) -> T {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    #[cfg(feature = "rayon")]
    {
        if x.len() >= PAR_THRESHOLD {
            use rayon::prelude::*;
            return x
                .par_iter()
                .zip(y.par_iter())
                .map(|(&xi, &yi)| xi * yi)
                .reduce(T::zero, |acc, v| acc + v);
        }
    }
    x.iter().zip(y).fold(T::zero(), |acc, (&xi, &yi)| acc + xi * yi)
}

/// Computes `||x||_2`.
pub fn norm2<T: EngineScalar>(x: &[T]) -> T {
    dot(x, x).sqrt()
}

/// `y += alpha * x`
pub fn axpy<T: EngineScalar>(alpha: T, x: &[T], y: &mut [T]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// `y = x + beta * y`
pub fn xpay<T: EngineScalar>(x: &[T], beta: T, y: &mut [T]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = xi + beta * *yi;
    }
}

/// `x *= alpha`
pub fn scale<T: EngineScalar>(alpha: T, x: &mut [T]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// `r = b - A x`
pub fn residual<T: EngineScalar>(a: &dyn SparseMatrix<T>, x: &[T], b: &[T], r: &mut [T]) {
    a.spmv(x, r);
    for (ri, &bi) in r.iter_mut().zip(b) {
        *ri = bi - *ri;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn kernels_match_hand_computation() {
        let x = vec![1.0, 2.0, 3.0];
        let mut y = vec![4.0, -5.0, 6.0];
        assert_abs_diff_eq!(dot(&x, &y), 12.0, epsilon = 1e-14);
        assert_abs_diff_eq!(norm2(&x), 14.0f64.sqrt(), epsilon = 1e-14);
        axpy(2.0, &x, &mut y);
        assert_eq!(y, vec![6.0, -1.0, 12.0]);
        xpay(&x, 0.5, &mut y);
        assert_eq!(y, vec![4.0, 1.5, 9.0]);
        scale(2.0, &mut y);
        assert_eq!(y, vec![8.0, 3.0, 18.0]);
    }

    #[test]
    fn empty_vectors_have_positive_zero_norm() {
        let empty: [f64; 0] = [];
        assert_eq!(dot(&empty, &empty), 0.0);
        assert!(dot(&empty, &empty).is_sign_positive());
        assert!(norm2(&empty).is_sign_positive());
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn long_vectors_take_the_parallel_path() {
        let n = PAR_THRESHOLD + 17;
        let x = vec![1.0f64; n];
        assert_abs_diff_eq!(dot(&x, &x), n as f64, epsilon = 1e-9);
    }
}
