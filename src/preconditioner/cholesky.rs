//! Dense Cholesky preconditioner (`A = L Lᵀ`), factored in `f64` on a Faer matrix.

use faer::Mat;

use crate::core::traits::EngineScalar;
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::preconditioner::Preconditioner;

#[derive(Debug, Default)]
pub struct Cholesky {
    l: Option<Mat<f64>>,
}

impl Cholesky {
    pub fn new() -> Self {
        Self { l: None }
    }

    fn solve<T: EngineScalar>(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        let l = self.l.as_ref().ok_or(KError::NotInitialized)?;
        let n = l.nrows();
        let mut y: Vec<f64> = r.iter().map(|v| v.to_real()).collect();
        for i in 0..n {
            let mut s = y[i];
            for k in 0..i {
                s -= l[(i, k)] * y[k];
            }
            y[i] = s / l[(i, i)];
        }
        for i in (0..n).rev() {
            let mut s = y[i];
            for k in (i + 1)..n {
                s -= l[(k, i)] * y[k];
            }
            y[i] = s / l[(i, i)];
        }
        for (zi, yi) in z.iter_mut().zip(y) {
            *zi = T::from_real(yi);
        }
        Ok(())
    }
}

impl<T: EngineScalar> Preconditioner<T> for Cholesky {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        let n = a.nrows();
        let mut l = Mat::<f64>::zeros(n, n);
        for j in 0..n {
            let mut d = a.get(j, j).to_real();
            for k in 0..j {
                d -= l[(j, k)] * l[(j, k)];
            }
            if d <= 0.0 || d.is_nan() {
                return Err(KError::NotPositiveDefinite(j));
            }
            let ljj = d.sqrt();
            l[(j, j)] = ljj;
            for i in (j + 1)..n {
                let mut s = a.get(i, j).to_real();
                for k in 0..j {
                    s -= l[(i, k)] * l[(j, k)];
                }
                l[(i, j)] = s / ljj;
            }
        }
        self.l = Some(l);
        log::trace!("cholesky: factored dense {n}x{n}");
        Ok(())
    }

    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.solve(r, z)
    }

    fn apply_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.solve(r, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn solves_spd_system_exactly() {
        let a = CsrMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 4.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 5.0), (1, 2, 1.0), (2, 1, 1.0), (2, 2, 3.0)],
        )
        .unwrap();
        let mut chol = Cholesky::new();
        chol.setup(&a).unwrap();
        // A [1, 1, 1] = [6, 8, 4]
        let mut z = vec![0.0; 3];
        chol.apply(&[6.0, 8.0, 4.0][..], &mut z[..]).unwrap();
        for zi in &z {
            assert_abs_diff_eq!(*zi, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn negative_pivot_is_reported() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, -1.0), (1, 1, 1.0)]).unwrap();
        assert_eq!(
            Preconditioner::<f64>::setup(&mut Cholesky::new(), &a),
            Err(KError::NotPositiveDefinite(0))
        );
    }
}
