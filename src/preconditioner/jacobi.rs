// Jacobi preconditioner implementation

use crate::core::traits::EngineScalar;
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::preconditioner::Preconditioner;

/// Jacobi preconditioner: M⁻¹ = D⁻¹
///
/// Rows with a zero (or missing) diagonal entry use 1 in its place.
#[derive(Clone, Debug, Default)]
pub struct Jacobi<T> {
    pub(crate) inv_diag: Vec<T>,
}

impl<T: EngineScalar> Jacobi<T> {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self { inv_diag: Vec::new() }
    }
}

impl<T: EngineScalar> Preconditioner<T> for Jacobi<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        self.inv_diag = a
            .diagonal()
            .into_iter()
            .map(|d| if d != T::zero() { T::one() / d } else { T::one() })
            .collect();
        Ok(())
    }

    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        if self.inv_diag.len() != r.len() {
            return Err(KError::DimensionMismatch {
                what: "jacobi input",
                expected: self.inv_diag.len(),
                found: r.len(),
            });
        }
        for ((zi, &ri), &di) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = di * ri;
        }
        Ok(())
    }

    fn apply_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.apply(r, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_by_inverse_diagonal() {
        let a = CsrMatrix::from_triplets(3, 3, &[(0, 0, 2.0), (1, 1, 4.0), (2, 1, 1.0)]).unwrap();
        let mut pc = Jacobi::new();
        pc.setup(&a).unwrap();
        let mut z = vec![0.0; 3];
        pc.apply(&[2.0, 2.0, 3.0], &mut z).unwrap();
        // row 2 has no diagonal entry
        assert_eq!(z, vec![1.0, 0.5, 3.0]);
    }
}
