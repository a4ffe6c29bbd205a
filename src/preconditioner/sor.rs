//! SOR and Eisenstat preconditioners on CSR storage.

use std::fmt;

use bitflags::bitflags;

use crate::core::traits::EngineScalar;
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::preconditioner::Preconditioner;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct MatSorType: u32 {
        const ZERO_INITIAL_GUESS       = 0b000_00001;
        const APPLY_LOWER              = 0b000_00010; // forward Gauss–Seidel
        const APPLY_UPPER              = 0b000_00100; // backward
        const SYMMETRIC_SWEEP          = Self::APPLY_LOWER.bits() | Self::APPLY_UPPER.bits();
        const LOCAL_FORWARD_SWEEP      = 0b000_01000;
        const LOCAL_BACKWARD_SWEEP     = 0b000_10000;
        const LOCAL_SYMMETRIC_SWEEP    = Self::LOCAL_FORWARD_SWEEP.bits() | Self::LOCAL_BACKWARD_SWEEP.bits();
    }
}

impl MatSorType {
    fn forward(self) -> bool {
        self.intersects(MatSorType::APPLY_LOWER | MatSorType::LOCAL_FORWARD_SWEEP)
    }
    fn backward(self) -> bool {
        self.intersects(MatSorType::APPLY_UPPER | MatSorType::LOCAL_BACKWARD_SWEEP)
    }
}

/// Successive over-relaxation: `its` sweeps of Gauss–Seidel relaxed by `omega`, starting
/// from a zero guess.
#[derive(Clone, Debug)]
pub struct Sor<T> {
    pub its: usize,
    pub sym: MatSorType,
    pub omega: T,
    /// Shift added to every diagonal entry.
    pub fshift: T,
    inv_diag: Vec<T>,
    a: Option<CsrMatrix<T>>,
}

impl<T: EngineScalar> Sor<T> {
    pub fn new(omega: T, its: usize, sym: MatSorType, fshift: T) -> Self {
        Self {
            its,
            sym,
            omega,
            fshift,
            inv_diag: Vec::new(),
            a: None,
        }
    }
    pub fn set_omega(&mut self, omega: T) {
        self.omega = omega;
    }
    pub fn omega(&self) -> T {
        self.omega
    }
    pub fn set_its(&mut self, its: usize) {
        self.its = its;
    }
    pub fn its(&self) -> usize {
        self.its
    }
    pub fn set_sym(&mut self, sym: MatSorType) {
        self.sym = sym;
    }
    pub fn sym(&self) -> MatSorType {
        self.sym
    }

    fn relax(&self, a: &CsrMatrix<T>, i: usize, r: &[T], z: &mut [T]) {
        let (cols, vals) = a.row(i);
        let mut sigma = T::zero();
        for (&j, &v) in cols.iter().zip(vals) {
            if j != i {
                sigma += v * z[j];
            }
        }
        let gs = (r[i] - sigma) * self.inv_diag[i];
        z[i] = (T::one() - self.omega) * z[i] + self.omega * gs;
    }
}

impl<T: EngineScalar> Default for Sor<T> {
    fn default() -> Self {
        Self::new(T::one(), 1, MatSorType::LOCAL_SYMMETRIC_SWEEP, T::zero())
    }
}

impl<T: EngineScalar> fmt::Display for Sor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SOR(omega={}, its={}, sym={:?}, fshift={})",
            self.omega, self.its, self.sym, self.fshift
        )
    }
}

impl<T: EngineScalar> Preconditioner<T> for Sor<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        let n = a.nrows();
        self.inv_diag.clear();
        for (i, d) in a.diagonal().into_iter().enumerate() {
            let aii = d + self.fshift;
            if aii == T::zero() {
                return Err(KError::ZeroPivot(i));
            }
            self.inv_diag.push(T::one() / aii);
        }
        if self.inv_diag.len() != n {
            return Err(KError::DimensionMismatch {
                what: "sor diagonal",
                expected: n,
                found: self.inv_diag.len(),
            });
        }
        self.a = Some(a.clone());
        log::trace!("pc setup: {self}");
        Ok(())
    }

    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        let a = self.a.as_ref().ok_or(KError::NotInitialized)?;
        let n = r.len();
        z.fill(T::zero());
        for _ in 0..self.its {
            if self.sym.forward() {
                for i in 0..n {
                    self.relax(a, i, r, z);
                }
            }
            if self.sym.backward() {
                for i in (0..n).rev() {
                    self.relax(a, i, r, z);
                }
            }
        }
        Ok(())
    }
}

/// SSOR applied in Eisenstat's split form:
/// `z = (2-ω)/ω · (D/ω + U)⁻¹ D (D/ω + L)⁻¹ r`.
#[derive(Clone, Debug)]
pub struct Eisenstat<T> {
    pub omega: T,
    diag: Vec<T>,
    a: Option<CsrMatrix<T>>,
}

impl<T: EngineScalar> Eisenstat<T> {
    pub fn new(omega: T) -> Self {
        Self {
            omega,
            diag: Vec::new(),
            a: None,
        }
    }
}

impl<T: EngineScalar> Preconditioner<T> for Eisenstat<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        let diag = a.diagonal();
        if let Some(i) = diag.iter().position(|&d| d == T::zero()) {
            return Err(KError::ZeroPivot(i));
        }
        self.diag = diag;
        self.a = Some(a.clone());
        Ok(())
    }

    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        let a = self.a.as_ref().ok_or(KError::NotInitialized)?;
        let n = r.len();
        let w = self.omega;
        // (D/ω + L) y = r
        for i in 0..n {
            let (cols, vals) = a.row(i);
            let mut s = r[i];
            for (&j, &v) in cols.iter().zip(vals) {
                if j < i {
                    s -= v * z[j];
                }
            }
            z[i] = s * w / self.diag[i];
        }
        let scale = (T::from_real(2.0) - w) / w;
        for (zi, &d) in z.iter_mut().zip(&self.diag) {
            *zi = *zi * d * scale;
        }
        // (D/ω + U) z = D y
        for i in (0..n).rev() {
            let (cols, vals) = a.row(i);
            let mut s = z[i];
            for (&j, &v) in cols.iter().zip(vals) {
                if j > i {
                    s -= v * z[j];
                }
            }
            z[i] = s * w / self.diag[i];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn spd3() -> CsrMatrix<f64> {
        CsrMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0), (1, 2, 1.0), (2, 1, 1.0), (2, 2, 2.0)],
        )
        .unwrap()
    }

    #[test]
    fn forward_sweep_is_lower_triangular_solve() {
        let a = spd3();
        let mut sor = Sor::new(1.0, 1, MatSorType::APPLY_LOWER, 0.0);
        sor.setup(&a).unwrap();
        let r = vec![4.0, 4.0, 3.0];
        let mut z = vec![0.0; 3];
        sor.apply(&r, &mut z).unwrap();
        // (D + L) z = r
        assert_abs_diff_eq!(z[0], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(z[1], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(z[2], 1.0, epsilon = 1e-14);
    }

    #[test]
    fn eisenstat_matches_symmetric_sor() {
        let a = spd3();
        let r = vec![1.0, -2.0, 0.5];
        for omega in [1.0, 1.3] {
            let mut sor = Sor::new(omega, 1, MatSorType::SYMMETRIC_SWEEP, 0.0);
            sor.setup(&a).unwrap();
            let mut e = Eisenstat::new(omega);
            e.setup(&a).unwrap();
            let mut z1 = vec![0.0; 3];
            let mut z2 = vec![0.0; 3];
            sor.apply(&r, &mut z1).unwrap();
            e.apply(&r, &mut z2).unwrap();
            for (u, v) in z1.iter().zip(&z2) {
                assert_abs_diff_eq!(*u, *v, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn zero_diagonal_is_rejected() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 0, 1.0)]).unwrap();
        let mut sor = Sor::<f64>::default();
        assert_eq!(sor.setup(&a), Err(KError::ZeroPivot(1)));
        assert!(sor.apply_transpose(&[1.0, 1.0], &mut [0.0, 0.0]).is_err());
    }
}
