//! Preconditioners for the Krylov methods.
//!
//! This module defines the Preconditioner trait and the engine's implementations: identity,
//! Jacobi, block Jacobi, SOR, Eisenstat, additive Schwarz, ILU(0), ICC(0), and dense LU and
//! Cholesky factorizations.

use crate::core::traits::EngineScalar;
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner<T> {
    /// Setup/factorize from A
    fn setup(&mut self, _a: &CsrMatrix<T>) -> Result<(), KError> {
        Ok(())
    }
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError>;
    /// Apply M⁻ᵀ to r. Needed by methods that work with Aᵀ (BiCG, QMR).
    fn apply_transpose(&self, _r: &[T], _z: &mut [T]) -> Result<(), KError> {
        Err(KError::Unsupported("transpose application of this preconditioner"))
    }
}

/// M = I.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<T: EngineScalar> Preconditioner<T> for Identity {
    fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        z.copy_from_slice(r);
        Ok(())
    }
    fn apply_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        z.copy_from_slice(r);
        Ok(())
    }
}

// Submodules for various preconditioners
pub mod asm;
pub mod block_jacobi;
pub mod cholesky;
pub mod icc;
pub mod ilu;
pub mod jacobi;
pub mod lu;
pub mod sor;

// Re-exports for convenience
pub use asm::AdditiveSchwarz;
pub use block_jacobi::BlockJacobi;
pub use cholesky::Cholesky;
pub use icc::Icc0;
pub use ilu::Ilu0;
pub use jacobi::Jacobi;
pub use lu::Lu;
pub use sor::{Eisenstat, MatSorType, Sor};
