//! The generic linear-solver contract and its Krylov engine binding.
//!
//! A finite-element library programs against [`LinearSolverInterface`]; [`build`] returns the
//! Krylov binding for the current process topology. The engine API shape (split PC + KSP
//! contexts, or the legacy combined SLES context) is chosen at build time through
//! [`DefaultShape`] and does not change the contract.

pub mod krylov;
pub mod shape;

pub use krylov::KrylovInterface;
pub use shape::{ContextShape, DefaultShape, SlesContexts, SplitContexts};

use crate::core::traits::EngineScalar;
use crate::engine::Engine;
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::matrix::vector::NumericVector;
use crate::parallel::Comm;
use crate::utils::convergence::SolveStats;

/// Iterative methods a caller can ask for. Not every method has an engine counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SolverType {
    Cg,
    /// CG on the normal equations
    Cgn,
    Cgs,
    Cr,
    Qmr,
    Tcqmr,
    Tfqmr,
    Bicg,
    Bicgstab,
    Minres,
    #[default]
    Gmres,
    Lsqr,
    Jacobi,
    SorForward,
    SorBackward,
    Ssor,
    Richardson,
    Chebyshev,
    Invalid,
}

/// Preconditioners a caller can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PreconditionerType {
    Identity,
    Jacobi,
    BlockJacobi,
    Sor,
    Ssor,
    Eisenstat,
    Asm,
    Cholesky,
    Icc,
    Ilu,
    Lu,
    Invalid,
}

/// Capability set shared by every linear-solver binding.
pub trait LinearSolverInterface<T: EngineScalar> {
    /// Materialize the solver contexts. A no-op when already initialized.
    fn init(&mut self) -> Result<(), KError>;

    /// Release every solver context. Safe to call repeatedly and on an uninitialized solver.
    fn clear(&mut self);

    fn initialized(&self) -> bool;

    /// Solve `matrix · solution = rhs` to relative tolerance `tol` in at most `max_its`
    /// iterations. `solution` holds the initial guess on entry and the last iterate on return.
    fn solve(
        &mut self,
        matrix: &dyn SparseMatrix<T>,
        solution: &mut dyn NumericVector<T>,
        rhs: &dyn NumericVector<T>,
        tol: T,
        max_its: usize,
    ) -> Result<SolveStats<T>, KError>;

    fn solver_type(&self) -> SolverType;

    /// Takes effect at the next [`init`](Self::init).
    fn set_solver_type(&mut self, solver_type: SolverType);

    fn preconditioner_type(&self) -> PreconditionerType;

    /// Takes effect at the next [`init`](Self::init).
    fn set_preconditioner_type(&mut self, pc_type: PreconditionerType);
}

/// The Krylov binding for the topology described by `comm`, using the build's default shape.
pub fn build<T: EngineScalar>(engine: &Engine, comm: &dyn Comm) -> Box<dyn LinearSolverInterface<T>> {
    Box::new(KrylovInterface::<T>::new(engine, comm))
}
