//! The two engine API shapes the adapter can be compiled against.

use crate::config::options::OptionsDatabase;
use crate::context::{KspContext, PcContext, SlesContext};
use crate::core::traits::EngineScalar;
use crate::engine::Engine;
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;
use crate::utils::convergence::SolveStats;

/// The set of engine contexts one adapter owns while initialized.
pub trait ContextShape<T: EngineScalar>: Sized {
    const NAME: &'static str;

    /// Allocate every context of this shape. Contexts allocated before a failure are released.
    fn create(engine: &Engine) -> Result<Self, KError>;

    fn ksp_mut(&mut self) -> &mut KspContext<T>;

    fn pc_mut(&mut self) -> &mut PcContext<T>;

    fn set_from_options(&mut self, db: &OptionsDatabase) -> Result<(), KError>;

    fn solve(&mut self, a: &dyn SparseMatrix<T>, b: &[T], x: &mut [T]) -> Result<SolveStats<T>, KError>;
}

/// Stats of the last solve as reported by the Krylov context's queries.
fn queried_stats<T: EngineScalar>(ksp: &KspContext<T>, iterations: usize) -> Result<SolveStats<T>, KError> {
    let reason = ksp.converged_reason().ok_or(KError::NotInitialized)?;
    Ok(SolveStats {
        iterations,
        final_residual: ksp.residual_norm(),
        converged: reason.is_converged(),
        reason,
    })
}

/// Separate preconditioner and Krylov contexts (current engine API).
pub struct SplitContexts<T: EngineScalar> {
    ksp: KspContext<T>,
    pc: PcContext<T>,
}

impl<T: EngineScalar> ContextShape<T> for SplitContexts<T> {
    const NAME: &'static str = "split";

    fn create(engine: &Engine) -> Result<Self, KError> {
        let pc = PcContext::create(engine)?;
        let ksp = KspContext::create(engine)?;
        Ok(Self { ksp, pc })
    }

    fn ksp_mut(&mut self) -> &mut KspContext<T> {
        &mut self.ksp
    }

    fn pc_mut(&mut self) -> &mut PcContext<T> {
        &mut self.pc
    }

    fn set_from_options(&mut self, db: &OptionsDatabase) -> Result<(), KError> {
        self.ksp.set_from_options(db)?;
        self.pc.set_from_options(db)
    }

    fn solve(&mut self, a: &dyn SparseMatrix<T>, b: &[T], x: &mut [T]) -> Result<SolveStats<T>, KError> {
        self.ksp.solve(&mut self.pc, a, b, x)?;
        queried_stats(&self.ksp, self.ksp.iteration_number())
    }
}

/// One combined SLES context owning its Krylov and preconditioner contexts (legacy API).
pub struct SlesContexts<T: EngineScalar> {
    sles: SlesContext<T>,
}

impl<T: EngineScalar> ContextShape<T> for SlesContexts<T> {
    const NAME: &'static str = "sles";

    fn create(engine: &Engine) -> Result<Self, KError> {
        Ok(Self {
            sles: SlesContext::create(engine)?,
        })
    }

    fn ksp_mut(&mut self) -> &mut KspContext<T> {
        self.sles.ksp_mut()
    }

    fn pc_mut(&mut self) -> &mut PcContext<T> {
        self.sles.pc_mut()
    }

    fn set_from_options(&mut self, db: &OptionsDatabase) -> Result<(), KError> {
        self.sles.set_from_options(db)
    }

    fn solve(&mut self, a: &dyn SparseMatrix<T>, b: &[T], x: &mut [T]) -> Result<SolveStats<T>, KError> {
        let iterations = self.sles.solve(a, b, x)?;
        queried_stats(self.sles.ksp(), iterations)
    }
}

#[cfg(feature = "legacy-sles")]
pub type DefaultShape<T> = SlesContexts<T>;

#[cfg(not(feature = "legacy-sles"))]
pub type DefaultShape<T> = SplitContexts<T>;
