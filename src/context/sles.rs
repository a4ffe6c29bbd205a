//! Legacy combined linear-solver (SLES) context.
//!
//! Older PETSc releases exposed one SLES object that owns its Krylov and preconditioner
//! contexts; the solve call returns the iteration count and the residual is read back from
//! the inner Krylov context.

use crate::config::options::OptionsDatabase;
use crate::context::ksp_context::KspContext;
use crate::context::pc_context::PcContext;
use crate::core::traits::EngineScalar;
use crate::engine::{ContextHandle, Engine};
use crate::error::KError;
use crate::matrix::sparse::SparseMatrix;

pub struct SlesContext<T: EngineScalar> {
    ksp: KspContext<T>,
    pc: PcContext<T>,
    handle: ContextHandle,
}

impl<T: EngineScalar> SlesContext<T> {
    /// Create the SLES together with the Krylov and preconditioner contexts it owns.
    pub fn create(engine: &Engine) -> Result<Self, KError> {
        let handle = engine.sles_create()?;
        let ksp = KspContext::create(engine)?;
        let pc = PcContext::create(engine)?;
        Ok(Self { ksp, pc, handle })
    }

    pub fn ksp(&self) -> &KspContext<T> {
        &self.ksp
    }

    pub fn ksp_mut(&mut self) -> &mut KspContext<T> {
        &mut self.ksp
    }

    pub fn pc(&self) -> &PcContext<T> {
        &self.pc
    }

    pub fn pc_mut(&mut self) -> &mut PcContext<T> {
        &mut self.pc
    }

    pub fn set_from_options(&mut self, db: &OptionsDatabase) -> Result<(), KError> {
        self.ksp.set_from_options(db)?;
        self.pc.set_from_options(db)
    }

    /// Solve `a·x = b`; returns the number of iterations.
    pub fn solve(&mut self, a: &dyn SparseMatrix<T>, b: &[T], x: &mut [T]) -> Result<usize, KError> {
        self.ksp.solve(&mut self.pc, a, b, x).map(|stats| stats.iterations)
    }

    pub fn engine(&self) -> &Engine {
        self.handle.engine()
    }
}

impl<T: EngineScalar> std::fmt::Debug for SlesContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlesContext")
            .field("ksp", &self.ksp)
            .field("pc", &self.pc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ContextKind, EngineEvent, EngineOptions, PcType};
    use crate::matrix::sparse::CsrMatrix;

    #[test]
    fn sles_owns_its_contexts() {
        let engine = Engine::with_options(EngineOptions {
            record_events: true,
            ..Default::default()
        });
        let sles = SlesContext::<f64>::create(&engine).unwrap();
        assert_eq!(engine.resources().live, 3);
        drop(sles);
        assert_eq!(engine.resources().live, 0);
        assert_eq!(
            engine.events()[..3],
            [
                EngineEvent::ContextCreated(ContextKind::Sles),
                EngineEvent::ContextCreated(ContextKind::Ksp),
                EngineEvent::ContextCreated(ContextKind::Pc),
            ]
        );
    }

    #[test]
    fn solve_returns_iterations_and_keeps_residual_in_ksp() {
        let engine = Engine::new();
        let mut sles = SlesContext::<f64>::create(&engine).unwrap();
        sles.pc_mut().set_type(PcType::Jacobi);
        sles.ksp_mut().set_tolerances(Some(1e-10), None, None, None).unwrap();
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 2.0), (1, 1, 4.0)]).unwrap();
        let mut x = vec![0.0; 2];
        let its = sles.solve(&a, &[2.0, 4.0], &mut x).unwrap();
        assert_eq!(its, sles.ksp().iteration_number());
        assert!(its <= 1);
        assert!(sles.ksp().residual_norm() < 1e-10);
        assert!((x[0] - 1.0).abs() < 1e-12 && (x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn allocation_failure_releases_partial_contexts() {
        let engine = Engine::with_options(EngineOptions {
            max_contexts: Some(2),
            ..Default::default()
        });
        let err = SlesContext::<f64>::create(&engine).unwrap_err();
        assert!(matches!(err, KError::ContextAllocation { kind: ContextKind::Pc, .. }));
        assert_eq!(engine.resources().live, 0);
    }
}
