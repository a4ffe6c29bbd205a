//! Solver adapter binding [`LinearSolverInterface`] to the Krylov engine.
//!
//! Engine contexts are created lazily on the first [`init`](LinearSolverInterface::init) or
//! [`solve`](LinearSolverInterface::solve) and released by [`clear`](LinearSolverInterface::clear)
//! or on drop. The adapter is initialized exactly when it holds contexts.

use std::marker::PhantomData;

use crate::config::options::OptionsDatabase;
use crate::context::{KspContext, PcContext};
use crate::core::traits::EngineScalar;
use crate::engine::{Engine, KspType, PcType};
use crate::error::KError;
use crate::interface::shape::{ContextShape, DefaultShape};
use crate::interface::{LinearSolverInterface, PreconditionerType, SolverType};
use crate::matrix::sparse::SparseMatrix;
use crate::matrix::vector::NumericVector;
use crate::parallel::Comm;
use crate::utils::convergence::SolveStats;

pub struct KrylovInterface<T: EngineScalar, S: ContextShape<T> = DefaultShape<T>> {
    solver_type: SolverType,
    preconditioner_type: PreconditionerType,
    n_processors: usize,
    options: Option<OptionsDatabase>,
    engine: Engine,
    contexts: Option<S>,
    _scalar: PhantomData<fn() -> T>,
}

impl<T: EngineScalar, S: ContextShape<T>> KrylovInterface<T, S> {
    /// Adapter for the topology of `comm`. No engine contexts are allocated.
    pub fn new(engine: &Engine, comm: &dyn Comm) -> Self {
        Self::with_topology(engine, comm.size())
    }

    /// Adapter for `n_processors` cooperating processes: ILU on one process, block-Jacobi with
    /// one block per process otherwise.
    pub fn with_topology(engine: &Engine, n_processors: usize) -> Self {
        let n_processors = n_processors.max(1);
        let preconditioner_type = if n_processors == 1 {
            PreconditionerType::Ilu
        } else {
            PreconditionerType::BlockJacobi
        };
        Self {
            solver_type: SolverType::default(),
            preconditioner_type,
            n_processors,
            options: None,
            engine: engine.clone(),
            contexts: None,
            _scalar: PhantomData,
        }
    }

    /// Runtime overrides applied after the tolerances on every solve.
    pub fn set_options(&mut self, options: OptionsDatabase) {
        self.options = Some(options);
    }

    pub fn options(&self) -> Option<&OptionsDatabase> {
        self.options.as_ref()
    }

    pub fn n_processors(&self) -> usize {
        self.n_processors
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The engine contexts, when initialized.
    pub fn contexts(&self) -> Option<&S> {
        self.contexts.as_ref()
    }

    pub fn contexts_mut(&mut self) -> Option<&mut S> {
        self.contexts.as_mut()
    }

    fn apply_solver_type(&self, ksp: &mut KspContext<T>) -> Result<(), KError> {
        let ksp_type = match self.solver_type {
            SolverType::Cg => KspType::Cg,
            SolverType::Cr => KspType::Cr,
            SolverType::Cgs => KspType::Cgs,
            SolverType::Bicg => KspType::Bicg,
            SolverType::Tcqmr => KspType::Tcqmr,
            SolverType::Tfqmr => KspType::Tfqmr,
            SolverType::Lsqr => KspType::Lsqr,
            SolverType::Bicgstab => KspType::Bcgs,
            SolverType::Minres => KspType::Minres,
            SolverType::Gmres => KspType::Gmres,
            SolverType::Richardson => KspType::Richardson,
            SolverType::Chebyshev => KspType::Chebyshev,
            other @ (SolverType::Cgn
            | SolverType::Qmr
            | SolverType::Jacobi
            | SolverType::SorForward
            | SolverType::SorBackward
            | SolverType::Ssor
            | SolverType::Invalid) => return Err(KError::UnsupportedSolverType(other)),
        };
        ksp.set_type(ksp_type);
        Ok(())
    }

    fn apply_preconditioner_type(&self, pc: &mut PcContext<T>) -> Result<(), KError> {
        let pc_type = match self.preconditioner_type {
            PreconditionerType::Identity => PcType::None,
            PreconditionerType::Cholesky => PcType::Cholesky,
            PreconditionerType::Icc => PcType::Icc,
            PreconditionerType::Ilu => PcType::Ilu,
            PreconditionerType::Lu => PcType::Lu,
            PreconditionerType::Asm => PcType::Asm,
            PreconditionerType::Jacobi => PcType::Jacobi,
            PreconditionerType::BlockJacobi => PcType::BJacobi,
            PreconditionerType::Sor => PcType::Sor,
            PreconditionerType::Eisenstat => PcType::Eisenstat,
            other @ (PreconditionerType::Ssor | PreconditionerType::Invalid) => {
                return Err(KError::UnsupportedPreconditionerType(other));
            }
        };
        pc.set_type(pc_type);
        if pc_type == PcType::BJacobi {
            pc.bjacobi_set_total_blocks(self.n_processors)?;
        }
        Ok(())
    }

    fn validate(
        matrix: &dyn SparseMatrix<T>,
        solution: &dyn NumericVector<T>,
        rhs: &dyn NumericVector<T>,
        tol: T,
        max_its: usize,
    ) -> Result<(), KError> {
        let (nrows, ncols) = (matrix.nrows(), matrix.ncols());
        if nrows != ncols {
            return Err(KError::DimensionMismatch { what: "operator columns", expected: nrows, found: ncols });
        }
        if rhs.size() != nrows {
            return Err(KError::DimensionMismatch { what: "right-hand side", expected: nrows, found: rhs.size() });
        }
        if solution.size() != ncols {
            return Err(KError::DimensionMismatch { what: "solution", expected: ncols, found: solution.size() });
        }
        if !tol.is_finite() || tol < T::zero() {
            return Err(KError::InvalidInput(format!("tolerance must be finite and non-negative, got {tol}")));
        }
        if max_its == 0 {
            return Err(KError::InvalidInput("max_its must be at least 1".into()));
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.contexts.take().is_some() {
            log::debug!("krylov interface: released {} contexts", S::NAME);
        }
    }
}

impl<T: EngineScalar, S: ContextShape<T>> LinearSolverInterface<T> for KrylovInterface<T, S> {
    fn init(&mut self) -> Result<(), KError> {
        if self.contexts.is_some() {
            return Ok(());
        }
        // A failure below drops `contexts`, releasing whatever was allocated.
        let mut contexts = S::create(&self.engine)?;
        self.apply_solver_type(contexts.ksp_mut())?;
        self.apply_preconditioner_type(contexts.pc_mut())?;
        contexts.ksp_mut().set_initial_guess_nonzero(true);
        log::debug!(
            "krylov interface: initialized {} contexts ({:?}, {:?}, {} processes)",
            S::NAME,
            self.solver_type,
            self.preconditioner_type,
            self.n_processors
        );
        self.contexts = Some(contexts);
        Ok(())
    }

    fn clear(&mut self) {
        self.release();
    }

    fn initialized(&self) -> bool {
        self.contexts.is_some()
    }

    fn solve(
        &mut self,
        matrix: &dyn SparseMatrix<T>,
        solution: &mut dyn NumericVector<T>,
        rhs: &dyn NumericVector<T>,
        tol: T,
        max_its: usize,
    ) -> Result<SolveStats<T>, KError> {
        Self::validate(matrix, solution, rhs, tol, max_its)?;
        self.init()?;
        let contexts = self.contexts.as_mut().ok_or(KError::NotInitialized)?;
        contexts
            .ksp_mut()
            .set_tolerances(Some(tol.to_real()), None, None, Some(max_its))?;
        if let Some(db) = &self.options {
            contexts.set_from_options(db)?;
        }
        let stats = contexts.solve(matrix, rhs.values(), solution.values_mut())?;
        log::debug!(
            "krylov interface: {} iterations, residual norm {:e} ({})",
            stats.iterations,
            stats.final_residual,
            stats.reason
        );
        Ok(stats)
    }

    fn solver_type(&self) -> SolverType {
        self.solver_type
    }

    fn set_solver_type(&mut self, solver_type: SolverType) {
        self.solver_type = solver_type;
    }

    fn preconditioner_type(&self) -> PreconditionerType {
        self.preconditioner_type
    }

    fn set_preconditioner_type(&mut self, pc_type: PreconditionerType) {
        self.preconditioner_type = pc_type;
    }
}

impl<T: EngineScalar, S: ContextShape<T>> Drop for KrylovInterface<T, S> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: EngineScalar, S: ContextShape<T>> std::fmt::Debug for KrylovInterface<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrylovInterface")
            .field("solver_type", &self.solver_type)
            .field("preconditioner_type", &self.preconditioner_type)
            .field("n_processors", &self.n_processors)
            .field("shape", &S::NAME)
            .field("initialized", &self.contexts.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineEvent, EngineOptions};
    use crate::interface::shape::{SlesContexts, SplitContexts};
    use crate::matrix::sparse::CsrMatrix;
    use crate::parallel::StaticComm;

    fn recording_engine() -> Engine {
        Engine::with_options(EngineOptions {
            record_events: true,
            ..Default::default()
        })
    }

    fn set_type_events(engine: &Engine) -> Vec<EngineEvent> {
        engine
            .events()
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::KspSetType(_) | EngineEvent::PcSetType(_)))
            .collect()
    }

    fn lifecycle<S: ContextShape<f64>>() {
        let engine = recording_engine();
        let mut solver = KrylovInterface::<f64, S>::with_topology(&engine, 1);
        assert!(!solver.initialized());
        assert_eq!(engine.resources().created, 0);
        solver.clear();
        solver.clear();

        solver.set_solver_type(SolverType::Cg);
        solver.set_preconditioner_type(PreconditionerType::Jacobi);
        solver.init().unwrap();
        let created = engine.resources().created;
        assert!(created > 0);
        solver.init().unwrap();
        assert_eq!(engine.resources().created, created);
        assert_eq!(
            set_type_events(&engine),
            vec![EngineEvent::KspSetType(KspType::Cg), EngineEvent::PcSetType(PcType::Jacobi)]
        );

        solver.clear();
        assert!(!solver.initialized());
        assert_eq!(engine.resources().live, 0);
        solver.clear();
    }

    #[test]
    fn split_lifecycle() {
        lifecycle::<SplitContexts<f64>>();
    }

    #[test]
    fn sles_lifecycle() {
        lifecycle::<SlesContexts<f64>>();
    }

    #[test]
    fn default_preconditioner_follows_topology() {
        let engine = Engine::new();
        let serial = KrylovInterface::<f64>::new(&engine, &StaticComm::new(0, 1));
        assert_eq!(serial.preconditioner_type(), PreconditionerType::Ilu);
        let parallel = KrylovInterface::<f64>::new(&engine, &StaticComm::new(0, 4));
        assert_eq!(parallel.preconditioner_type(), PreconditionerType::BlockJacobi);
        assert_eq!(parallel.solver_type(), SolverType::Gmres);
    }

    #[test]
    fn block_jacobi_gets_one_block_per_process() {
        let engine = Engine::new();
        let mut solver = KrylovInterface::<f64, SplitContexts<f64>>::with_topology(&engine, 3);
        solver.init().unwrap();
        let contexts = solver.contexts_mut().unwrap();
        assert_eq!(contexts.pc_mut().pc_type(), PcType::BJacobi);
        assert_eq!(contexts.pc_mut().options().total_blocks, Some(3));
        assert!(contexts.ksp_mut().options().initial_guess_nonzero);
    }

    #[test]
    fn unmapped_types_fail_init_and_release_contexts() {
        let engine = Engine::new();
        let mut solver = KrylovInterface::<f64>::with_topology(&engine, 1);
        solver.set_solver_type(SolverType::Cgn);
        assert_eq!(solver.init(), Err(KError::UnsupportedSolverType(SolverType::Cgn)));
        assert!(!solver.initialized());
        assert_eq!(engine.resources().live, 0);

        solver.set_solver_type(SolverType::Cg);
        solver.set_preconditioner_type(PreconditionerType::Ssor);
        let err = solver.init().unwrap_err();
        assert_eq!(err, KError::UnsupportedPreconditionerType(PreconditionerType::Ssor));
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert_eq!(engine.resources().live, 0);
    }

    #[test]
    fn solve_validates_before_touching_the_engine() {
        let engine = Engine::new();
        let mut solver = KrylovInterface::<f64>::with_topology(&engine, 1);
        let a = CsrMatrix::<f64>::identity(3);
        let mut x = vec![0.0; 3];

        let err = solver.solve(&a, &mut x, &vec![1.0; 2], 1e-8, 10).unwrap_err();
        assert!(matches!(err, KError::DimensionMismatch { what: "right-hand side", .. }));
        let err = solver.solve(&a, &mut x, &vec![1.0; 3], -1.0, 10).unwrap_err();
        assert!(matches!(err, KError::InvalidInput(_)));
        let err = solver.solve(&a, &mut x, &vec![1.0; 3], 1e-8, 0).unwrap_err();
        assert!(matches!(err, KError::InvalidInput(_)));
        assert_eq!(engine.resources().created, 0);
    }

    #[test]
    fn options_override_tolerances() {
        let engine = Engine::new();
        let mut solver = KrylovInterface::<f64>::with_topology(&engine, 1);
        solver.set_options(OptionsDatabase::parse(["-ksp_max_it", "1", "-ksp_type", "richardson"]).unwrap());
        let a = CsrMatrix::from_triplets(3, 3, &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 4.0), (2, 2, 4.0)])
            .unwrap();
        let mut x = vec![0.0; 3];
        let stats = solver.solve(&a, &mut x, &vec![1.0; 3], 1e-12, 100).unwrap();
        assert_eq!(stats.iterations, 1);
    }

    #[test]
    fn drop_releases_contexts() {
        let engine = Engine::new();
        {
            let mut solver = KrylovInterface::<f64>::with_topology(&engine, 1);
            solver.init().unwrap();
            assert!(engine.resources().live > 0);
        }
        assert_eq!(engine.resources().live, 0);
    }
}
