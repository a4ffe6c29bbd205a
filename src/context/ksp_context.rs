//! Krylov subspace (KSP) context.
//!
//! `KspContext` holds the selected [`KspType`] and its parameters, builds the matching solver
//! from [`crate::solver`] on every solve, and keeps the outcome of the last solve for the
//! post-solve queries (iteration number, residual norm, converged reason, residual history).
//!
//! # Supported Solvers
//! - CG, CR, CGS, BiCG, BiCGStab, TFQMR, TCQMR, LSQR, MINRES, GMRES, Richardson, Chebyshev
//! - preonly (a single preconditioner application)
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems. SIAM.
//! - Templates for the Solution of Linear Systems: Building Blocks for Iterative Methods, 2nd Edition (Barrett et al.)

use crate::config::options::{KspOptions, OptionsDatabase, PcSide};
use crate::context::pc_context::PcContext;
use crate::core::traits::EngineScalar;
use crate::engine::{ContextHandle, Engine, EngineEvent, KspType};
use crate::error::KError;
use crate::matrix::sparse::{CsrMatrix, SparseMatrix};
use crate::solver::{
    check_dims, true_residual_norm, BiCgSolver, BiCgStabSolver, CgSolver, CgsSolver, ChebyshevSolver, CrSolver,
    GmresSolver, LinearSolver, LsqrSolver, MinresSolver, PreonlySolver, RichardsonSolver, TcqmrSolver,
    TfqmrSolver,
};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

pub struct KspContext<T: EngineScalar> {
    ksp_type: KspType,
    opts: KspOptions,
    history: Vec<T>,
    last: Option<SolveStats<T>>,
    handle: ContextHandle,
}

impl<T: EngineScalar> KspContext<T> {
    /// Register a new Krylov context with `engine`; GMRES with PETSc default tolerances.
    pub fn create(engine: &Engine) -> Result<Self, KError> {
        let handle = engine.ksp_create()?;
        Ok(Self {
            ksp_type: KspType::default(),
            opts: KspOptions::default(),
            history: Vec::new(),
            last: None,
            handle,
        })
    }

    pub fn set_type(&mut self, ksp_type: KspType) {
        log::debug!("ksp: set type {ksp_type}");
        self.engine().record(EngineEvent::KspSetType(ksp_type));
        self.ksp_type = ksp_type;
    }

    pub fn ksp_type(&self) -> KspType {
        self.ksp_type
    }

    /// Set any of the stopping criteria; `None` keeps the current value.
    pub fn set_tolerances(
        &mut self,
        rtol: Option<f64>,
        atol: Option<f64>,
        dtol: Option<f64>,
        max_it: Option<usize>,
    ) -> Result<(), KError> {
        for (name, v) in [("rtol", rtol), ("atol", atol), ("dtol", dtol)] {
            if let Some(v) = v {
                if !v.is_finite() || v < 0.0 {
                    return Err(KError::InvalidInput(format!("{name} must be finite and non-negative, got {v}")));
                }
            }
        }
        if let Some(v) = rtol {
            self.opts.rtol = v;
        }
        if let Some(v) = atol {
            self.opts.atol = v;
        }
        if let Some(v) = dtol {
            self.opts.dtol = v;
        }
        if let Some(v) = max_it {
            self.opts.max_it = v;
        }
        Ok(())
    }

    /// Keep the contents of the solution vector as the initial guess instead of zeroing it.
    pub fn set_initial_guess_nonzero(&mut self, nonzero: bool) {
        self.opts.initial_guess_nonzero = nonzero;
    }

    pub fn set_gmres_restart(&mut self, restart: usize) -> Result<(), KError> {
        if restart == 0 {
            return Err(KError::InvalidInput("GMRES restart must be positive".into()));
        }
        self.opts.gmres_restart = restart;
        Ok(())
    }

    pub fn set_pc_side(&mut self, side: PcSide) {
        self.opts.pc_side = side;
    }

    pub fn options(&self) -> &KspOptions {
        &self.opts
    }

    /// Apply `-ksp_type` and the `-ksp_*` parameters from `db`.
    pub fn set_from_options(&mut self, db: &OptionsDatabase) -> Result<(), KError> {
        if let Some(ksp_type) = db.get_parsed::<KspType>("ksp_type")? {
            self.set_type(ksp_type);
        }
        db.apply_ksp(&mut self.opts)
    }

    /// Solve `a·x = b` with the preconditioner held by `pc`.
    ///
    /// The preconditioner is set up on a CSR snapshot of `a`. Breakdowns are reported as
    /// [`KError::Breakdown`]; running out of iterations or diverging is not an error and is
    /// visible through [`converged_reason`](Self::converged_reason). A solve that does not
    /// converge reports the true residual norm `||b - Ax||_2`, not the method's estimate.
    pub fn solve(
        &mut self,
        pc: &mut PcContext<T>,
        a: &dyn SparseMatrix<T>,
        b: &[T],
        x: &mut [T],
    ) -> Result<SolveStats<T>, KError> {
        check_dims(a, b, x)?;
        self.last = None;
        self.history.clear();
        if !self.opts.initial_guess_nonzero {
            x.fill(T::zero());
        }
        pc.set_up(&CsrMatrix::from_operator(a))?;
        self.engine().record(EngineEvent::KspSolve(self.ksp_type));

        let mut solver = self.build_solver();
        let mut stats = solver.solve(a, pc.preconditioner()?, b, x)?;
        if !stats.converged {
            stats.final_residual = true_residual_norm(a, b, x);
        }
        self.history = solver.convergence().history().to_vec();
        self.last = Some(stats.clone());
        log::debug!(
            "ksp: {} finished with {} after {} iterations, residual norm {:e}",
            self.ksp_type,
            stats.reason,
            stats.iterations,
            stats.final_residual
        );
        if stats.reason.is_breakdown() {
            log::warn!(
                "ksp: {} broke down ({}) at iteration {}",
                self.ksp_type,
                stats.reason,
                stats.iterations
            );
            return Err(KError::Breakdown {
                reason: stats.reason,
                iterations: stats.iterations,
                residual: stats.final_residual.to_real(),
            });
        }
        Ok(stats)
    }

    /// Iterations taken by the last solve.
    pub fn iteration_number(&self) -> usize {
        self.last.as_ref().map_or(0, |s| s.iterations)
    }

    /// Final residual norm of the last solve.
    pub fn residual_norm(&self) -> T {
        self.last.as_ref().map_or(T::zero(), |s| s.final_residual)
    }

    pub fn converged_reason(&self) -> Option<ConvergedReason> {
        self.last.as_ref().map(|s| s.reason)
    }

    pub fn last_stats(&self) -> Option<&SolveStats<T>> {
        self.last.as_ref()
    }

    /// Residual norms monitored during the last solve, starting with the initial residual.
    pub fn residual_history(&self) -> &[T] {
        &self.history
    }

    pub fn engine(&self) -> &Engine {
        self.handle.engine()
    }

    fn build_solver(&self) -> Box<dyn LinearSolver<T>> {
        let o = &self.opts;
        let conv = Convergence::new(T::from_real(o.rtol), o.max_it)
            .with_atol(T::from_real(o.atol))
            .with_dtol(T::from_real(o.dtol));
        match self.ksp_type {
            KspType::Cg => Box::new(CgSolver { conv }),
            KspType::Cr => Box::new(CrSolver { conv }),
            KspType::Cgs => Box::new(CgsSolver { conv }),
            KspType::Bicg => Box::new(BiCgSolver { conv }),
            KspType::Bcgs => Box::new(BiCgStabSolver { conv }),
            KspType::Tfqmr => Box::new(TfqmrSolver { conv }),
            KspType::Tcqmr => Box::new(TcqmrSolver { conv }),
            KspType::Lsqr => Box::new(LsqrSolver { conv }),
            KspType::Minres => Box::new(MinresSolver { conv }),
            KspType::Gmres => Box::new(GmresSolver {
                restart: o.gmres_restart.max(1),
                conv,
                side: o.pc_side,
            }),
            KspType::Richardson => Box::new(RichardsonSolver {
                conv,
                scale: T::from_real(o.richardson_scale),
            }),
            KspType::Chebyshev => Box::new(ChebyshevSolver {
                conv,
                bounds: o
                    .chebyshev_bounds
                    .map(|(lo, hi)| (T::from_real(lo), T::from_real(hi))),
            }),
            KspType::Preonly => Box::new(PreonlySolver { conv }),
        }
    }
}

impl<T: EngineScalar> std::fmt::Debug for KspContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KspContext")
            .field("ksp_type", &self.ksp_type)
            .field("opts", &self.opts)
            .field("last", &self.last)
            .finish()
    }
}
