//! Preconditioner context.
//!
//! A `PcContext` holds the selected [`PcType`], its parameters and, after
//! [`set_up`](PcContext::set_up), the concrete preconditioner built for one operator. Changing the
//! type or any parameter discards the built preconditioner, so the next set-up rebuilds it.
//!
//! # Supported Preconditioners
//!
//! - none: identity.
//! - jacobi: diagonal scaling; a zero diagonal entry is replaced by one.
//! - bjacobi: block-diagonal with ILU(0) on each contiguous block.
//! - sor: symmetric local SOR sweeps, `omega` and `its` from the options.
//! - eisenstat: SSOR in Eisenstat's split form.
//! - asm: additive Schwarz with overlapping contiguous subdomains.
//! - cholesky, lu: dense direct factorizations.
//! - icc, ilu: zero fill-in incomplete factorizations.

use crate::config::options::{OptionsDatabase, PcOptions};
use crate::core::traits::EngineScalar;
use crate::engine::{ContextHandle, Engine, EngineEvent, PcType};
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::preconditioner::{
    AdditiveSchwarz, BlockJacobi, Cholesky, Eisenstat, Icc0, Identity, Ilu0, Jacobi, Lu, MatSorType,
    Preconditioner, Sor,
};

pub struct PcContext<T: EngineScalar> {
    pc_type: PcType,
    opts: PcOptions,
    pc: Option<Box<dyn Preconditioner<T>>>,
    handle: ContextHandle,
}

impl<T: EngineScalar> PcContext<T> {
    /// Register a new preconditioner context with `engine`.
    pub fn create(engine: &Engine) -> Result<Self, KError> {
        let handle = engine.pc_create()?;
        Ok(Self {
            pc_type: PcType::default(),
            opts: PcOptions::default(),
            pc: None,
            handle,
        })
    }

    pub fn set_type(&mut self, pc_type: PcType) {
        log::debug!("pc: set type {pc_type}");
        self.engine().record(EngineEvent::PcSetType(pc_type));
        self.pc_type = pc_type;
        self.pc = None;
    }

    pub fn pc_type(&self) -> PcType {
        self.pc_type
    }

    /// Total number of blocks for block-Jacobi (and subdomains for additive Schwarz).
    pub fn bjacobi_set_total_blocks(&mut self, blocks: usize) -> Result<(), KError> {
        if blocks == 0 {
            return Err(KError::InvalidInput("block-Jacobi needs at least one block".into()));
        }
        self.opts.total_blocks = Some(blocks);
        self.pc = None;
        Ok(())
    }

    pub fn options(&self) -> &PcOptions {
        &self.opts
    }

    pub fn set_options(&mut self, opts: PcOptions) {
        self.opts = opts;
        self.pc = None;
    }

    /// Apply `-pc_type` and the `-pc_*` parameters from `db`.
    pub fn set_from_options(&mut self, db: &OptionsDatabase) -> Result<(), KError> {
        if let Some(pc_type) = db.get_parsed::<PcType>("pc_type")? {
            self.set_type(pc_type);
        }
        let mut opts = self.opts.clone();
        db.apply_pc(&mut opts)?;
        if opts != self.opts {
            self.set_options(opts);
        }
        Ok(())
    }

    /// Build the preconditioner for operator `a`.
    pub fn set_up(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        self.pc = None;
        let mut pc = self.build();
        pc.setup(a)?;
        log::trace!("pc: {} set up for {}x{} operator", self.pc_type, a.nrows(), a.ncols());
        self.engine().record(EngineEvent::PcSetUp(self.pc_type));
        self.pc = Some(pc);
        Ok(())
    }

    pub fn is_set_up(&self) -> bool {
        self.pc.is_some()
    }

    /// The built preconditioner; `NotInitialized` before [`set_up`](Self::set_up).
    pub fn preconditioner(&self) -> Result<&dyn Preconditioner<T>, KError> {
        self.pc.as_deref().ok_or(KError::NotInitialized)
    }

    pub fn apply(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.preconditioner()?.apply(r, z)
    }

    pub fn apply_transpose(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        self.preconditioner()?.apply_transpose(r, z)
    }

    pub fn engine(&self) -> &Engine {
        self.handle.engine()
    }

    fn build(&self) -> Box<dyn Preconditioner<T>> {
        let o = &self.opts;
        let blocks = o.total_blocks.unwrap_or(1);
        match self.pc_type {
            PcType::None => Box::new(Identity),
            PcType::Jacobi => Box::new(Jacobi::<T>::new()),
            PcType::BJacobi => Box::new(BlockJacobi::<T>::new(blocks)),
            PcType::Sor => Box::new(Sor::new(
                T::from_real(o.sor_omega),
                o.sor_its,
                MatSorType::LOCAL_SYMMETRIC_SWEEP,
                T::zero(),
            )),
            PcType::Eisenstat => Box::new(Eisenstat::new(T::from_real(o.sor_omega))),
            PcType::Asm => Box::new(AdditiveSchwarz::<T>::new(o.asm_overlap, blocks)),
            PcType::Cholesky => Box::new(Cholesky::new()),
            PcType::Icc => Box::new(Icc0::<T>::new()),
            PcType::Ilu => Box::new(Ilu0::<T>::new()),
            PcType::Lu => Box::new(Lu::new()),
        }
    }
}

impl<T: EngineScalar> std::fmt::Debug for PcContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcContext")
            .field("pc_type", &self.pc_type)
            .field("opts", &self.opts)
            .field("set_up", &self.pc.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;

    fn tridiag(n: usize) -> CsrMatrix<f64> {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 4.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_triplets(n, n, &t).unwrap()
    }

    #[test]
    fn apply_before_set_up_is_an_error() {
        let engine = Engine::new();
        let pc = PcContext::<f64>::create(&engine).unwrap();
        assert_eq!(pc.apply(&[1.0], &mut [0.0]), Err(KError::NotInitialized));
    }

    #[test]
    fn every_type_sets_up_on_spd_matrix() {
        let engine = Engine::new();
        let a = tridiag(12);
        let r = vec![1.0; 12];
        for pc_type in [
            PcType::None,
            PcType::Jacobi,
            PcType::BJacobi,
            PcType::Sor,
            PcType::Eisenstat,
            PcType::Asm,
            PcType::Cholesky,
            PcType::Icc,
            PcType::Ilu,
            PcType::Lu,
        ] {
            let mut pc = PcContext::<f64>::create(&engine).unwrap();
            pc.set_type(pc_type);
            pc.bjacobi_set_total_blocks(3).unwrap();
            pc.set_up(&a).unwrap();
            let mut z = vec![0.0; 12];
            pc.apply(&r, &mut z).unwrap();
            assert!(z.iter().all(|v| v.is_finite() && *v > 0.0), "{pc_type}: {z:?}");
        }
        assert_eq!(engine.resources().live, 0);
    }

    #[test]
    fn transpose_support_matches_type() {
        let engine = Engine::new();
        let a = tridiag(6);
        for (pc_type, supported) in [(PcType::Jacobi, true), (PcType::Ilu, true), (PcType::Sor, false), (PcType::Asm, false)] {
            let mut pc = PcContext::<f64>::create(&engine).unwrap();
            pc.set_type(pc_type);
            pc.set_up(&a).unwrap();
            let res = pc.apply_transpose(&[1.0; 6], &mut [0.0; 6]);
            assert_eq!(res.is_ok(), supported, "{pc_type}");
        }
    }

    #[test]
    fn options_change_type_and_invalidate_set_up() {
        let engine = Engine::with_options(EngineOptions {
            record_events: true,
            ..Default::default()
        });
        let mut pc = PcContext::<f64>::create(&engine).unwrap();
        pc.set_type(PcType::Jacobi);
        pc.set_up(&tridiag(4)).unwrap();
        assert!(pc.is_set_up());
        let db = OptionsDatabase::parse(["-pc_type", "sor", "-pc_sor_omega", "1.2"]).unwrap();
        pc.set_from_options(&db).unwrap();
        assert_eq!(pc.pc_type(), PcType::Sor);
        assert_eq!(pc.options().sor_omega, 1.2);
        assert!(!pc.is_set_up());
        assert!(engine.events().contains(&EngineEvent::PcSetType(PcType::Sor)));
    }
}
