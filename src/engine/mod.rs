//! Krylov engine runtime: context ledger, allocation limit and event log.
//!
//! Every PC, KSP or SLES context registers a [`ContextHandle`] with the [`Engine`] that created
//! it. The handle releases its ledger slot when dropped, so the number of live contexts always
//! equals the number of context objects in existence.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::KError;

/// Kind of engine-owned context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Pc,
    Ksp,
    Sles,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContextKind::Pc => "pc",
            ContextKind::Ksp => "ksp",
            ContextKind::Sles => "sles",
        })
    }
}

/// Krylov methods known to the engine, named as on the options command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum KspType {
    Cg,
    Cr,
    Cgs,
    Bicg,
    Bcgs,
    Tfqmr,
    Tcqmr,
    Lsqr,
    Minres,
    #[default]
    Gmres,
    Richardson,
    Chebyshev,
    Preonly,
}

impl KspType {
    pub fn as_str(self) -> &'static str {
        match self {
            KspType::Cg => "cg",
            KspType::Cr => "cr",
            KspType::Cgs => "cgs",
            KspType::Bicg => "bicg",
            KspType::Bcgs => "bcgs",
            KspType::Tfqmr => "tfqmr",
            KspType::Tcqmr => "tcqmr",
            KspType::Lsqr => "lsqr",
            KspType::Minres => "minres",
            KspType::Gmres => "gmres",
            KspType::Richardson => "richardson",
            KspType::Chebyshev => "chebyshev",
            KspType::Preonly => "preonly",
        }
    }
}

impl FromStr for KspType {
    type Err = KError;
    fn from_str(s: &str) -> Result<Self, KError> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "cg" => KspType::Cg,
            "cr" => KspType::Cr,
            "cgs" => KspType::Cgs,
            "bicg" => KspType::Bicg,
            "bcgs" | "bicgstab" => KspType::Bcgs,
            "tfqmr" => KspType::Tfqmr,
            "tcqmr" => KspType::Tcqmr,
            "lsqr" => KspType::Lsqr,
            "minres" => KspType::Minres,
            "gmres" => KspType::Gmres,
            "richardson" => KspType::Richardson,
            "chebyshev" | "chebychev" => KspType::Chebyshev,
            "preonly" => KspType::Preonly,
            _ => {
                return Err(KError::InvalidOption {
                    key: "ksp_type".into(),
                    value: s.into(),
                });
            }
        })
    }
}

impl fmt::Display for KspType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preconditioners known to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PcType {
    #[default]
    None,
    Jacobi,
    BJacobi,
    Sor,
    Eisenstat,
    Asm,
    Cholesky,
    Icc,
    Ilu,
    Lu,
}

impl PcType {
    pub fn as_str(self) -> &'static str {
        match self {
            PcType::None => "none",
            PcType::Jacobi => "jacobi",
            PcType::BJacobi => "bjacobi",
            PcType::Sor => "sor",
            PcType::Eisenstat => "eisenstat",
            PcType::Asm => "asm",
            PcType::Cholesky => "cholesky",
            PcType::Icc => "icc",
            PcType::Ilu => "ilu",
            PcType::Lu => "lu",
        }
    }
}

impl FromStr for PcType {
    type Err = KError;
    fn from_str(s: &str) -> Result<Self, KError> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "none" => PcType::None,
            "jacobi" => PcType::Jacobi,
            "bjacobi" => PcType::BJacobi,
            "sor" => PcType::Sor,
            "eisenstat" => PcType::Eisenstat,
            "asm" => PcType::Asm,
            "cholesky" => PcType::Cholesky,
            "icc" => PcType::Icc,
            "ilu" => PcType::Ilu,
            "lu" => PcType::Lu,
            _ => {
                return Err(KError::InvalidOption {
                    key: "pc_type".into(),
                    value: s.into(),
                });
            }
        })
    }
}

impl fmt::Display for PcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable engine calls, recorded when [`EngineOptions::record_events`] is set.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    ContextCreated(ContextKind),
    ContextDestroyed(ContextKind),
    KspSetType(KspType),
    PcSetType(PcType),
    PcSetUp(PcType),
    KspSolve(KspType),
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EngineOptions {
    /// Upper bound on simultaneously live contexts; unlimited when `None`.
    pub max_contexts: Option<usize>,
    pub record_events: bool,
    /// Worker threads for data-parallel kernels; `None` uses every core.
    pub threads: Option<usize>,
}

/// Snapshot of the context ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResourceUsage {
    pub live: usize,
    pub created: usize,
    pub destroyed: usize,
}

struct Ledger {
    live: AtomicUsize,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    limit: Option<usize>,
    events: Option<Mutex<Vec<EngineEvent>>>,
}

/// Shared handle to the Krylov engine. Cloning is cheap; clones see the same ledger.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Ledger>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(opts: EngineOptions) -> Self {
        #[cfg(feature = "rayon")]
        {
            let threads = opts.threads.unwrap_or_else(num_cpus::get).max(1);
            // The global pool can only be built once per process; later engines share it.
            if rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .is_ok()
            {
                log::debug!("engine: rayon pool sized to {threads} threads");
            }
        }
        Self {
            inner: Arc::new(Ledger {
                live: AtomicUsize::new(0),
                created: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
                limit: opts.max_contexts,
                events: opts.record_events.then(|| Mutex::new(Vec::new())),
            }),
        }
    }

    pub fn resources(&self) -> ResourceUsage {
        ResourceUsage {
            live: self.inner.live.load(Ordering::SeqCst),
            created: self.inner.created.load(Ordering::SeqCst),
            destroyed: self.inner.destroyed.load(Ordering::SeqCst),
        }
    }

    /// Recorded events, oldest first; empty when recording is off.
    pub fn events(&self) -> Vec<EngineEvent> {
        match &self.inner.events {
            Some(events) => events.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            None => Vec::new(),
        }
    }

    pub fn clear_events(&self) {
        if let Some(events) = &self.inner.events {
            events.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    pub(crate) fn record(&self, event: EngineEvent) {
        if let Some(events) = &self.inner.events {
            events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
        }
    }

    pub fn pc_create(&self) -> Result<ContextHandle, KError> {
        self.register(ContextKind::Pc)
    }

    pub fn ksp_create(&self) -> Result<ContextHandle, KError> {
        self.register(ContextKind::Ksp)
    }

    pub fn sles_create(&self) -> Result<ContextHandle, KError> {
        self.register(ContextKind::Sles)
    }

    fn register(&self, kind: ContextKind) -> Result<ContextHandle, KError> {
        let ledger = &self.inner;
        let mut live = ledger.live.load(Ordering::SeqCst);
        loop {
            if let Some(limit) = ledger.limit {
                if live >= limit {
                    return Err(KError::ContextAllocation { kind, live, limit });
                }
            }
            match ledger
                .live
                .compare_exchange(live, live + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(current) => live = current,
            }
        }
        ledger.created.fetch_add(1, Ordering::SeqCst);
        self.record(EngineEvent::ContextCreated(kind));
        log::debug!("engine: created {kind} context ({} live)", live + 1);
        Ok(ContextHandle {
            engine: self.clone(),
            kind,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("resources", &self.resources())
            .field("limit", &self.inner.limit)
            .finish()
    }
}

/// Ledger registration of one live context; released on drop.
pub struct ContextHandle {
    engine: Engine,
    kind: ContextKind,
}

impl ContextHandle {
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle").field("kind", &self.kind).finish()
    }
}

impl Drop for ContextHandle {
    fn drop(&mut self) {
        let ledger = &self.engine.inner;
        let left = ledger.live.fetch_sub(1, Ordering::SeqCst) - 1;
        ledger.destroyed.fetch_add(1, Ordering::SeqCst);
        self.engine.record(EngineEvent::ContextDestroyed(self.kind));
        log::debug!("engine: destroyed {} context ({left} live)", self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_counted_and_released() {
        let engine = Engine::with_options(EngineOptions {
            record_events: true,
            ..Default::default()
        });
        let pc = engine.pc_create().unwrap();
        let ksp = engine.ksp_create().unwrap();
        assert_eq!(engine.resources(), ResourceUsage { live: 2, created: 2, destroyed: 0 });
        drop(ksp);
        drop(pc);
        assert_eq!(engine.resources(), ResourceUsage { live: 0, created: 2, destroyed: 2 });
        assert_eq!(
            engine.events(),
            vec![
                EngineEvent::ContextCreated(ContextKind::Pc),
                EngineEvent::ContextCreated(ContextKind::Ksp),
                EngineEvent::ContextDestroyed(ContextKind::Ksp),
                EngineEvent::ContextDestroyed(ContextKind::Pc),
            ]
        );
    }

    #[test]
    fn limit_is_enforced() {
        let engine = Engine::with_options(EngineOptions {
            max_contexts: Some(1),
            ..Default::default()
        });
        let _sles = engine.sles_create().unwrap();
        let err = engine.ksp_create().unwrap_err();
        assert_eq!(
            err,
            KError::ContextAllocation { kind: ContextKind::Ksp, live: 1, limit: 1 }
        );
        assert!(engine.events().is_empty());
    }

    #[test]
    fn events_survive_a_panicking_recorder() {
        let engine = Engine::with_options(EngineOptions {
            record_events: true,
            ..Default::default()
        });
        let shared = engine.clone();
        let joined = std::thread::spawn(move || {
            if let Some(events) = &shared.inner.events {
                let _guard = events.lock();
                panic!("recorder thread failed while holding the event log");
            }
        })
        .join();
        assert!(joined.is_err());
        assert!(engine.inner.events.as_ref().is_some_and(|m| m.is_poisoned()));

        engine.record(EngineEvent::KspSolve(KspType::Cg));
        assert_eq!(engine.events(), vec![EngineEvent::KspSolve(KspType::Cg)]);
        engine.clear_events();
        assert!(engine.events().is_empty());
    }

    #[test]
    fn type_names_round_trip() {
        assert_eq!("bcgs".parse::<KspType>().unwrap(), KspType::Bcgs);
        assert_eq!("bicgstab".parse::<KspType>().unwrap(), KspType::Bcgs);
        assert_eq!(KspType::Gmres.to_string(), "gmres");
        assert_eq!("bjacobi".parse::<PcType>().unwrap(), PcType::BJacobi);
        assert!("amg".parse::<PcType>().is_err());
    }
}
