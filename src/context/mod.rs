//! Engine contexts, PETSc style.
//!
//! Modules:
//! - [`pc_context`]: `PcContext`, the preconditioner context.
//! - [`ksp_context`]: `KspContext`, the Krylov subspace context; solves against a `PcContext`.
//! - [`sles`]: `SlesContext`, the legacy combined context owning one of each.
//!
//! Every context holds a ledger registration with the [`Engine`](crate::engine::Engine) that
//! created it and is released when dropped.
//!
//! # References
//! - PETSc documentation: https://petsc.org/release/docs/manualpages/KSP/

pub mod ksp_context;
pub use ksp_context::KspContext;
pub mod pc_context;
pub use pc_context::PcContext;
pub mod sles;
pub use sles::SlesContext;
