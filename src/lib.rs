//! krylink: a generic linear-solver interface bound to PETSc-style PC/KSP contexts
//!
//! The [`interface`] module hosts the solver adapter ([`KrylovInterface`]) that a finite-element
//! library talks to through [`LinearSolverInterface`]. Behind it sits a Krylov engine with
//! preconditioner and Krylov-subspace contexts, resource accounting and runtime options.

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod interface;
pub mod matrix;
pub mod preconditioner;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use self::core::*;
pub use engine::*;
pub use error::*;
pub use interface::*;
pub use matrix::*;
pub use parallel::*;
pub use preconditioner::*;
pub use solver::*;
pub use utils::*;

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
