use thiserror::Error;

use crate::engine::ContextKind;
use crate::interface::{PreconditionerType, SolverType};
use crate::utils::convergence::ConvergedReason;

// Unified error type for krylink

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KError {
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("cannot allocate {kind} context: {live} of {limit} contexts already live")]
    ContextAllocation {
        kind: ContextKind,
        live: usize,
        limit: usize,
    },
    #[error("solver contexts are not initialized")]
    NotInitialized,
    #[error("unsupported solver type {0:?} for the Krylov engine")]
    UnsupportedSolverType(SolverType),
    #[error("unsupported preconditioner type {0:?} for the Krylov engine")]
    UnsupportedPreconditionerType(PreconditionerType),
    #[error("solve broke down after {iterations} iterations ({reason}), residual norm {residual:e}")]
    Breakdown {
        reason: ConvergedReason,
        iterations: usize,
        residual: f64,
    },
    #[error("factorization error: {0}")]
    FactorError(String),
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error("matrix is not positive definite (pivot at row {0})")]
    NotPositiveDefinite(usize),
    #[error("invalid value {value:?} for option -{key}")]
    InvalidOption { key: String, value: String },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Coarse classification of a [`KError`], following who is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Abstract solver or preconditioner selection has no engine mapping.
    Configuration,
    /// The engine could not allocate its contexts.
    Resource,
    /// Operands or parameters handed to a solve are malformed.
    Input,
    /// Reported by the engine while setting up or running the iteration.
    Engine,
}

impl KError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KError::UnsupportedSolverType(_)
            | KError::UnsupportedPreconditionerType(_)
            | KError::InvalidOption { .. } => ErrorKind::Configuration,
            KError::ContextAllocation { .. } | KError::NotInitialized => ErrorKind::Resource,
            KError::DimensionMismatch { .. } | KError::InvalidInput(_) => ErrorKind::Input,
            KError::Breakdown { .. }
            | KError::FactorError(_)
            | KError::ZeroPivot(_)
            | KError::NotPositiveDefinite(_)
            | KError::Unsupported(_) => ErrorKind::Engine,
        }
    }
}
