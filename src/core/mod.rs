//! Core scalar constraint and vector kernels.

pub mod traits;
pub mod vector_ops;

pub use traits::EngineScalar;
