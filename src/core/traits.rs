//! Core scalar traits for krylink.

use std::fmt::{Debug, Display, LowerExp};
use std::iter::Sum;
use std::ops::{AddAssign, MulAssign, SubAssign};

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Scalar types the Krylov engine computes in.
///
/// Only real floating-point types qualify; complex scalars are rejected at compile time.
/// The trait is sealed and implemented for `f32` and `f64`.
pub trait EngineScalar:
    num_traits::Float
    + Debug
    + Display
    + LowerExp
    + Default
    + AddAssign
    + SubAssign
    + MulAssign
    + Sum
    + Send
    + Sync
    + 'static
    + sealed::Sealed
{
    /// Convert a configuration-layer `f64` into the engine scalar.
    fn from_real(v: f64) -> Self;
    /// Widen to `f64` for reporting and factorizations.
    fn to_real(self) -> f64;
}

impl EngineScalar for f32 {
    fn from_real(v: f64) -> Self {
        v as f32
    }
    fn to_real(self) -> f64 {
        self as f64
    }
}

impl EngineScalar for f64 {
    fn from_real(v: f64) -> Self {
        v
    }
    fn to_real(self) -> f64 {
        self
    }
}
