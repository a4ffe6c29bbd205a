//! Convergence tracking & tolerance checks for iterative solvers.

use std::fmt;

use crate::core::traits::EngineScalar;

/// Why an iteration stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConvergedReason {
    /// Residual fell below `rtol * ||r0||`.
    ConvergedRtol,
    /// Residual fell below `atol`.
    ConvergedAtol,
    /// A fixed number of iterations was requested and performed (preonly).
    ConvergedIts,
    DivergedIts,
    DivergedDtol,
    DivergedBreakdown,
    DivergedBreakdownBicg,
    DivergedIndefiniteMat,
    DivergedIndefinitePc,
    DivergedNanOrInf,
}

impl ConvergedReason {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            ConvergedReason::ConvergedRtol | ConvergedReason::ConvergedAtol | ConvergedReason::ConvergedIts
        )
    }

    /// Reasons that surface as [`KError::Breakdown`](crate::KError::Breakdown).
    pub fn is_breakdown(self) -> bool {
        matches!(
            self,
            ConvergedReason::DivergedBreakdown
                | ConvergedReason::DivergedBreakdownBicg
                | ConvergedReason::DivergedIndefiniteMat
                | ConvergedReason::DivergedIndefinitePc
                | ConvergedReason::DivergedNanOrInf
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            ConvergedReason::ConvergedRtol => "CONVERGED_RTOL",
            ConvergedReason::ConvergedAtol => "CONVERGED_ATOL",
            ConvergedReason::ConvergedIts => "CONVERGED_ITS",
            ConvergedReason::DivergedIts => "DIVERGED_ITS",
            ConvergedReason::DivergedDtol => "DIVERGED_DTOL",
            ConvergedReason::DivergedBreakdown => "DIVERGED_BREAKDOWN",
            ConvergedReason::DivergedBreakdownBicg => "DIVERGED_BREAKDOWN_BICG",
            ConvergedReason::DivergedIndefiniteMat => "DIVERGED_INDEFINITE_MAT",
            ConvergedReason::DivergedIndefinitePc => "DIVERGED_INDEFINITE_PC",
            ConvergedReason::DivergedNanOrInf => "DIVERGED_NANORINF",
        }
    }
}

impl fmt::Display for ConvergedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub converged: bool,
    pub reason: ConvergedReason,
}

impl<T: Copy> SolveStats<T> {
    /// `(iterations, final residual norm)`
    pub fn into_pair(self) -> (usize, T) {
        (self.iterations, self.final_residual)
    }
}

/// Stopping criteria and residual history for one solve.
///
/// The first call to [`check`](Convergence::check) (iteration 0) fixes the reference norm
/// `||r0||` and the effective tolerance `max(rtol * ||r0||, atol)`.
#[derive(Clone, Debug)]
pub struct Convergence<T> {
    pub rtol: T,
    pub atol: T,
    pub dtol: T,
    pub max_iters: usize,
    rnorm0: T,
    ttol: T,
    history: Vec<T>,
}

impl<T: EngineScalar> Convergence<T> {
    pub fn new(rtol: T, max_iters: usize) -> Self {
        Self {
            rtol,
            atol: T::from_real(1e-50),
            dtol: T::from_real(1e5),
            max_iters,
            rnorm0: T::zero(),
            ttol: T::zero(),
            history: Vec::new(),
        }
    }

    pub fn with_atol(mut self, atol: T) -> Self {
        self.atol = atol;
        self
    }

    pub fn with_dtol(mut self, dtol: T) -> Self {
        self.dtol = dtol;
        self
    }

    /// Returns `Some(reason)` when iteration `i` with residual `rnorm` should stop.
    pub fn check(&mut self, i: usize, rnorm: T) -> Option<ConvergedReason> {
        log::trace!("iteration {i}: residual norm {rnorm:e}");
        if i == 0 {
            self.history.clear();
        }
        self.history.push(rnorm);
        if !rnorm.is_finite() {
            return Some(ConvergedReason::DivergedNanOrInf);
        }
        if i == 0 {
            self.rnorm0 = rnorm;
            self.ttol = (self.rtol * rnorm).max(self.atol);
        }
        if rnorm <= self.ttol {
            return Some(if rnorm < self.atol {
                ConvergedReason::ConvergedAtol
            } else {
                ConvergedReason::ConvergedRtol
            });
        }
        if i > 0 && self.rnorm0 > T::zero() && rnorm >= self.dtol * self.rnorm0 {
            return Some(ConvergedReason::DivergedDtol);
        }
        if i >= self.max_iters {
            return Some(ConvergedReason::DivergedIts);
        }
        None
    }

    /// Whether `rnorm` is already inside the tolerance fixed at iteration 0.
    pub fn meets_tolerance(&self, rnorm: T) -> bool {
        rnorm <= self.ttol
    }

    /// The converged reason `rnorm` would earn, for norms that already meet the tolerance.
    pub fn tolerance_reason(&self, rnorm: T) -> ConvergedReason {
        if rnorm < self.atol {
            ConvergedReason::ConvergedAtol
        } else {
            ConvergedReason::ConvergedRtol
        }
    }

    pub fn history(&self) -> &[T] {
        &self.history
    }

    pub fn stats(&self, iterations: usize, final_residual: T, reason: ConvergedReason) -> SolveStats<T> {
        SolveStats {
            iterations,
            final_residual,
            converged: reason.is_converged(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_and_absolute_tolerances() {
        let mut c = Convergence::new(1e-3, 100);
        assert_eq!(c.check(0, 10.0), None);
        assert_eq!(c.check(1, 0.5), None);
        assert_eq!(c.check(2, 0.009), Some(ConvergedReason::ConvergedRtol));

        let mut c = Convergence::new(1e-3, 100).with_atol(1.0);
        assert_eq!(c.check(0, 10.0), None);
        assert_eq!(c.check(1, 0.5), Some(ConvergedReason::ConvergedAtol));
    }

    #[test]
    fn zero_initial_residual_converges_immediately() {
        let mut c = Convergence::<f64>::new(1e-8, 10);
        assert_eq!(c.check(0, 0.0), Some(ConvergedReason::ConvergedAtol));
    }

    #[test]
    fn divergence_and_iteration_cap() {
        let mut c = Convergence::new(1e-8, 3).with_dtol(10.0);
        c.check(0, 1.0);
        assert_eq!(c.check(1, 20.0), Some(ConvergedReason::DivergedDtol));

        let mut c = Convergence::new(1e-8, 2);
        c.check(0, 1.0);
        assert_eq!(c.check(1, 0.9), None);
        assert_eq!(c.check(2, 0.8), Some(ConvergedReason::DivergedIts));
        assert_eq!(c.history(), &[1.0, 0.9, 0.8]);
        assert_eq!(c.check(0, f64::NAN), Some(ConvergedReason::DivergedNanOrInf));
    }

    #[test]
    fn reason_classification() {
        assert!(ConvergedReason::ConvergedIts.is_converged());
        assert!(!ConvergedReason::DivergedIts.is_converged());
        assert!(!ConvergedReason::DivergedIts.is_breakdown());
        assert!(ConvergedReason::DivergedIndefinitePc.is_breakdown());
        assert_eq!(ConvergedReason::DivergedDtol.to_string(), "DIVERGED_DTOL");
    }
}
