//! Numeric vectors as seen by the solver interface.

/// A distributed-or-local vector the interface reads the right-hand side from and writes the
/// solution into. Only the locally owned entries are exposed.
pub trait NumericVector<T> {
    fn size(&self) -> usize;
    fn values(&self) -> &[T];
    fn values_mut(&mut self) -> &mut [T];
}

impl<T> NumericVector<T> for Vec<T> {
    fn size(&self) -> usize {
        self.len()
    }
    fn values(&self) -> &[T] {
        self
    }
    fn values_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T> NumericVector<T> for [T] {
    fn size(&self) -> usize {
        self.len()
    }
    fn values(&self) -> &[T] {
        self
    }
    fn values_mut(&mut self) -> &mut [T] {
        self
    }
}
