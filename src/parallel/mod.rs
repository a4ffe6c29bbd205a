//! Process topology seen by the solver adapter.
//!
//! The adapter only needs to know how many processes share the problem (to choose the default
//! preconditioner and the block-Jacobi block count). Collective reductions are exposed for
//! callers that assemble distributed norms.

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    fn all_reduce(&self, x: f64) -> f64;
    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        let local = a.iter().zip(b).map(|(&x, &y)| x * y).sum::<f64>();
        self.all_reduce(local)
    }
}

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

/// Single-process communicator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
    fn all_reduce(&self, x: f64) -> f64 {
        x
    }
}

/// A fixed topology description without a transport; reductions are local.
///
/// Used to drive topology-dependent decisions (for instance the default preconditioner) from a
/// single process.
#[derive(Clone, Copy, Debug)]
pub struct StaticComm {
    pub rank: usize,
    pub size: usize,
}

impl StaticComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self { rank, size: size.max(1) }
    }
}

impl Comm for StaticComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn barrier(&self) {}
    fn all_reduce(&self, x: f64) -> f64 {
        x
    }
}

pub enum UniverseComm {
    Serial(SerialComm),
    Static(StaticComm),
    #[cfg(feature = "mpi")]
    Mpi(MpiComm),
}

impl Default for UniverseComm {
    fn default() -> Self {
        UniverseComm::Serial(SerialComm)
    }
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        match self {
            UniverseComm::Serial(comm) => comm.rank(),
            UniverseComm::Static(comm) => comm.rank(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.rank(),
        }
    }
    fn size(&self) -> usize {
        match self {
            UniverseComm::Serial(comm) => comm.size(),
            UniverseComm::Static(comm) => comm.size(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.size(),
        }
    }
    fn barrier(&self) {
        match self {
            UniverseComm::Serial(comm) => comm.barrier(),
            UniverseComm::Static(comm) => comm.barrier(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.barrier(),
        }
    }
    fn all_reduce(&self, x: f64) -> f64 {
        match self {
            UniverseComm::Serial(comm) => comm.all_reduce(x),
            UniverseComm::Static(comm) => comm.all_reduce(x),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.all_reduce(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_and_static_topologies() {
        let serial = UniverseComm::default();
        assert_eq!((serial.rank(), serial.size()), (0, 1));
        assert_eq!(serial.dot(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
        let four = UniverseComm::Static(StaticComm::new(2, 4));
        assert_eq!((four.rank(), four.size()), (2, 4));
        assert_eq!(StaticComm::new(0, 0).size(), 1);
    }
}
