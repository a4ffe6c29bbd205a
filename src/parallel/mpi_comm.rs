//! MPI-based communicator.
//!
//! Wraps the MPI world communicator so the solver adapter can query the process count. The
//! `Universe` is kept alive for as long as the communicator; dropping it finalizes MPI.
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")]
//! # {
//! use krylink::{Comm, MpiComm};
//! let comm = MpiComm::new().expect("MPI already initialized");
//! println!("Rank: {} / {}", comm.rank(), comm.size());
//! comm.barrier();
//! # }
//! ```

use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::KError;

pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    pub rank: usize,
    pub size: usize,
    _universe: Universe,
}

impl MpiComm {
    /// Initializes MPI and constructs a new `MpiComm`.
    ///
    /// Fails if MPI was already initialized in this process.
    pub fn new() -> Result<Self, KError> {
        let universe = mpi::initialize()
            .ok_or(KError::Unsupported("MPI is already initialized in this process"))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiComm {
            world,
            rank,
            size,
            _universe: universe,
        })
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
    fn barrier(&self) {
        self.world.barrier();
    }

    /// Sum of `x` across all processes.
    fn all_reduce(&self, x: f64) -> f64 {
        use mpi::collective::SystemOperation;
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, &SystemOperation::sum());
        y
    }
}
