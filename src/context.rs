//! Execution context: rank identity and barrier synchronization.
//!
//! A serial run gets a degenerate context (rank 0, no collectives). A
//! parallel run initializes an MPI process group when the crate is built
//! with the `mpi` feature; without it, asking for parallel execution is a
//! fatal error rather than a silent downgrade to serial.

use crate::errors::ContextError;

/// Process-group view used by the phase controllers.
pub trait ExecutionContext {
    /// Rank of the calling process within the group.
    fn rank(&self) -> i32;

    /// Number of processes in the group.
    fn size(&self) -> i32;

    /// Whether collective operations are live.
    fn is_parallel(&self) -> bool;

    /// Block until every rank reaches this point. No-op when serial.
    fn barrier(&self);

    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Single-process context.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialContext;

impl ExecutionContext for SerialContext {
    fn rank(&self) -> i32 {
        0
    }

    fn size(&self) -> i32 {
        1
    }

    fn is_parallel(&self) -> bool {
        false
    }

    fn barrier(&self) {}
}

#[cfg(feature = "mpi")]
pub use self::mpi_group::MpiContext;

#[cfg(feature = "mpi")]
mod mpi_group {
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    use super::ExecutionContext;
    use crate::errors::ContextError;

    /// MPI world communicator. Finalizes MPI when dropped.
    pub struct MpiContext {
        world: SimpleCommunicator,
        // Dropped last so the communicator never outlives the environment.
        _universe: Universe,
    }

    impl MpiContext {
        pub fn initialize() -> Result<Self, ContextError> {
            let universe = mpi::initialize().ok_or(ContextError::GroupInitFailed)?;
            let world = universe.world();
            Ok(Self {
                world,
                _universe: universe,
            })
        }
    }

    impl ExecutionContext for MpiContext {
        fn rank(&self) -> i32 {
            self.world.rank()
        }

        fn size(&self) -> i32 {
            self.world.size()
        }

        fn is_parallel(&self) -> bool {
            true
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

/// Resolve the execution context for this process.
pub fn resolve(requested_parallel: bool) -> Result<Box<dyn ExecutionContext>, ContextError> {
    if !requested_parallel {
        tracing::debug!("serial execution context");
        return Ok(Box::new(SerialContext));
    }
    resolve_parallel()
}

#[cfg(feature = "mpi")]
fn resolve_parallel() -> Result<Box<dyn ExecutionContext>, ContextError> {
    let ctx = MpiContext::initialize()?;
    tracing::debug!(rank = ctx.rank(), size = ctx.size(), "MPI execution context");
    Ok(Box::new(ctx))
}

#[cfg(not(feature = "mpi"))]
fn resolve_parallel() -> Result<Box<dyn ExecutionContext>, ContextError> {
    Err(ContextError::ParallelUnsupported)
}
