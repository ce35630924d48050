//! Typed error hierarchy for the adaptation workflow.
//!
//! One enum per subsystem:
//! - `ContextError`: process-group initialization
//! - `CompatibilityError`: execution mode vs. solver build mismatch
//! - `DriverError`: failures reported by (or about) the solver driver
//! - `BoundaryError`: inconsistent boundary accounting from the driver
//! - `OrchestratorError`: phase-labelled top-level failures

use thiserror::Error;

use crate::phase::Phase;

/// Errors raised while resolving the execution context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error(
        "Parallel execution was requested but this build has no process-group support. Rebuild with `--features mpi` or drop --parallel."
    )]
    ParallelUnsupported,

    #[error("Parallel execution was requested but the process group could not be initialized")]
    GroupInitFailed,
}

/// Mismatch between the requested execution mode and the solver build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompatibilityError {
    #[error(
        "You are trying to initialize a process group with a serial build of the solver. Remove the --parallel option, it is incompatible with a serial build."
    )]
    ParallelOnSerialBuild,

    #[error(
        "You are trying to launch a computation without a process group but the solver was built for parallel execution. Add the --parallel option."
    )]
    SerialOnParallelBuild,
}

/// Errors from the solver driver collaborator.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Incompatible(#[from] CompatibilityError),

    #[error("Driver variant '{variant}' is not supported by the {backend} backend")]
    UnsupportedVariant { variant: String, backend: String },

    #[error("Invalid driver configuration: {0}")]
    Config(String),

    #[error("Driver is not in a valid state for {operation}: {message}")]
    InvalidState {
        operation: &'static str,
        message: String,
    },

    #[error("Unknown marker id {0}")]
    UnknownMarker(usize),

    #[error("Adaptation value ({var}, {point}) is out of range")]
    OutOfRange { var: usize, point: usize },

    #[error("Solver failure: {0}")]
    Solver(String),
}

impl DriverError {
    pub fn invalid_state(operation: &'static str, message: impl Into<String>) -> Self {
        DriverError::InvalidState {
            operation,
            message: message.into(),
        }
    }
}

/// Contradictory boundary values reported by the driver.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("Marker '{name}' reports {halo} halo vertices but only {total} vertices in total")]
    HaloExceedsTotal {
        name: String,
        total: usize,
        halo: usize,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Top-level failures. Every variant names the phase that failed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("[{phase}] {source}")]
    Context {
        phase: Phase,
        #[source]
        source: ContextError,
    },

    #[error("[{phase}] Failed to construct the {what}: {source}")]
    Construction {
        phase: Phase,
        what: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("[{phase}] {source}")]
    Driver {
        phase: Phase,
        #[source]
        source: DriverError,
    },

    #[error("[{phase}] Inconsistent boundary data: {source}")]
    Boundary {
        phase: Phase,
        #[source]
        source: BoundaryError,
    },
}

impl OrchestratorError {
    /// The phase in which the run aborted.
    pub fn phase(&self) -> Phase {
        match self {
            OrchestratorError::Context { phase, .. }
            | OrchestratorError::Construction { phase, .. }
            | OrchestratorError::Driver { phase, .. }
            | OrchestratorError::Boundary { phase, .. } => *phase,
        }
    }

    /// True for the configuration-compatibility category.
    pub fn is_compatibility(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Construction {
                source: DriverError::Incompatible(_),
                ..
            }
        )
    }
}
