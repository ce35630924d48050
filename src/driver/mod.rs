//! Capability contract for the external solver.
//!
//! The numerical engine is opaque to this crate. `SolverDriver` covers the
//! direct and adjoint solves plus boundary accounting, `ErrorEstimator`
//! covers metric computation on a finished adjoint state, and
//! `DriverBackend` constructs both. An estimator mutably borrows the driver
//! it was built from, so it can never outlive it.

pub mod synthetic;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::errors::DriverError;

pub use synthetic::{SyntheticBackend, SyntheticDriver, SyntheticEstimator};

/// Rank-local boundary marker index.
///
/// Only meaningful on the rank that resolved it, so it is intentionally
/// neither `Serialize` nor convertible from a bare integer outside the
/// driver implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(usize);

impl MarkerId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution mode a solver build supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Serial,
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Serial => write!(f, "serial"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Driver flavour requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverVariant {
    /// Single-zone discrete adjoint (default)
    #[default]
    DiscAdjSingleZone,
    /// Fluid-structure interaction
    Fsi,
    /// Finite-element general driver
    Fem,
    /// Harmonic balance
    HarmonicBalance,
}

impl fmt::Display for DriverVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverVariant::DiscAdjSingleZone => write!(f, "disc-adj-single-zone"),
            DriverVariant::Fsi => write!(f, "fsi"),
            DriverVariant::Fem => write!(f, "fem"),
            DriverVariant::HarmonicBalance => write!(f, "harmonic-balance"),
        }
    }
}

impl std::str::FromStr for DriverVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "disc-adj-single-zone" | "disc-adj" | "single-zone" => {
                Ok(DriverVariant::DiscAdjSingleZone)
            }
            "fsi" => Ok(DriverVariant::Fsi),
            "fem" => Ok(DriverVariant::Fem),
            "harmonic-balance" | "hb" => Ok(DriverVariant::HarmonicBalance),
            _ => anyhow::bail!(
                "Invalid driver variant '{}'. Valid values: disc-adj-single-zone, fsi, fem, harmonic-balance",
                s
            ),
        }
    }
}

/// Index triple for local point queries.
///
/// Always `(0, 0, 0)` in the current workflow: a single zone, the current
/// time level and the finest mesh level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointQuery {
    pub zone: usize,
    pub time_level: usize,
    pub mesh_level: usize,
}

/// Direct and adjoint solve capabilities.
pub trait SolverDriver {
    /// Every boundary tag in the global mesh.
    fn all_boundary_tags(&self) -> Result<BTreeSet<String>, DriverError>;

    /// Boundary tags with at least one vertex on this rank.
    fn rank_local_markers(&self) -> Result<BTreeMap<String, MarkerId>, DriverError>;

    /// Physical plus halo vertices of a marker on this rank.
    fn vertex_count(&self, marker: MarkerId) -> Result<usize, DriverError>;

    fn halo_vertex_count(&self, marker: MarkerId) -> Result<usize, DriverError>;

    fn current_iteration(&self) -> Result<u64, DriverError>;

    fn target_iterations(&self) -> Result<u64, DriverError>;

    /// One forward-solve step. Returns the stop signal.
    fn direct_step(&mut self, iteration: u64) -> Result<bool, DriverError>;

    fn preprocess(&mut self, iteration: u64) -> Result<(), DriverError>;

    fn advance(&mut self) -> Result<(), DriverError>;

    fn postprocess(&mut self) -> Result<(), DriverError>;

    fn update(&mut self) -> Result<(), DriverError>;

    /// Returns the stop signal for the adjoint iteration.
    fn monitor(&mut self, iteration: u64) -> Result<bool, DriverError>;

    fn output(&mut self, iteration: u64) -> Result<(), DriverError>;

    /// Release solver resources. Called once on the success path.
    fn finalize(&mut self) -> Result<(), DriverError>;
}

/// Metric computation on a converged adjoint state.
pub trait ErrorEstimator {
    fn compute_metric(&mut self) -> Result<(), DriverError>;

    /// Pack the metric and auxiliary fields into per-point, per-variable form.
    fn set_adaptation_data(&mut self) -> Result<(), DriverError>;

    /// Physical plus halo points on this rank.
    fn local_point_count(&self, query: PointQuery) -> Result<usize, DriverError>;

    fn variable_count(&self) -> Result<usize, DriverError>;

    fn adaptation_value(&self, var: usize, point: usize) -> Result<f64, DriverError>;

    /// Fetch a whole row into `row`. Backends with bulk access may override.
    fn adaptation_row(&self, point: usize, row: &mut [f64]) -> Result<(), DriverError> {
        for (var, slot) in row.iter_mut().enumerate() {
            *slot = self.adaptation_value(var, point)?;
        }
        Ok(())
    }
}

/// Constructs drivers for one run.
pub trait DriverBackend {
    type Driver: SolverDriver;
    type Estimator<'a>: ErrorEstimator
    where
        Self: 'a,
        Self::Driver: 'a;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn create_driver(
        &self,
        config: &RunConfig,
        ctx: &dyn ExecutionContext,
    ) -> Result<Self::Driver, DriverError>;

    /// Build the error-estimation driver on top of a finished adjoint solve.
    fn create_estimator<'a>(
        &'a self,
        driver: &'a mut Self::Driver,
        config: &RunConfig,
        ctx: &dyn ExecutionContext,
    ) -> Result<Self::Estimator<'a>, DriverError>;
}

/// Check the requested execution mode against what the solver was built for.
pub fn check_compatibility(
    build: ExecutionMode,
    ctx: &dyn ExecutionContext,
) -> Result<(), crate::errors::CompatibilityError> {
    use crate::errors::CompatibilityError;

    match (ctx.is_parallel(), build) {
        (true, ExecutionMode::Serial) => Err(CompatibilityError::ParallelOnSerialBuild),
        (false, ExecutionMode::Parallel) => Err(CompatibilityError::SerialOnParallelBuild),
        _ => Ok(()),
    }
}
