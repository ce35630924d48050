//! Deterministic in-process solver backend.
//!
//! Models each solve as a geometric residual decay and the mesh as the
//! marker table of the case file. Used by the CLI when no external solver
//! is linked, and by the integration tests.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    DriverBackend, DriverVariant, ErrorEstimator, MarkerId, PointQuery, SolverDriver,
    check_compatibility,
};
use crate::adapt_config::{CaseSection, MarkerSpec};
use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::errors::DriverError;

/// Next adjoint call the driver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdjointCall {
    Preprocess,
    Advance,
    Postprocess,
    Update,
    Monitor,
    Output,
}

impl AdjointCall {
    fn name(self) -> &'static str {
        match self {
            AdjointCall::Preprocess => "preprocess",
            AdjointCall::Advance => "advance",
            AdjointCall::Postprocess => "postprocess",
            AdjointCall::Update => "update",
            AdjointCall::Monitor => "monitor",
            AdjointCall::Output => "output",
        }
    }

    fn next(self) -> Self {
        match self {
            AdjointCall::Preprocess => AdjointCall::Advance,
            AdjointCall::Advance => AdjointCall::Postprocess,
            AdjointCall::Postprocess => AdjointCall::Update,
            AdjointCall::Update => AdjointCall::Monitor,
            AdjointCall::Monitor => AdjointCall::Output,
            AdjointCall::Output => AdjointCall::Preprocess,
        }
    }
}

#[derive(Debug)]
pub struct SyntheticDriver {
    rank: i32,
    variables: usize,
    case: CaseSection,
    markers: Vec<MarkerSpec>,
    direct_residual: f64,
    direct_steps: u64,
    adjoint_residual: f64,
    adjoint_steps: u64,
    expected: AdjointCall,
    adjoint_iteration: Option<u64>,
    outputs: Vec<u64>,
    finalized: bool,
}

impl SyntheticDriver {
    pub fn new(case: &CaseSection, dimension: u8, rank: i32) -> Self {
        Self {
            rank,
            variables: case.variable_count(dimension),
            markers: case.markers.clone(),
            direct_residual: case.direct.initial_residual,
            direct_steps: 0,
            adjoint_residual: case.adjoint.initial_residual,
            adjoint_steps: 0,
            expected: AdjointCall::Preprocess,
            adjoint_iteration: None,
            outputs: Vec::new(),
            finalized: false,
            case: case.clone(),
        }
    }

    pub fn direct_residual(&self) -> f64 {
        self.direct_residual
    }

    pub fn adjoint_residual(&self) -> f64 {
        self.adjoint_residual
    }

    /// Number of completed adjoint iterations.
    pub fn adjoint_steps(&self) -> u64 {
        self.adjoint_steps
    }

    /// Iterations for which a solution output was written.
    pub fn outputs(&self) -> &[u64] {
        &self.outputs
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn marker(&self, marker: MarkerId) -> Result<&MarkerSpec, DriverError> {
        self.markers
            .get(marker.index())
            .filter(|spec| spec.is_local_to(self.rank))
            .ok_or(DriverError::UnknownMarker(marker.index()))
    }

    fn ensure_live(&self, operation: &'static str) -> Result<(), DriverError> {
        if self.finalized {
            return Err(DriverError::invalid_state(operation, "driver already finalized"));
        }
        Ok(())
    }

    fn enter(&mut self, call: AdjointCall) -> Result<(), DriverError> {
        self.ensure_live(call.name())?;
        if self.expected != call {
            return Err(DriverError::invalid_state(
                call.name(),
                format!("expected {} next", self.expected.name()),
            ));
        }
        self.expected = call.next();
        Ok(())
    }

    fn check_iteration(&self, operation: &'static str, iteration: u64) -> Result<(), DriverError> {
        match self.adjoint_iteration {
            Some(current) if current == iteration => Ok(()),
            Some(current) => Err(DriverError::invalid_state(
                operation,
                format!("iteration {iteration} does not match preprocessed iteration {current}"),
            )),
            None => Err(DriverError::invalid_state(operation, "no iteration preprocessed")),
        }
    }
}

impl SolverDriver for SyntheticDriver {
    fn all_boundary_tags(&self) -> Result<BTreeSet<String>, DriverError> {
        Ok(self.markers.iter().map(|m| m.name.clone()).collect())
    }

    fn rank_local_markers(&self) -> Result<BTreeMap<String, MarkerId>, DriverError> {
        Ok(self
            .markers
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.is_local_to(self.rank))
            .map(|(index, spec)| (spec.name.clone(), MarkerId::new(index)))
            .collect())
    }

    fn vertex_count(&self, marker: MarkerId) -> Result<usize, DriverError> {
        Ok(self.marker(marker)?.vertices)
    }

    fn halo_vertex_count(&self, marker: MarkerId) -> Result<usize, DriverError> {
        Ok(self.marker(marker)?.halo)
    }

    fn current_iteration(&self) -> Result<u64, DriverError> {
        Ok(self.case.start_iteration)
    }

    fn target_iterations(&self) -> Result<u64, DriverError> {
        Ok(self.case.iterations)
    }

    fn direct_step(&mut self, iteration: u64) -> Result<bool, DriverError> {
        self.ensure_live("direct step")?;
        if self.case.diverge_at == Some(iteration) {
            return Err(DriverError::Solver(format!(
                "direct residual diverged at iteration {iteration}"
            )));
        }
        self.direct_residual *= self.case.direct.rate;
        self.direct_steps += 1;
        Ok(self.direct_residual < self.case.direct.tolerance)
    }

    fn preprocess(&mut self, iteration: u64) -> Result<(), DriverError> {
        if self.direct_steps == 0 {
            return Err(DriverError::invalid_state(
                "preprocess",
                "no direct solution available for the adjoint",
            ));
        }
        self.enter(AdjointCall::Preprocess)?;
        self.adjoint_iteration = Some(iteration);
        Ok(())
    }

    fn advance(&mut self) -> Result<(), DriverError> {
        self.enter(AdjointCall::Advance)?;
        self.adjoint_residual *= self.case.adjoint.rate;
        Ok(())
    }

    fn postprocess(&mut self) -> Result<(), DriverError> {
        self.enter(AdjointCall::Postprocess)
    }

    fn update(&mut self) -> Result<(), DriverError> {
        self.enter(AdjointCall::Update)?;
        self.adjoint_steps += 1;
        Ok(())
    }

    fn monitor(&mut self, iteration: u64) -> Result<bool, DriverError> {
        self.enter(AdjointCall::Monitor)?;
        self.check_iteration("monitor", iteration)?;
        Ok(self.adjoint_residual < self.case.adjoint.tolerance)
    }

    fn output(&mut self, iteration: u64) -> Result<(), DriverError> {
        self.enter(AdjointCall::Output)?;
        self.check_iteration("output", iteration)?;
        self.outputs.push(iteration);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), DriverError> {
        self.ensure_live("finalize")?;
        self.finalized = true;
        Ok(())
    }
}

/// Error-estimation driver bound to a finished [`SyntheticDriver`].
#[derive(Debug)]
pub struct SyntheticEstimator<'a> {
    driver: &'a mut SyntheticDriver,
    /// Variable-major metric, `variables * points`.
    metric: Option<Vec<f64>>,
    /// Point-major packed adaptation data.
    packed: Option<Vec<f64>>,
}

impl<'a> SyntheticEstimator<'a> {
    fn new(driver: &'a mut SyntheticDriver) -> Self {
        Self {
            driver,
            metric: None,
            packed: None,
        }
    }

    fn points(&self) -> usize {
        self.driver.case.points
    }

    fn packed(&self, operation: &'static str) -> Result<&[f64], DriverError> {
        self.packed
            .as_deref()
            .ok_or_else(|| DriverError::invalid_state(operation, "adaptation data not set"))
    }
}

impl ErrorEstimator for SyntheticEstimator<'_> {
    fn compute_metric(&mut self) -> Result<(), DriverError> {
        let points = self.points();
        let vars = self.driver.variables;
        // Smaller adjoint residuals give sharper sensors.
        let scale = 1.0 / (1.0 + self.driver.adjoint_residual);

        let mut metric = Vec::with_capacity(points * vars);
        for var in 0..vars {
            for point in 0..points {
                let sensor = (point as f64 + 1.0) / points as f64;
                metric.push((var as f64 + 1.0) * sensor * scale);
            }
        }
        self.metric = Some(metric);
        self.packed = None;
        Ok(())
    }

    fn set_adaptation_data(&mut self) -> Result<(), DriverError> {
        let metric = self.metric.as_ref().ok_or_else(|| {
            DriverError::invalid_state("set adaptation data", "metric not computed")
        })?;
        let points = self.driver.case.points;
        let vars = self.driver.variables;

        let mut packed = vec![0.0; points * vars];
        for var in 0..vars {
            for point in 0..points {
                packed[point * vars + var] = metric[var * points + point];
            }
        }
        self.packed = Some(packed);
        Ok(())
    }

    fn local_point_count(&self, query: PointQuery) -> Result<usize, DriverError> {
        if query != PointQuery::default() {
            return Err(DriverError::Config(format!(
                "only zone 0, time level 0, mesh level 0 exist (asked for {query:?})"
            )));
        }
        Ok(self.points())
    }

    fn variable_count(&self) -> Result<usize, DriverError> {
        Ok(self.driver.variables)
    }

    fn adaptation_value(&self, var: usize, point: usize) -> Result<f64, DriverError> {
        let vars = self.driver.variables;
        if var >= vars || point >= self.points() {
            return Err(DriverError::OutOfRange { var, point });
        }
        Ok(self.packed("adaptation value")?[point * vars + var])
    }

    fn adaptation_row(&self, point: usize, row: &mut [f64]) -> Result<(), DriverError> {
        let vars = self.driver.variables;
        if point >= self.points() || row.len() != vars {
            return Err(DriverError::OutOfRange {
                var: row.len(),
                point,
            });
        }
        row.copy_from_slice(&self.packed("adaptation row")?[point * vars..(point + 1) * vars]);
        Ok(())
    }
}

/// Backend constructing [`SyntheticDriver`]s from the case file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticBackend;

impl DriverBackend for SyntheticBackend {
    type Driver = SyntheticDriver;
    type Estimator<'a> = SyntheticEstimator<'a>;

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn create_driver(
        &self,
        config: &RunConfig,
        ctx: &dyn ExecutionContext,
    ) -> Result<SyntheticDriver, DriverError> {
        if config.variant != DriverVariant::DiscAdjSingleZone {
            return Err(DriverError::UnsupportedVariant {
                variant: config.variant.to_string(),
                backend: self.name().to_string(),
            });
        }
        check_compatibility(config.case().build, ctx)?;
        if config.zones > 1 {
            tracing::warn!(
                zones = config.zones,
                "single-zone driver ignores zones beyond zone 0"
            );
        }
        Ok(SyntheticDriver::new(config.case(), config.dimension, ctx.rank()))
    }

    fn create_estimator<'a>(
        &'a self,
        driver: &'a mut SyntheticDriver,
        config: &RunConfig,
        ctx: &dyn ExecutionContext,
    ) -> Result<SyntheticEstimator<'a>, DriverError> {
        check_compatibility(config.case().build, ctx)?;
        driver.ensure_live("error estimation")?;
        if driver.adjoint_steps == 0 {
            return Err(DriverError::invalid_state(
                "error estimation",
                "no adjoint solution; the adjoint phase ran no iterations",
            ));
        }
        Ok(SyntheticEstimator::new(driver))
    }
}
