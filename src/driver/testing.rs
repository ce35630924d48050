//! Call-recording test doubles for the driver contract.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use super::{DriverBackend, ErrorEstimator, MarkerId, PointQuery, SolverDriver};
use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::errors::{CompatibilityError, DriverError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    DirectStep(u64),
    Preprocess(u64),
    Advance,
    Postprocess,
    Update,
    Monitor(u64),
    Output(u64),
    Finalize,
    CreateEstimator,
    ComputeMetric,
    SetAdaptationData,
    AdaptationValue { var: usize, point: usize },
    Barrier,
}

pub(crate) type CallLog = Rc<RefCell<Vec<Call>>>;

/// Parallel-looking context that records barriers.
pub(crate) struct ParallelTestContext {
    rank: i32,
    pub barriers: Cell<usize>,
    log: Option<CallLog>,
}

impl ParallelTestContext {
    pub fn new(rank: i32) -> Self {
        Self {
            rank,
            barriers: Cell::new(0),
            log: None,
        }
    }

    pub fn with_log(rank: i32, log: CallLog) -> Self {
        Self {
            rank,
            barriers: Cell::new(0),
            log: Some(log),
        }
    }
}

impl ExecutionContext for ParallelTestContext {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn size(&self) -> i32 {
        2
    }

    fn is_parallel(&self) -> bool {
        true
    }

    fn barrier(&self) {
        self.barriers.set(self.barriers.get() + 1);
        if let Some(log) = &self.log {
            log.borrow_mut().push(Call::Barrier);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedDriver {
    pub tags: BTreeSet<String>,
    pub local: BTreeMap<String, MarkerId>,
    /// marker index -> (total, halo)
    pub vertices: HashMap<usize, (usize, usize)>,
    pub current: u64,
    pub target: u64,
    pub direct_stop_at: Option<u64>,
    pub adjoint_stop_at: Option<u64>,
    pub fail_direct_at: Option<u64>,
    /// point-major adaptation values
    pub values: Vec<Vec<f64>>,
    pub vars: usize,
    pub log: CallLog,
}

impl ScriptedDriver {
    pub fn new(current: u64, target: u64) -> Self {
        Self {
            tags: BTreeSet::new(),
            local: BTreeMap::new(),
            vertices: HashMap::new(),
            current,
            target,
            direct_stop_at: None,
            adjoint_stop_at: None,
            fail_direct_at: None,
            values: Vec::new(),
            vars: 0,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Marker present in the global tag set and, if `local`, on this rank.
    pub fn with_marker(mut self, name: &str, total: usize, halo: usize, local: bool) -> Self {
        let id = MarkerId::new(self.tags.len());
        self.tags.insert(name.to_string());
        if local {
            self.local.insert(name.to_string(), id);
        }
        self.vertices.insert(id.index(), (total, halo));
        self
    }

    pub fn with_values(mut self, values: Vec<Vec<f64>>) -> Self {
        self.vars = values.first().map_or(0, Vec::len);
        self.values = values;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }
}

impl SolverDriver for ScriptedDriver {
    fn all_boundary_tags(&self) -> Result<BTreeSet<String>, DriverError> {
        Ok(self.tags.clone())
    }

    fn rank_local_markers(&self) -> Result<BTreeMap<String, MarkerId>, DriverError> {
        Ok(self.local.clone())
    }

    fn vertex_count(&self, marker: MarkerId) -> Result<usize, DriverError> {
        self.vertices
            .get(&marker.index())
            .map(|(total, _)| *total)
            .ok_or(DriverError::UnknownMarker(marker.index()))
    }

    fn halo_vertex_count(&self, marker: MarkerId) -> Result<usize, DriverError> {
        self.vertices
            .get(&marker.index())
            .map(|(_, halo)| *halo)
            .ok_or(DriverError::UnknownMarker(marker.index()))
    }

    fn current_iteration(&self) -> Result<u64, DriverError> {
        Ok(self.current)
    }

    fn target_iterations(&self) -> Result<u64, DriverError> {
        Ok(self.target)
    }

    fn direct_step(&mut self, iteration: u64) -> Result<bool, DriverError> {
        self.record(Call::DirectStep(iteration));
        if self.fail_direct_at == Some(iteration) {
            return Err(DriverError::Solver(format!("diverged at {iteration}")));
        }
        Ok(self.direct_stop_at == Some(iteration))
    }

    fn preprocess(&mut self, iteration: u64) -> Result<(), DriverError> {
        self.record(Call::Preprocess(iteration));
        Ok(())
    }

    fn advance(&mut self) -> Result<(), DriverError> {
        self.record(Call::Advance);
        Ok(())
    }

    fn postprocess(&mut self) -> Result<(), DriverError> {
        self.record(Call::Postprocess);
        Ok(())
    }

    fn update(&mut self) -> Result<(), DriverError> {
        self.record(Call::Update);
        Ok(())
    }

    fn monitor(&mut self, iteration: u64) -> Result<bool, DriverError> {
        self.record(Call::Monitor(iteration));
        Ok(self.adjoint_stop_at == Some(iteration))
    }

    fn output(&mut self, iteration: u64) -> Result<(), DriverError> {
        self.record(Call::Output(iteration));
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), DriverError> {
        self.record(Call::Finalize);
        Ok(())
    }
}

pub(crate) struct ScriptedEstimator<'a> {
    driver: &'a mut ScriptedDriver,
}

impl<'a> ScriptedEstimator<'a> {
    pub fn new(driver: &'a mut ScriptedDriver) -> Self {
        Self { driver }
    }
}

impl ErrorEstimator for ScriptedEstimator<'_> {
    fn compute_metric(&mut self) -> Result<(), DriverError> {
        self.driver.record(Call::ComputeMetric);
        Ok(())
    }

    fn set_adaptation_data(&mut self) -> Result<(), DriverError> {
        self.driver.record(Call::SetAdaptationData);
        Ok(())
    }

    fn local_point_count(&self, _query: PointQuery) -> Result<usize, DriverError> {
        Ok(self.driver.values.len())
    }

    fn variable_count(&self) -> Result<usize, DriverError> {
        Ok(self.driver.vars)
    }

    fn adaptation_value(&self, var: usize, point: usize) -> Result<f64, DriverError> {
        self.driver.record(Call::AdaptationValue { var, point });
        self.driver
            .values
            .get(point)
            .and_then(|row| row.get(var))
            .copied()
            .ok_or(DriverError::OutOfRange { var, point })
    }
}

/// Backend handing out clones of a scripted driver.
pub(crate) struct ScriptedBackend {
    pub template: ScriptedDriver,
    pub fail_driver: Option<CompatibilityError>,
    pub fail_estimator: Option<CompatibilityError>,
}

impl ScriptedBackend {
    pub fn new(template: ScriptedDriver) -> Self {
        Self {
            template,
            fail_driver: None,
            fail_estimator: None,
        }
    }

    pub fn log(&self) -> CallLog {
        Rc::clone(&self.template.log)
    }
}

impl DriverBackend for ScriptedBackend {
    type Driver = ScriptedDriver;
    type Estimator<'a> = ScriptedEstimator<'a>;

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn create_driver(
        &self,
        _config: &RunConfig,
        _ctx: &dyn ExecutionContext,
    ) -> Result<ScriptedDriver, DriverError> {
        match self.fail_driver {
            Some(err) => Err(err.into()),
            None => Ok(self.template.clone()),
        }
    }

    fn create_estimator<'a>(
        &'a self,
        driver: &'a mut ScriptedDriver,
        _config: &RunConfig,
        _ctx: &dyn ExecutionContext,
    ) -> Result<ScriptedEstimator<'a>, DriverError> {
        driver.record(Call::CreateEstimator);
        match self.fail_estimator {
            Some(err) => Err(err.into()),
            None => Ok(ScriptedEstimator::new(driver)),
        }
    }
}
