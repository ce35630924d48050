//! Error-estimation phase.
//!
//! The estimator must see `compute_metric`, then `set_adaptation_data`,
//! before any value is read back. The sequence is encoded as a typestate:
//! extraction is only reachable from [`AdaptationDataReady`], which only
//! [`MetricComputed::pack`] can produce.

use std::time::{Duration, Instant};

use super::PhaseObserver;
use crate::dataset::AdaptationDataset;
use crate::driver::{ErrorEstimator, PointQuery};
use crate::errors::DriverError;

/// Metric computed, adaptation data not yet packed.
struct MetricComputed<'e, E: ErrorEstimator + ?Sized> {
    estimator: &'e mut E,
}

impl<'e, E: ErrorEstimator + ?Sized> MetricComputed<'e, E> {
    fn compute(estimator: &'e mut E) -> Result<Self, DriverError> {
        estimator.compute_metric()?;
        tracing::debug!("error metric computed");
        Ok(Self { estimator })
    }

    fn pack(self) -> Result<AdaptationDataReady<'e, E>, DriverError> {
        self.estimator.set_adaptation_data()?;
        tracing::debug!("adaptation data packed");
        Ok(AdaptationDataReady {
            estimator: self.estimator,
        })
    }
}

/// Adaptation data packed; values may be read.
struct AdaptationDataReady<'e, E: ErrorEstimator + ?Sized> {
    estimator: &'e E,
}

impl<E: ErrorEstimator + ?Sized> AdaptationDataReady<'_, E> {
    fn extract(&self) -> Result<AdaptationDataset, DriverError> {
        let points = self.estimator.local_point_count(PointQuery::default())?;
        let variables = self.estimator.variable_count()?;
        tracing::debug!(points, variables, "extracting adaptation data");
        AdaptationDataset::assemble(self.estimator, points, variables)
    }
}

/// Result of the error-estimation phase.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationReport {
    pub dataset: AdaptationDataset,
    pub elapsed: Duration,
}

impl EstimationReport {
    pub fn points(&self) -> usize {
        self.dataset.points()
    }

    pub fn variables(&self) -> usize {
        self.dataset.variables()
    }
}

pub struct EstimationController<'o> {
    observer: &'o dyn PhaseObserver,
}

impl<'o> EstimationController<'o> {
    pub fn new(observer: &'o dyn PhaseObserver) -> Self {
        Self { observer }
    }

    /// Compute the metric, pack it and read back the full local dataset.
    /// The controller performs no output; rendering is left to the caller.
    pub fn run<E: ErrorEstimator + ?Sized>(
        &self,
        estimator: &mut E,
    ) -> Result<EstimationReport, DriverError> {
        let start = Instant::now();
        let _span = tracing::info_span!("estimation").entered();

        let ready = MetricComputed::compute(estimator)?.pack()?;
        let dataset = ready.extract()?;

        let (points, variables) = dataset.shape();
        tracing::info!(points, variables, "error estimation finished");
        let report = EstimationReport {
            dataset,
            elapsed: start.elapsed(),
        };
        self.observer.estimation_finished(&report);
        Ok(report)
    }
}
