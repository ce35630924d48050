use std::time::Instant;

use crate::boundary::{MarkerResolution, resolve_marker};
use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::driver::{DriverBackend, SolverDriver};
use crate::errors::OrchestratorError;
use crate::phase::{
    AdjointController, DirectController, EstimationController, EstimationReport, Phase,
    PhaseObserver, PhaseReport,
};

/// Everything a successful run produced on this rank.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub rank: i32,
    pub size: i32,
    pub marker: MarkerResolution,
    pub direct: PhaseReport,
    pub adjoint: PhaseReport,
    pub estimation: EstimationReport,
}

/// Sequences the three phases against one backend.
///
/// ```text
/// Setup -> Direct -> Adjoint -> ErrorEstimation -> Teardown
/// ```
///
/// The direct driver lives for the whole run. The error-estimation driver
/// borrows it and is dropped before the direct driver is finalized.
pub struct Orchestrator<B: DriverBackend> {
    backend: B,
}

impl<B: DriverBackend> Orchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run every phase in order under an already resolved context.
    ///
    /// The first failure aborts the run; later phases never start and the
    /// driver is not finalized.
    pub fn run(
        &self,
        config: &RunConfig,
        ctx: &dyn ExecutionContext,
        observer: &dyn PhaseObserver,
    ) -> Result<RunOutcome, OrchestratorError> {
        let start = Instant::now();
        let _span = tracing::info_span!(
            "run",
            backend = self.backend.name(),
            rank = ctx.rank(),
            size = ctx.size()
        )
        .entered();
        tracing::info!(
            variant = %config.variant,
            dimension = config.dimension,
            zones = config.zones,
            parallel = ctx.is_parallel(),
            "starting adaptation run"
        );

        let mut driver = self.backend.create_driver(config, ctx).map_err(|source| {
            OrchestratorError::Construction {
                phase: Phase::Setup,
                what: "solver driver",
                source,
            }
        })?;

        let marker =
            resolve_marker(&driver, &config.marker).map_err(|source| OrchestratorError::Boundary {
                phase: Phase::Setup,
                source,
            })?;
        let counts = marker.counts();
        tracing::info!(
            marker = marker.name(),
            present = marker.is_present(),
            total = counts.total,
            halo = counts.halo,
            physical = counts.physical,
            "boundary marker"
        );

        open_phase(Phase::Direct, ctx, observer);
        let direct = DirectController::new(observer)
            .run(&mut driver)
            .map_err(|source| OrchestratorError::Driver {
                phase: Phase::Direct,
                source,
            })?;

        open_phase(Phase::Adjoint, ctx, observer);
        let adjoint = AdjointController::new(observer)
            .run(&mut driver)
            .map_err(|source| OrchestratorError::Driver {
                phase: Phase::Adjoint,
                source,
            })?;

        let estimation = {
            let mut estimator = self
                .backend
                .create_estimator(&mut driver, config, ctx)
                .map_err(|source| OrchestratorError::Construction {
                    phase: Phase::ErrorEstimation,
                    what: "error-estimation driver",
                    source,
                })?;
            open_phase(Phase::ErrorEstimation, ctx, observer);
            EstimationController::new(observer)
                .run(&mut estimator)
                .map_err(|source| OrchestratorError::Driver {
                    phase: Phase::ErrorEstimation,
                    source,
                })?
        };

        driver.finalize().map_err(|source| OrchestratorError::Driver {
            phase: Phase::Teardown,
            source,
        })?;

        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "run finished");
        Ok(RunOutcome {
            rank: ctx.rank(),
            size: ctx.size(),
            marker,
            direct,
            adjoint,
            estimation,
        })
    }
}

/// Banner on the root rank, then a barrier so no rank starts early.
fn open_phase(phase: Phase, ctx: &dyn ExecutionContext, observer: &dyn PhaseObserver) {
    if ctx.is_root() {
        observer.banner(phase);
    }
    ctx.barrier();
}
