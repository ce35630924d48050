//! Adjoint-solve loop.
//!
//! Every iteration walks the same stage machine:
//!
//! ```text
//! Preprocess(i) -> Advance -> Postprocess -> Update -> Monitor(i) -> Output(i)
//! ```
//!
//! `Monitor` only latches the stop signal. The loop reads the latch after
//! `Output` has run, so the iteration that converges is always written out.

use std::fmt;
use std::time::Instant;

use super::{Phase, PhaseObserver, PhaseOutcome, PhaseReport};
use crate::driver::SolverDriver;
use crate::errors::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjointStage {
    Preprocess,
    Advance,
    Postprocess,
    Update,
    Monitor,
    Output,
}

impl AdjointStage {
    /// Stages of one iteration, in execution order.
    pub const PIPELINE: [AdjointStage; 6] = [
        AdjointStage::Preprocess,
        AdjointStage::Advance,
        AdjointStage::Postprocess,
        AdjointStage::Update,
        AdjointStage::Monitor,
        AdjointStage::Output,
    ];

    /// Following stage, or `None` after `Output`.
    pub fn next(self) -> Option<Self> {
        match self {
            AdjointStage::Preprocess => Some(AdjointStage::Advance),
            AdjointStage::Advance => Some(AdjointStage::Postprocess),
            AdjointStage::Postprocess => Some(AdjointStage::Update),
            AdjointStage::Update => Some(AdjointStage::Monitor),
            AdjointStage::Monitor => Some(AdjointStage::Output),
            AdjointStage::Output => None,
        }
    }
}

impl fmt::Display for AdjointStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdjointStage::Preprocess => "preprocess",
            AdjointStage::Advance => "advance",
            AdjointStage::Postprocess => "postprocess",
            AdjointStage::Update => "update",
            AdjointStage::Monitor => "monitor",
            AdjointStage::Output => "output",
        };
        f.write_str(name)
    }
}

/// State of one adjoint iteration.
#[derive(Debug)]
struct AdjointStep {
    iteration: u64,
    stage: AdjointStage,
    stop_requested: bool,
}

impl AdjointStep {
    fn new(iteration: u64) -> Self {
        Self {
            iteration,
            stage: AdjointStage::Preprocess,
            stop_requested: false,
        }
    }

    /// Execute every stage in order. Returns the latched stop signal.
    fn run<D: SolverDriver + ?Sized>(mut self, driver: &mut D) -> Result<bool, DriverError> {
        loop {
            tracing::trace!(iteration = self.iteration, stage = %self.stage, "adjoint stage");
            match self.stage {
                AdjointStage::Preprocess => driver.preprocess(self.iteration)?,
                AdjointStage::Advance => driver.advance()?,
                AdjointStage::Postprocess => driver.postprocess()?,
                AdjointStage::Update => driver.update()?,
                AdjointStage::Monitor => self.stop_requested = driver.monitor(self.iteration)?,
                AdjointStage::Output => driver.output(self.iteration)?,
            }
            match self.stage.next() {
                Some(next) => self.stage = next,
                None => return Ok(self.stop_requested),
            }
        }
    }
}

/// Drives the adjoint pipeline from the driver's current iteration up to
/// its target, leaving after the iteration whose monitor stage raised the
/// stop signal.
pub struct AdjointController<'o> {
    observer: &'o dyn PhaseObserver,
}

impl<'o> AdjointController<'o> {
    pub fn new(observer: &'o dyn PhaseObserver) -> Self {
        Self { observer }
    }

    pub fn run<D: SolverDriver + ?Sized>(&self, driver: &mut D) -> Result<PhaseReport, DriverError> {
        let start = Instant::now();
        let first_iteration = driver.current_iteration()?;
        let target_iteration = driver.target_iterations()?;
        self.observer
            .phase_started(Phase::Adjoint, first_iteration, target_iteration);

        let _span = tracing::info_span!("adjoint", first_iteration, target_iteration).entered();

        let mut iteration = first_iteration;
        let mut steps = 0;
        let mut stopped_at = None;
        while iteration < target_iteration {
            let stop = AdjointStep::new(iteration).run(driver)?;
            steps += 1;
            self.observer.iteration_finished(Phase::Adjoint, iteration, stop);
            if stop {
                tracing::info!(iteration, "adjoint monitor requested stop");
                stopped_at = Some(iteration);
                break;
            }
            iteration += 1;
        }

        let outcome = if stopped_at.is_some() {
            PhaseOutcome::Converged
        } else {
            PhaseOutcome::IterationLimitReached
        };
        let report = PhaseReport {
            phase: Phase::Adjoint,
            outcome,
            first_iteration,
            target_iteration,
            steps,
            stopped_at,
            elapsed: start.elapsed(),
        };
        tracing::info!(steps, %outcome, "adjoint phase finished");
        self.observer.phase_finished(&report);
        Ok(report)
    }
}
