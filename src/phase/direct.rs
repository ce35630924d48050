//! Forward-solve loop.

use std::time::Instant;

use super::{Phase, PhaseObserver, PhaseOutcome, PhaseReport};
use crate::driver::SolverDriver;
use crate::errors::DriverError;

/// Drives `direct_step` from the driver's current iteration up to its
/// target, leaving early as soon as a step raises the stop signal.
pub struct DirectController<'o> {
    observer: &'o dyn PhaseObserver,
}

impl<'o> DirectController<'o> {
    pub fn new(observer: &'o dyn PhaseObserver) -> Self {
        Self { observer }
    }

    /// Run the phase. Driver errors propagate unchanged; there are no retries.
    pub fn run<D: SolverDriver + ?Sized>(&self, driver: &mut D) -> Result<PhaseReport, DriverError> {
        let start = Instant::now();
        let first_iteration = driver.current_iteration()?;
        let target_iteration = driver.target_iterations()?;
        self.observer
            .phase_started(Phase::Direct, first_iteration, target_iteration);

        let _span = tracing::info_span!("direct", first_iteration, target_iteration).entered();

        let mut iteration = first_iteration;
        let mut steps = 0;
        let mut stopped_at = None;
        while iteration < target_iteration {
            let stop = driver.direct_step(iteration)?;
            steps += 1;
            self.observer.iteration_finished(Phase::Direct, iteration, stop);
            if stop {
                tracing::info!(iteration, "direct solve requested stop");
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
            phase: Phase::Direct,
            outcome,
            first_iteration,
            target_iteration,
            steps,
            stopped_at,
            elapsed: start.elapsed(),
        };
        tracing::info!(steps, %outcome, "direct phase finished");
        self.observer.phase_finished(&report);
        Ok(report)
    }
}
