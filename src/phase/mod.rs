//! Phase definitions and the per-phase controllers.
//!
//! This module provides:
//! - `Phase`, the label carried by every diagnostic
//! - `PhaseOutcome` / `PhaseReport`, the terminal state of an iterative phase
//! - `PhaseObserver`, the progress hook the controllers report through
//! - the direct, adjoint and error-estimation controllers

pub mod adjoint;
pub mod direct;
pub mod estimation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use adjoint::{AdjointController, AdjointStage};
pub use direct::DirectController;
pub use estimation::{EstimationController, EstimationReport};

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Context resolution and direct-driver construction
    Setup,
    /// Forward flow solve
    Direct,
    /// Discrete-adjoint solve
    Adjoint,
    /// Metric computation and adaptation-data extraction
    ErrorEstimation,
    /// Driver finalization
    Teardown,
}

impl Phase {
    /// Banner title printed on rank 0 before the phase starts.
    pub fn banner(&self) -> &'static str {
        match self {
            Phase::Setup => "Setup",
            Phase::Direct => "Begin Flow Solver",
            Phase::Adjoint => "Begin Adjoint Solver",
            Phase::ErrorEstimation => "Begin Error Estimation",
            Phase::Teardown => "Teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "setup"),
            Phase::Direct => write!(f, "direct"),
            Phase::Adjoint => write!(f, "adjoint"),
            Phase::ErrorEstimation => write!(f, "error estimation"),
            Phase::Teardown => write!(f, "teardown"),
        }
    }
}

/// Terminal state of an iterative phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseOutcome {
    /// The driver raised the stop signal.
    Converged,
    /// The iteration budget ran out (including an empty budget).
    IterationLimitReached,
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseOutcome::Converged => write!(f, "converged"),
            PhaseOutcome::IterationLimitReached => write!(f, "iteration limit reached"),
        }
    }
}

/// Summary of one iterative phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub outcome: PhaseOutcome,
    /// Driver counter at phase entry.
    pub first_iteration: u64,
    /// Driver target at phase entry.
    pub target_iteration: u64,
    /// Loop bodies executed.
    pub steps: u64,
    /// Iteration that raised the stop signal, if any.
    pub stopped_at: Option<u64>,
    pub elapsed: Duration,
}

impl PhaseReport {
    /// Upper bound on `steps`: `target - first`, or zero when already past the target.
    pub fn budget(&self) -> u64 {
        self.target_iteration.saturating_sub(self.first_iteration)
    }

    pub fn converged(&self) -> bool {
        self.outcome == PhaseOutcome::Converged
    }
}

/// Progress hook for the controllers. All methods default to no-ops.
pub trait PhaseObserver {
    /// Called on rank 0 only, before the barrier that opens a phase.
    fn banner(&self, _phase: Phase) {}

    fn phase_started(&self, _phase: Phase, _first_iteration: u64, _target_iteration: u64) {}

    fn iteration_finished(&self, _phase: Phase, _iteration: u64, _stop: bool) {}

    fn phase_finished(&self, _report: &PhaseReport) {}

    fn estimation_finished(&self, _report: &EstimationReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PhaseObserver for NoopObserver {}
