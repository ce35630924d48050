//! JSON run report.
//!
//! One report per rank and run. It records what was configured, how each
//! phase ended and the shape of the extracted dataset. Marker ids are
//! driver-internal and are not written out.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::boundary::{MarkerResolution, VertexCounts};
use crate::config::RunConfig;
use crate::driver::DriverVariant;
use crate::errors::OrchestratorError;
use crate::orchestrator::RunOutcome;
use crate::phase::{EstimationReport, Phase, PhaseOutcome, PhaseReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub backend: String,
    pub rank: i32,
    pub size: i32,
    pub config: ConfigSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerRecord>,
    pub phases: Vec<PhaseRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetShape>,
    /// Phase-labelled diagnostic of a failed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub case_file: PathBuf,
    pub dimension: u8,
    pub zones: u32,
    pub parallel: bool,
    pub marker: String,
    pub variant: DriverVariant,
}

impl From<&RunConfig> for ConfigSummary {
    fn from(config: &RunConfig) -> Self {
        Self {
            case_file: config.case_file.clone(),
            dimension: config.dimension,
            zones: config.zones,
            parallel: config.parallel,
            marker: config.marker.clone(),
            variant: config.variant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub name: String,
    pub present: bool,
    pub vertices: VertexCounts,
}

impl From<&MarkerResolution> for MarkerRecord {
    fn from(marker: &MarkerResolution) -> Self {
        Self {
            name: marker.name().to_string(),
            present: marker.is_present(),
            vertices: marker.counts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub steps: u64,
    pub first_iteration: u64,
    /// Last iteration executed; `None` when no step ran.
    pub last_iteration: Option<u64>,
    pub target_iteration: u64,
    /// `None` for the non-iterative error-estimation phase.
    pub outcome: Option<PhaseOutcome>,
    pub duration_secs: f64,
}

impl From<&PhaseReport> for PhaseRecord {
    fn from(report: &PhaseReport) -> Self {
        Self {
            phase: report.phase,
            steps: report.steps,
            first_iteration: report.first_iteration,
            last_iteration: report
                .steps
                .checked_sub(1)
                .map(|n| report.first_iteration + n),
            target_iteration: report.target_iteration,
            outcome: Some(report.outcome),
            duration_secs: report.elapsed.as_secs_f64(),
        }
    }
}

impl From<&EstimationReport> for PhaseRecord {
    fn from(report: &EstimationReport) -> Self {
        Self {
            phase: Phase::ErrorEstimation,
            steps: 0,
            first_iteration: 0,
            last_iteration: None,
            target_iteration: 0,
            outcome: None,
            duration_secs: report.elapsed.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetShape {
    pub points: usize,
    pub variables: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub phase: Phase,
    pub compatibility: bool,
    pub message: String,
}

impl RunReport {
    pub fn new(config: &RunConfig, backend: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            backend: backend.to_string(),
            rank: 0,
            size: 1,
            config: ConfigSummary::from(config),
            marker: None,
            phases: Vec::new(),
            dataset: None,
            failure: None,
        }
    }

    /// Attach the process-group identity. Called as soon as the execution
    /// context is known so failure reports carry it too.
    pub fn set_rank(&mut self, rank: i32, size: i32) {
        self.rank = rank;
        self.size = size;
    }

    pub fn record_outcome(&mut self, outcome: &RunOutcome) {
        self.rank = outcome.rank;
        self.size = outcome.size;
        self.marker = Some(MarkerRecord::from(&outcome.marker));
        self.phases = vec![
            PhaseRecord::from(&outcome.direct),
            PhaseRecord::from(&outcome.adjoint),
            PhaseRecord::from(&outcome.estimation),
        ];
        let (points, variables) = outcome.estimation.dataset.shape();
        self.dataset = Some(DatasetShape { points, variables });
    }

    pub fn record_failure(&mut self, err: &OrchestratorError) {
        self.failure = Some(FailureRecord {
            phase: err.phase(),
            compatibility: err.is_compatibility(),
            message: err.to_string(),
        });
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// `<timestamp>_<short id>[_rank<N>].json`
    pub fn file_name(&self) -> String {
        let rank = if self.size > 1 {
            format!("_rank{}", self.rank)
        } else {
            String::new()
        };
        format!(
            "{}_{}{}.json",
            self.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &self.run_id.simple().to_string()[..8],
            rank
        )
    }

    /// Where `save` writes for a requested `path`. An existing directory
    /// receives a generated file name; in a parallel run an explicit file
    /// gets a `_rank<N>` suffix on its stem.
    pub fn target_path(&self, path: &Path) -> PathBuf {
        if path.is_dir() {
            return path.join(self.file_name());
        }
        if self.size <= 1 {
            return path.to_path_buf();
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!("{}_rank{}.{}", stem, self.rank, ext.to_string_lossy()),
            None => format!("{}_rank{}", stem, self.rank),
        };
        path.with_file_name(name)
    }

    /// Write the report and return the path actually written.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let target = self.target_path(path);
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create report directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(&target, json)
            .with_context(|| format!("Failed to write run report: {}", target.display()))?;
        Ok(target)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read run report: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run report: {}", path.display()))
    }
}
