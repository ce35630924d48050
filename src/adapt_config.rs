//! Case-file configuration for adaptflow.
//!
//! A case file (`adaptflow.toml` by default) carries the orchestration
//! settings and the input of the built-in synthetic solver backend:
//!
//! ```toml
//! [run]
//! dimension = 2
//! zones = 1
//! parallel = false
//! marker = "airfoil"
//! variant = "disc-adj-single-zone"
//!
//! [case]
//! build = "serial"
//! start_iteration = 0
//! iterations = 100
//! points = 16
//!
//! [case.direct]
//! initial_residual = 1.0
//! rate = 0.5
//! tolerance = 1e-6
//!
//! [case.adjoint]
//! rate = 0.6
//! tolerance = 1e-8
//!
//! [[case.markers]]
//! name = "airfoil"
//! vertices = 40
//! halo = 4
//! ranks = [0]
//! ```
//!
//! Settings are layered file → environment → CLI; see [`crate::config`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::driver::{DriverVariant, ExecutionMode};

/// Default case-file name looked up in the project directory.
pub const CASE_FILE_NAME: &str = "adaptflow.toml";

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// Spatial dimension of the mesh (2 or 3)
    #[serde(default = "default_dimension")]
    pub dimension: u8,
    /// Number of solution zones
    #[serde(default = "default_zones")]
    pub zones: u32,
    /// Whether to run inside a process group
    #[serde(default)]
    pub parallel: bool,
    /// Boundary marker whose vertex accounting is reported
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Solver driver flavour
    #[serde(default)]
    pub variant: DriverVariant,
}

fn default_dimension() -> u8 {
    2
}

fn default_zones() -> u32 {
    1
}

fn default_marker() -> String {
    "airfoil".to_string()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            zones: default_zones(),
            parallel: false,
            marker: default_marker(),
            variant: DriverVariant::default(),
        }
    }
}

/// Residual model of one solve: `r(k+1) = rate * r(k)`, stop when `r < tolerance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceSpec {
    #[serde(default = "default_initial_residual")]
    pub initial_residual: f64,
    #[serde(default = "default_rate")]
    pub rate: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_initial_residual() -> f64 {
    1.0
}

fn default_rate() -> f64 {
    0.5
}

fn default_tolerance() -> f64 {
    1e-6
}

impl Default for ConvergenceSpec {
    fn default() -> Self {
        Self {
            initial_residual: default_initial_residual(),
            rate: default_rate(),
            tolerance: default_tolerance(),
        }
    }
}

/// One boundary of the synthetic mesh as seen by the ranks listed in `ranks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub name: String,
    /// Physical plus halo vertices on each owning rank
    pub vertices: usize,
    #[serde(default)]
    pub halo: usize,
    /// Ranks holding vertices of this marker; empty means every rank
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranks: Vec<i32>,
}

impl MarkerSpec {
    pub fn is_local_to(&self, rank: i32) -> bool {
        self.ranks.is_empty() || self.ranks.contains(&rank)
    }
}

/// Input of the synthetic solver backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSection {
    /// Execution mode the solver was built for
    #[serde(default)]
    pub build: ExecutionMode,
    /// Restart iteration reported by the driver
    #[serde(default)]
    pub start_iteration: u64,
    /// Target iteration count reported by the driver
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Local points (physical plus halo) per rank
    #[serde(default = "default_points")]
    pub points: usize,
    /// Adaptation variables; defaults to the metric-tensor size for the dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<usize>,
    /// Inject a solver failure at this direct iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diverge_at: Option<u64>,
    #[serde(default)]
    pub direct: ConvergenceSpec,
    #[serde(default = "default_adjoint")]
    pub adjoint: ConvergenceSpec,
    #[serde(default)]
    pub markers: Vec<MarkerSpec>,
}

fn default_iterations() -> u64 {
    100
}

fn default_points() -> usize {
    16
}

fn default_adjoint() -> ConvergenceSpec {
    ConvergenceSpec {
        rate: 0.6,
        tolerance: 1e-8,
        ..ConvergenceSpec::default()
    }
}

impl Default for CaseSection {
    fn default() -> Self {
        Self {
            build: ExecutionMode::default(),
            start_iteration: 0,
            iterations: default_iterations(),
            points: default_points(),
            variables: None,
            diverge_at: None,
            direct: ConvergenceSpec::default(),
            adjoint: default_adjoint(),
            markers: vec![MarkerSpec {
                name: default_marker(),
                vertices: 8,
                halo: 0,
                ranks: Vec::new(),
            }],
        }
    }
}

impl CaseSection {
    /// Number of adaptation variables for a mesh of the given dimension.
    ///
    /// Defaults to the independent components of a symmetric metric tensor.
    pub fn variable_count(&self, dimension: u8) -> usize {
        self.variables
            .unwrap_or_else(|| if dimension == 3 { 6 } else { 3 })
    }
}

/// The complete case-file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptToml {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub case: CaseSection,
}

impl AdaptToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read case file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Invalid case file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse case file")
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize case file")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write case file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !matches!(self.run.dimension, 2 | 3) {
            warnings.push(format!(
                "Invalid dimension {}: must be 2 or 3",
                self.run.dimension
            ));
        }
        if self.run.zones == 0 {
            warnings.push("zones must be at least 1".to_string());
        }
        if self.run.zones > 1 && self.run.variant == DriverVariant::DiscAdjSingleZone {
            warnings.push(format!(
                "{} zones requested with the single-zone driver; only zone 0 is used",
                self.run.zones
            ));
        }
        if !self.case.markers.iter().any(|m| m.name == self.run.marker) {
            warnings.push(format!(
                "Marker '{}' is not defined in [[case.markers]]; it will resolve as absent",
                self.run.marker
            ));
        }
        for marker in &self.case.markers {
            if marker.halo > marker.vertices {
                warnings.push(format!(
                    "Marker '{}' has halo {} > vertices {}",
                    marker.name, marker.halo, marker.vertices
                ));
            }
        }
        for (label, spec) in [("direct", &self.case.direct), ("adjoint", &self.case.adjoint)] {
            if !(spec.rate > 0.0 && spec.rate < 1.0) {
                warnings.push(format!(
                    "case.{}.rate {} is outside (0, 1); the solve will not converge",
                    label, spec.rate
                ));
            }
            if spec.tolerance <= 0.0 {
                warnings.push(format!("case.{}.tolerance must be positive", label));
            }
        }

        warnings
    }
}
