use anyhow::{Context, Result, anyhow, bail};
use glob::glob;
use std::path::{Path, PathBuf};

use crate::adapt_config::{AdaptToml, CASE_FILE_NAME, CaseSection};
use crate::driver::DriverVariant;

/// Environment variable overriding `[run] parallel`.
pub const ENV_PARALLEL: &str = "ADAPTFLOW_PARALLEL";
/// Environment variable overriding `[run] marker`.
pub const ENV_MARKER: &str = "ADAPTFLOW_MARKER";

/// Command-line overrides. `None` leaves the file/environment value alone.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub dimension: Option<u8>,
    pub zones: Option<u32>,
    pub parallel: Option<bool>,
    pub marker: Option<String>,
    pub variant: Option<DriverVariant>,
}

/// Immutable run configuration.
///
/// Built once before orchestration from the case file, the environment and
/// the command line (in increasing precedence), then only read.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub case_file: PathBuf,
    pub dimension: u8,
    pub zones: u32,
    pub parallel: bool,
    pub marker: String,
    pub variant: DriverVariant,
    case: CaseSection,
}

impl RunConfig {
    /// Resolve the case file under `project_dir` and layer the process
    /// environment and CLI overrides on top of it. A relative `case_file`
    /// is taken relative to `project_dir`.
    pub fn new(
        project_dir: &Path,
        case_file: Option<PathBuf>,
        overrides: &RunOverrides,
    ) -> Result<Self> {
        let case_file = match case_file {
            Some(path) => project_dir
                .join(&path)
                .canonicalize()
                .with_context(|| format!("Failed to resolve case file: {}", path.display()))?,
            None => Self::find_case_file(project_dir)?,
        };
        let toml = AdaptToml::load(&case_file)?;
        Self::from_layers(case_file, toml, overrides, |key| std::env::var(key).ok())
    }

    /// Layer `env` and `overrides` over an already parsed case file.
    pub fn from_layers(
        case_file: PathBuf,
        toml: AdaptToml,
        overrides: &RunOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let AdaptToml { run, case } = toml;

        let mut parallel = run.parallel;
        if let Some(value) = env(ENV_PARALLEL) {
            parallel = parse_flag(&value)
                .ok_or_else(|| anyhow!("Invalid {}='{}': expected true/false", ENV_PARALLEL, value))?;
        }
        let mut marker = run.marker;
        if let Some(value) = env(ENV_MARKER)
            && !value.is_empty()
        {
            marker = value;
        }

        let config = Self {
            case_file,
            dimension: overrides.dimension.unwrap_or(run.dimension),
            zones: overrides.zones.unwrap_or(run.zones),
            parallel: overrides.parallel.unwrap_or(parallel),
            marker: overrides.marker.clone().unwrap_or(marker),
            variant: overrides.variant.unwrap_or(run.variant),
            case,
        };
        config.check()?;
        Ok(config)
    }

    /// Synthetic-backend input carried by the case file.
    pub fn case(&self) -> &CaseSection {
        &self.case
    }

    fn check(&self) -> Result<()> {
        if !matches!(self.dimension, 2 | 3) {
            bail!("Invalid dimension {}: must be 2 or 3", self.dimension);
        }
        if self.zones == 0 {
            bail!("Invalid zone count 0: at least one zone is required");
        }
        Ok(())
    }

    /// Find a case file: `adaptflow.toml` first, then the most recently
    /// modified `*.case.toml` in the project directory.
    pub fn find_case_file(project_dir: &Path) -> Result<PathBuf> {
        let default = project_dir.join(CASE_FILE_NAME);
        if default.exists() {
            return Ok(default);
        }

        let pattern = project_dir.join("*.case.toml").to_string_lossy().to_string();
        let mut candidates: Vec<PathBuf> = glob(&pattern)
            .context("Failed to read glob pattern")?
            .filter_map(|entry| entry.ok())
            .collect();

        if candidates.is_empty() {
            return Err(anyhow!(
                "No case file found. Create {} (see 'adaptflow config init') or pass --file",
                CASE_FILE_NAME
            ));
        }

        candidates.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        Ok(candidates.remove(0))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
