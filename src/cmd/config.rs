//! Case-file view and validation commands (`adaptflow config`).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use adaptflow::adapt_config::{AdaptToml, CASE_FILE_NAME};
use adaptflow::config::{ENV_MARKER, ENV_PARALLEL, RunConfig, RunOverrides};

use super::super::ConfigCommands;

/// The explicit file, or the discovered one if any.
fn locate(project_dir: &Path, file: Option<PathBuf>) -> Option<PathBuf> {
    file.or_else(|| RunConfig::find_case_file(project_dir).ok())
}

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None => show(project_dir, None),
        Some(ConfigCommands::Show { file }) => show(project_dir, file),
        Some(ConfigCommands::Validate { file }) => validate(project_dir, file),
        Some(ConfigCommands::Init) => init(project_dir),
    }
}

fn show(project_dir: &Path, file: Option<PathBuf>) -> Result<()> {
    println!();
    println!("Adaptflow Configuration");
    println!("=======================");
    println!();

    let Some(path) = locate(project_dir, file) else {
        println!("No case file found in {}", project_dir.display());
        println!();
        println!("Run 'adaptflow config init' to create {}.", CASE_FILE_NAME);
        println!();
        return Ok(());
    };

    println!("Case file: {}", path.display());
    println!();
    let toml = AdaptToml::load(&path)?;

    println!("[run]");
    println!("  dimension = {}", toml.run.dimension);
    println!("  zones = {}", toml.run.zones);
    println!("  parallel = {}", toml.run.parallel);
    println!("  marker = \"{}\"", toml.run.marker);
    println!("  variant = \"{}\"", toml.run.variant);
    println!();

    println!("[case]");
    println!("  build = \"{}\"", toml.case.build);
    println!("  start_iteration = {}", toml.case.start_iteration);
    println!("  iterations = {}", toml.case.iterations);
    println!("  points = {}", toml.case.points);
    println!(
        "  variables = {}",
        toml.case.variable_count(toml.run.dimension)
    );
    if let Some(at) = toml.case.diverge_at {
        println!("  diverge_at = {}", at);
    }
    println!(
        "  direct: rate = {}, tolerance = {:e}",
        toml.case.direct.rate, toml.case.direct.tolerance
    );
    println!(
        "  adjoint: rate = {}, tolerance = {:e}",
        toml.case.adjoint.rate, toml.case.adjoint.tolerance
    );
    for marker in &toml.case.markers {
        let ranks = if marker.ranks.is_empty() {
            "all".to_string()
        } else {
            format!("{:?}", marker.ranks)
        };
        println!(
            "  marker \"{}\": vertices = {}, halo = {}, ranks = {}",
            marker.name, marker.vertices, marker.halo, ranks
        );
    }
    println!();

    // Effective values (including env overrides)
    println!("Effective values (with {}/{} overrides):", ENV_PARALLEL, ENV_MARKER);
    let config = RunConfig::new(project_dir, Some(path), &RunOverrides::default())?;
    println!("  parallel = {}", config.parallel);
    println!("  marker = \"{}\"", config.marker);
    println!();
    Ok(())
}

fn validate(project_dir: &Path, file: Option<PathBuf>) -> Result<()> {
    println!();
    println!("Validating case file...");
    println!();

    let Some(path) = locate(project_dir, file) else {
        println!("No case file found. Using defaults (valid).");
        return Ok(());
    };

    let toml = AdaptToml::load(&path)?;
    let warnings = toml.validate();

    if warnings.is_empty() {
        println!("Case file is valid.");
    } else {
        println!("Case file warnings:");
        for warning in warnings {
            println!("  - {}", warning);
        }
    }
    println!();
    Ok(())
}

fn init(project_dir: &Path) -> Result<()> {
    let path = project_dir.join(CASE_FILE_NAME);
    if path.exists() {
        println!("{} already exists at {}", CASE_FILE_NAME, path.display());
        println!("Delete it first if you want to recreate it.");
        return Ok(());
    }

    if !project_dir.exists() {
        std::fs::create_dir_all(project_dir).with_context(|| {
            format!("Failed to create project directory: {}", project_dir.display())
        })?;
    }

    AdaptToml::default().save(&path)?;

    println!("Created {} at {}", CASE_FILE_NAME, path.display());
    println!();
    println!("You can now customize:");
    println!("  - [run] dimension, zones, parallel, marker, variant");
    println!("  - [case] build, iterations, points and convergence rates");
    println!("  - [[case.markers]] boundary markers and their owning ranks");
    println!();
    Ok(())
}
