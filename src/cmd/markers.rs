//! Boundary marker lookup (`adaptflow markers`).

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

use adaptflow::boundary::{MarkerResolution, resolve_marker};
use adaptflow::config::{RunConfig, RunOverrides};
use adaptflow::context;
use adaptflow::driver::{DriverBackend, SolverDriver, SyntheticBackend};

pub fn cmd_markers(project_dir: &Path, file: Option<PathBuf>, marker: Option<String>) -> Result<()> {
    let overrides = RunOverrides {
        marker,
        ..RunOverrides::default()
    };
    let config = RunConfig::new(project_dir, file, &overrides)
        .context("Failed to load run configuration")?;
    let ctx = context::resolve(config.parallel)?;

    let backend = SyntheticBackend;
    let mut driver = backend
        .create_driver(&config, ctx.as_ref())
        .context("Failed to construct the solver driver")?;

    let tags = driver.all_boundary_tags()?;
    let local = driver.rank_local_markers()?;
    let resolution = resolve_marker(&driver, &config.marker)?;

    println!();
    println!("Boundary markers (rank {} of {})", ctx.rank(), ctx.size());
    println!("==============================");
    println!();
    for tag in &tags {
        let owned = if local.contains_key(tag) {
            style("local").green()
        } else {
            style("remote").dim()
        };
        println!("  {:<24} {}", tag, owned);
    }
    println!();

    match &resolution {
        MarkerResolution::Present(info) => {
            println!("Marker '{}': present", info.name);
            println!("  total    = {}", info.counts.total);
            println!("  halo     = {}", info.counts.halo);
            println!("  physical = {}", info.counts.physical);
        }
        MarkerResolution::Absent { name } => {
            println!("Marker '{}': absent on this rank", name);
            println!("  total    = 0");
            println!("  halo     = 0");
            println!("  physical = 0");
        }
    }
    println!();

    driver.finalize()?;
    Ok(())
}
