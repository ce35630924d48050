//! Full adaptation run (`adaptflow run`).

use anyhow::{Context, Result};
use console::style;
use std::io::Write;
use std::path::Path;

use adaptflow::config::{RunConfig, RunOverrides};
use adaptflow::context;
use adaptflow::dataset::RowDisplay;
use adaptflow::driver::{DriverBackend, SyntheticBackend};
use adaptflow::errors::OrchestratorError;
use adaptflow::orchestrator::Orchestrator;
use adaptflow::phase::Phase;
use adaptflow::report::RunReport;
use adaptflow::ui::RunUI;

use super::super::{Cli, RunArgs};

pub fn cmd_run(cli: &Cli, project_dir: &Path, args: &RunArgs) -> Result<()> {
    let overrides = RunOverrides {
        dimension: args.dim,
        zones: args.zones,
        parallel: args.parallel.then_some(true),
        marker: args.marker.clone(),
        variant: args.selected_variant(),
    };
    let config = RunConfig::new(project_dir, args.file.clone(), &overrides)
        .context("Failed to load run configuration")?;
    tracing::debug!(case_file = %config.case_file.display(), "loaded case file");

    let orchestrator = Orchestrator::new(SyntheticBackend);
    let mut report = RunReport::new(&config, orchestrator.backend().name());

    let ctx = match context::resolve(config.parallel) {
        Ok(ctx) => ctx,
        Err(source) => {
            let err = OrchestratorError::Context {
                phase: Phase::Setup,
                source,
            };
            return fail(&mut report, args.report.as_deref(), err);
        }
    };
    report.set_rank(ctx.rank(), ctx.size());

    // Only the root rank draws progress; every rank prints its own rows.
    let ui = RunUI::new(cli.verbose, cli.quiet || !ctx.is_root());

    match orchestrator.run(&config, ctx.as_ref(), &ui) {
        Ok(outcome) => {
            ui.finish();
            if !args.no_rows {
                let mut out = std::io::stdout().lock();
                for row in outcome.estimation.dataset.rows() {
                    writeln!(out, "{}", RowDisplay(row)).context("Failed to write dataset row")?;
                }
                out.flush().context("Failed to flush stdout")?;
            }
            report.record_outcome(&outcome);
            report.finish();
            if let Some(path) = args.report.as_deref() {
                save_report(&report, path)?;
            }
            Ok(())
        }
        Err(err) => {
            ui.abandon(err.phase());
            fail(&mut report, args.report.as_deref(), err)
        }
    }
}

/// Record the failure, keep the report if one was requested and hand the
/// phase-labelled error back to `main`.
fn fail(report: &mut RunReport, path: Option<&Path>, err: OrchestratorError) -> Result<()> {
    tracing::error!(phase = %err.phase(), compatibility = err.is_compatibility(), "{err}");
    report.record_failure(&err);
    report.finish();
    if let Some(path) = path {
        save_report(report, path)?;
    }
    Err(err.into())
}

fn save_report(report: &RunReport, path: &Path) -> Result<()> {
    let written = report.save(path)?;
    eprintln!(
        "{} {}",
        style("Run report written to").dim(),
        written.display()
    );
    Ok(())
}
