use adaptflow::driver::DriverVariant;
use adaptflow::logging::{self, LogFormat, Verbosity};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "adaptflow")]
#[command(
    version,
    about = "Direct, adjoint and error-estimation orchestration for goal-oriented mesh adaptation"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide progress bars and phase summaries
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    pub log_format: LogFormat,

    /// Also write JSON logs into this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the direct solve, the adjoint solve and the error estimation
    Run(RunArgs),
    /// Resolve the boundary marker on this rank without solving
    Markers {
        /// Case file. If not provided, adaptflow.toml or the newest *.case.toml is used
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long)]
        marker: Option<String>,
    },
    /// View or validate the case file
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Case file. If not provided, adaptflow.toml or the newest *.case.toml is used
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Spatial dimension (2 or 3)
    #[arg(long, alias = "nDim")]
    pub dim: Option<u8>,

    /// Number of zones
    #[arg(long, alias = "nZone")]
    pub zones: Option<u32>,

    /// Run inside a process group
    #[arg(long)]
    pub parallel: bool,

    /// Boundary marker to report
    #[arg(short, long)]
    pub marker: Option<String>,

    /// Driver variant: disc-adj-single-zone, fsi, fem, harmonic-balance
    #[arg(long, conflicts_with_all = ["fsi", "fem", "harmonic_balance"])]
    pub variant: Option<DriverVariant>,

    /// Shorthand for --variant fsi
    #[arg(long, conflicts_with_all = ["fem", "harmonic_balance"])]
    pub fsi: bool,

    /// Shorthand for --variant fem
    #[arg(long, conflicts_with = "harmonic_balance")]
    pub fem: bool,

    /// Shorthand for --variant harmonic-balance
    #[arg(long)]
    pub harmonic_balance: bool,

    /// Write a JSON run report to this file (or into this directory)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Do not print the adaptation dataset
    #[arg(long)]
    pub no_rows: bool,
}

impl RunArgs {
    pub fn selected_variant(&self) -> Option<DriverVariant> {
        if self.fsi {
            Some(DriverVariant::Fsi)
        } else if self.fem {
            Some(DriverVariant::Fem)
        } else if self.harmonic_balance {
            Some(DriverVariant::HarmonicBalance)
        } else {
            self.variant
        }
    }
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the case file and the effective run settings
    Show {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Validate the case file and show any warnings
    Validate {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Write a default adaptflow.toml
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let _log_guard = logging::init(
        cli.log_format,
        Verbosity::from_flags(cli.verbose, cli.quiet),
        cli.log_dir.as_deref(),
    )?;

    match &cli.command {
        Commands::Run(args) => cmd::cmd_run(&cli, &project_dir, args)?,
        Commands::Markers { file, marker } => {
            cmd::cmd_markers(&project_dir, file.clone(), marker.clone())?
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
