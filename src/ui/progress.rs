use crate::phase::{EstimationReport, Phase, PhaseObserver, PhaseOutcome, PhaseReport};
use crate::ui::icons::{CHECK, CLOCK, CROSS, SPARKLE};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Width of the dashed phase banner, in columns.
const BANNER_WIDTH: usize = 73;

/// Phases that carry a progress tick: direct, adjoint, error estimation.
const TRACKED_PHASES: u64 = 3;

/// `---- Begin Flow Solver ----`, padded to a fixed width.
pub fn banner_line(title: &str) -> String {
    format!("{:-^width$}", format!(" {title} "), width = BANNER_WIDTH)
}

/// Terminal UI for a run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Phase bar: how many of the three phases have completed
/// - Iteration bar: spinner with the current iteration and the phase target
///
/// Phase banners go to stdout; the bars draw on stderr.
pub struct RunUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    iteration_bar: ProgressBar,
    verbose: bool,
    target: AtomicU64,
}

impl RunUI {
    /// Create the UI and add both bars to the multiplex renderer.
    ///
    /// With `quiet` set the bars are never drawn; banners are still printed.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        let multi = if quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let phase_bar = multi.add(ProgressBar::new(TRACKED_PHASES));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("Phases");

        let iteration_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let iteration_bar = multi.add(ProgressBar::new_spinner());
        iteration_bar.set_style(iteration_style);
        iteration_bar.set_prefix("  Iter");

        Self {
            multi,
            phase_bar,
            iteration_bar,
            verbose,
            target: AtomicU64::new(0),
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Clear both bars after a successful run.
    pub fn finish(&self) {
        self.iteration_bar.finish_and_clear();
        self.phase_bar.finish_and_clear();
    }

    /// Stop the bars and report the failing phase.
    pub fn abandon(&self, phase: Phase) {
        self.iteration_bar.finish_and_clear();
        self.phase_bar
            .abandon_with_message(format!("{} {}", CROSS, style(phase).red().bold()));
    }
}

impl PhaseObserver for RunUI {
    fn banner(&self, phase: Phase) {
        let line = banner_line(phase.banner());
        self.multi
            .suspend(|| println!("\n{}\n", style(line).bold()));
    }

    fn phase_started(&self, phase: Phase, first_iteration: u64, target_iteration: u64) {
        self.target.store(target_iteration, Ordering::SeqCst);
        self.phase_bar
            .set_message(format!("{}", style(phase).yellow()));
        self.iteration_bar.set_message(format!(
            "Iteration {}/{} {}",
            style(first_iteration).cyan(),
            target_iteration,
            style("(starting...)").dim()
        ));
        self.iteration_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    fn iteration_finished(&self, phase: Phase, iteration: u64, stop: bool) {
        let target = self.target.load(Ordering::SeqCst);
        self.iteration_bar.set_message(format!(
            "Iteration {}/{}",
            style(iteration).cyan(),
            target
        ));
        if self.verbose && stop {
            self.print_line(format!(
                "    {} {}",
                style("→").dim(),
                style(format!("{phase}: stop requested at iteration {iteration}")).dim()
            ));
        }
    }

    fn phase_finished(&self, report: &PhaseReport) {
        self.iteration_bar.disable_steady_tick();
        let icon = match report.outcome {
            PhaseOutcome::Converged => CHECK,
            PhaseOutcome::IterationLimitReached => CLOCK,
        };
        self.print_line(format!(
            "{} {}: {} after {} of {} iterations {}",
            icon,
            style(report.phase).bold(),
            report.outcome,
            style(report.steps).cyan(),
            report.budget(),
            style(format!("({:.1}s)", report.elapsed.as_secs_f64())).dim()
        ));
        self.phase_bar.inc(1);
    }

    fn estimation_finished(&self, report: &EstimationReport) {
        self.iteration_bar.disable_steady_tick();
        self.print_line(format!(
            "{} {}: {} points x {} variables {}",
            SPARKLE,
            style(Phase::ErrorEstimation).bold(),
            style(report.points()).cyan(),
            style(report.variables()).cyan(),
            style(format!("({:.1}s)", report.elapsed.as_secs_f64())).dim()
        ));
        self.phase_bar.inc(1);
    }
}
