//! Integration tests for adaptflow
//!
//! These tests drive the binary end to end against the built-in synthetic
//! solver backend.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create an adaptflow Command with a clean override environment
fn adaptflow() -> Command {
    let mut cmd = cargo_bin_cmd!("adaptflow");
    cmd.env_remove("ADAPTFLOW_PARALLEL")
        .env_remove("ADAPTFLOW_MARKER")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Small case: 3 points, 2 variables, a budget of 5 iterations.
const SMALL_CASE: &str = r#"
[run]
dimension = 2
marker = "airfoil"

[case]
iterations = 5
points = 3
variables = 2

[[case.markers]]
name = "airfoil"
vertices = 12
halo = 2

[[case.markers]]
name = "farfield"
vertices = 30
ranks = [1]
"#;

fn write_case(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn project_with(content: &str) -> TempDir {
    let dir = create_temp_project();
    write_case(dir.path(), "adaptflow.toml", content);
    dir
}

fn row_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| line.starts_with('['))
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_adaptflow_help() {
        adaptflow()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("markers"));
    }

    #[test]
    fn test_adaptflow_version() {
        adaptflow().arg("--version").assert().success();
    }

    #[test]
    fn test_run_help_lists_variant_flags() {
        adaptflow()
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--parallel"))
            .stdout(predicate::str::contains("--harmonic-balance"));
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        adaptflow()
            .args(["--quiet", "--verbose", "config"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Config Command Tests
// =============================================================================

mod config_command {
    use super::*;

    #[test]
    fn test_config_show_without_case_file() {
        let dir = create_temp_project();
        adaptflow()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No case file found"));
    }

    #[test]
    fn test_config_init_creates_case_file() {
        let dir = create_temp_project();
        adaptflow()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created adaptflow.toml"));

        let content = fs::read_to_string(dir.path().join("adaptflow.toml")).unwrap();
        assert!(content.contains("[run]"));
        assert!(content.contains("airfoil"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
        let content = fs::read_to_string(dir.path().join("adaptflow.toml")).unwrap();
        assert_eq!(content, SMALL_CASE);
    }

    #[test]
    fn test_config_validate_clean_case() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Case file is valid"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = project_with(
            r#"
[run]
dimension = 4
marker = "wing"

[[case.markers]]
name = "airfoil"
vertices = 2
halo = 5
"#,
        );
        adaptflow()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Case file warnings"))
            .stdout(predicate::str::contains("dimension"));
    }

    #[test]
    fn test_config_show_finds_case_glob() {
        let dir = create_temp_project();
        write_case(dir.path(), "naca0012.case.toml", SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("naca0012.case.toml"))
            .stdout(predicate::str::contains("iterations = 5"));
    }

    #[test]
    fn test_config_show_reflects_env_override() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .env("ADAPTFLOW_MARKER", "farfield")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("marker = \"farfield\""));
    }
}

// =============================================================================
// Run Command Tests
// =============================================================================

mod run_command {
    use super::*;

    #[test]
    fn test_run_prints_banners_in_order() {
        let dir = project_with(SMALL_CASE);
        let output = adaptflow()
            .current_dir(dir.path())
            .arg("run")
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        let flow = stdout.find("Begin Flow Solver").unwrap();
        let adjoint = stdout.find("Begin Adjoint Solver").unwrap();
        let estimation = stdout.find("Begin Error Estimation").unwrap();
        assert!(flow < adjoint);
        assert!(adjoint < estimation);
    }

    #[test]
    fn test_run_prints_one_row_per_point() {
        let dir = project_with(SMALL_CASE);
        let output = adaptflow()
            .current_dir(dir.path())
            .args(["--quiet", "run"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let rows = row_lines(&output.stdout);
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(row.ends_with(']'));
            assert_eq!(row.trim_matches(['[', ']']).split(' ').count(), 2);
        }
    }

    #[test]
    fn test_run_no_rows_suppresses_dataset() {
        let dir = project_with(SMALL_CASE);
        let output = adaptflow()
            .current_dir(dir.path())
            .args(["run", "--no-rows"])
            .output()
            .unwrap();
        assert!(output.status.success());
        assert!(row_lines(&output.stdout).is_empty());
    }

    #[test]
    fn test_run_three_dimensional_default_variables() {
        let dir = project_with(
            r#"
[case]
iterations = 3
points = 2
"#,
        );
        let output = adaptflow()
            .current_dir(dir.path())
            .args(["--quiet", "run", "--dim", "3"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let rows = row_lines(&output.stdout);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trim_matches(['[', ']']).split(' ').count(), 6);
    }

    #[test]
    fn test_run_with_explicit_file() {
        let dir = create_temp_project();
        write_case(dir.path(), "wing.toml", SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["run", "--file", "wing.toml", "--no-rows"])
            .assert()
            .success();
    }

    #[test]
    fn test_run_missing_case_file_fails() {
        let dir = create_temp_project();
        adaptflow()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No case file found"));
    }

    #[test]
    fn test_run_parallel_without_group_support_fails_in_setup() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["run", "--parallel"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("[setup]"))
            .stdout(predicate::str::contains("Begin Flow Solver").not());
    }

    #[test]
    fn test_run_parallel_build_without_parallel_flag() {
        let dir = project_with(&SMALL_CASE.replace("[case]", "[case]\nbuild = \"parallel\""));
        adaptflow()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("[setup]"))
            .stderr(predicate::str::contains("Add the --parallel option"));
    }

    #[test]
    fn test_run_divergence_is_labelled_direct() {
        let dir = project_with(&SMALL_CASE.replace("[case]", "[case]\ndiverge_at = 2"));
        adaptflow()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("[direct]"))
            .stderr(predicate::str::contains("diverged at iteration 2"))
            .stdout(predicate::str::contains("Begin Flow Solver"))
            .stdout(predicate::str::contains("Begin Adjoint Solver").not());
    }

    #[test]
    fn test_run_unsupported_variant_fails_in_setup() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["run", "--fsi"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("[setup]"))
            .stderr(predicate::str::contains("fsi"));
    }

    #[test]
    fn test_run_rejects_conflicting_variant_flags() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["run", "--fsi", "--fem"])
            .assert()
            .failure();
    }

    #[test]
    fn test_run_rejects_invalid_dimension() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["run", "--dim", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("dimension"));
    }

    #[test]
    fn test_run_zero_budget_leaves_no_adjoint_solution() {
        let dir = project_with(&SMALL_CASE.replace("iterations = 5", "iterations = 0"));
        adaptflow()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("[error estimation]"))
            .stderr(predicate::str::contains("no adjoint solution"));
    }

    #[test]
    fn test_run_writes_report() {
        let dir = project_with(SMALL_CASE);
        let report = dir.path().join("report.json");
        adaptflow()
            .current_dir(dir.path())
            .args(["--quiet", "run", "--no-rows", "--report", "report.json"])
            .assert()
            .success();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(json["dataset"]["points"], 3);
        assert_eq!(json["dataset"]["variables"], 2);
        assert_eq!(json["marker"]["vertices"]["physical"], 10);
        assert_eq!(json["phases"][0]["phase"], "direct");
        assert_eq!(json["phases"][0]["steps"], 5);
        assert_eq!(json["phases"][0]["outcome"], "iteration-limit-reached");
        assert!(json.get("failure").is_none());
    }

    #[test]
    fn test_run_writes_report_on_failure() {
        let dir = project_with(&SMALL_CASE.replace("[case]", "[case]\ndiverge_at = 1"));
        let reports = dir.path().join("reports");
        fs::create_dir(&reports).unwrap();
        adaptflow()
            .current_dir(dir.path())
            .args(["run", "--report", "reports"])
            .assert()
            .failure();

        let entries: Vec<_> = fs::read_dir(&reports).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["failure"]["phase"], "direct");
        assert_eq!(json["failure"]["compatibility"], false);
    }

    #[test]
    fn test_run_absent_marker_is_not_an_error() {
        let dir = project_with(SMALL_CASE);
        let output = adaptflow()
            .current_dir(dir.path())
            .args(["--quiet", "run", "--marker", "farfield"])
            .output()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(row_lines(&output.stdout).len(), 3);
    }

    #[test]
    fn test_run_writes_log_file() {
        let dir = project_with(SMALL_CASE);
        let logs = dir.path().join("logs");
        adaptflow()
            .current_dir(dir.path())
            .args(["--log-dir", "logs", "run", "--no-rows"])
            .assert()
            .success();

        let entries: Vec<_> = fs::read_dir(&logs).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let content = fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("error estimation finished"));
    }
}

// =============================================================================
// Markers Command Tests
// =============================================================================

mod markers_command {
    use super::*;

    #[test]
    fn test_markers_present_on_rank() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .arg("markers")
            .assert()
            .success()
            .stdout(predicate::str::contains("Marker 'airfoil': present"))
            .stdout(predicate::str::contains("physical = 10"));
    }

    #[test]
    fn test_markers_owned_by_other_rank_is_absent() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .args(["markers", "--marker", "farfield"])
            .assert()
            .success()
            .stdout(predicate::str::contains("absent on this rank"))
            .stdout(predicate::str::contains("total    = 0"));
    }

    #[test]
    fn test_markers_lists_all_tags() {
        let dir = project_with(SMALL_CASE);
        adaptflow()
            .current_dir(dir.path())
            .arg("markers")
            .assert()
            .success()
            .stdout(predicate::str::contains("airfoil"))
            .stdout(predicate::str::contains("farfield"));
    }
}
