//! Integration tests for civic-pipeline
//!
//! Every stage is configured as a small `sh` script that appends its stage id
//! and arguments to `log.txt` in the project directory.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const STAGE_IDS: [&str; 11] = [
    "step1", "step2", "step3", "step4", "step5", "step6", "step7", "step8", "step9", "step10",
    "step11",
];

/// Helper to create a civic-pipeline Command isolated from the caller's environment
fn pipeline(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("civic-pipeline");
    cmd.current_dir(dir.path())
        .env_remove("PIPELINE_CONFIG")
        .env_remove("PIPELINE_WORKDIR")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to create a project whose stages log themselves; `failing` stages exit 1
fn create_project(failing: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut content = String::from("[project]\nscope_flag = \"--party\"\n\n");
    for id in STAGE_IDS {
        let script = if failing.contains(&id) {
            "echo \"$PIPELINE_STAGE $*\" >> log.txt; exit 1"
        } else {
            "echo \"$PIPELINE_STAGE $*\" >> log.txt"
        };
        content.push_str(&format!(
            "[stages.{}]\ncommand = [\"sh\", \"-c\", '{}', \"stage\"]\n\n",
            id, script
        ));
    }
    fs::write(dir.path().join("pipeline.toml"), content).unwrap();
    dir
}

/// Lines the stage scripts wrote, trimmed
fn logged(dir: &TempDir) -> Vec<String> {
    match fs::read_to_string(dir.path().join("log.txt")) {
        Ok(content) => content.lines().map(|l| l.trim().to_string()).collect(),
        Err(_) => Vec::new(),
    }
}

fn logged_ids(dir: &TempDir) -> Vec<String> {
    logged(dir)
        .iter()
        .filter_map(|l| l.split_whitespace().next().map(str::to_string))
        .collect()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        let dir = TempDir::new().unwrap();
        pipeline(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--from"))
            .stdout(predicate::str::contains("--party"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        pipeline(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_flag_is_usage_error() {
        let dir = create_project(&[]);
        pipeline(&dir).arg("--bogus").assert().code(2);
        assert!(logged(&dir).is_empty());
    }

    #[test]
    fn test_empty_party_is_usage_error() {
        let dir = create_project(&[]);
        pipeline(&dir).args(["--party", ""]).assert().code(2);
        assert!(logged(&dir).is_empty());
    }

    #[test]
    fn test_party_with_state_separator_is_usage_error() {
        let dir = create_project(&["step5"]);
        pipeline(&dir)
            .args(["--party", "A|B"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("'|'"));
        assert!(logged(&dir).is_empty());
        assert!(!dir.path().join(".pipeline/state").exists());

        pipeline(&dir).args(["--party", "A\nB"]).assert().code(2);
        assert!(logged(&dir).is_empty());
    }
}

// =============================================================================
// Run Tests
// =============================================================================

mod run {
    use super::*;

    #[test]
    fn test_full_run_executes_every_stage_in_order() {
        let dir = create_project(&[]);

        pipeline(&dir)
            .assert()
            .success()
            .stdout(predicate::str::contains("[step1] ingest YAML+documents"))
            .stdout(predicate::str::contains("Pipeline complete"));

        assert_eq!(logged_ids(&dir), STAGE_IDS.to_vec());
        assert!(logged(&dir).iter().all(|l| !l.contains("--party")));
    }

    #[test]
    fn test_run_subcommand_matches_bare_invocation() {
        let dir = create_project(&[]);
        pipeline(&dir).arg("run").assert().success();
        assert_eq!(logged_ids(&dir).len(), 11);
    }

    #[test]
    fn test_party_filter_skips_cross_entity_and_runs_feed_unfiltered() {
        let dir = create_project(&[]);

        pipeline(&dir)
            .args(["--party", "BIJ1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("skip step7"))
            .stdout(predicate::str::contains("Pipeline complete"));

        let lines = logged(&dir);
        let ids = logged_ids(&dir);
        assert_eq!(
            ids,
            vec![
                "step1", "step2", "step3", "step4", "step5", "step6", "step8", "step9", "step10",
                "step11"
            ]
        );
        assert!(lines.contains(&"step1 --party BIJ1".to_string()));
        assert!(lines.contains(&"step11 --party BIJ1".to_string()));
        assert!(lines.contains(&"step10".to_string()));
    }

    #[test]
    fn test_resume_then_abort_on_failure() {
        let dir = create_project(&["step7"]);

        pipeline(&dir)
            .args(["--from", "step5"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("skip step1"))
            .stdout(predicate::str::contains("Pipeline aborted"))
            .stdout(predicate::str::contains("--from step7"))
            .stdout(predicate::str::contains("Pipeline complete").not())
            .stderr(predicate::str::contains("step7"));

        assert_eq!(logged_ids(&dir), vec!["step5", "step6", "step7"]);
    }

    #[test]
    fn test_failure_in_last_stage_still_fails_run() {
        let dir = create_project(&["step11"]);

        pipeline(&dir)
            .assert()
            .failure()
            .stdout(predicate::str::contains("Pipeline complete").not());

        assert_eq!(logged_ids(&dir).len(), 11);
    }

    #[test]
    fn test_unknown_resume_target_runs_nothing() {
        let dir = create_project(&[]);

        pipeline(&dir)
            .args(["--from", "step99"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown resume target 'step99'"));

        assert!(logged(&dir).is_empty());
        assert!(!dir.path().join(".pipeline/state").exists());
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let dir = create_project(&[]);

        pipeline(&dir)
            .args(["--dry-run", "--party", "BIJ1", "--from", "step6"])
            .assert()
            .success()
            .stdout(predicate::str::contains("skip: before resume point"))
            .stdout(predicate::str::contains("skip: not scope-applicable"))
            .stdout(predicate::str::contains("run (BIJ1)"));

        assert!(logged(&dir).is_empty());
    }

    #[test]
    fn test_env_file_reaches_stage_commands() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "ELECTION_YEAR=2026\n").unwrap();
        let mut content = String::new();
        for id in STAGE_IDS {
            let command = if id == "step1" {
                "[\"sh\", \"-c\", 'echo \"$ELECTION_YEAR\" > year.txt']"
            } else {
                "[\"true\"]"
            };
            content.push_str(&format!("[stages.{}]\ncommand = {}\n\n", id, command));
        }
        fs::write(dir.path().join("pipeline.toml"), content).unwrap();

        pipeline(&dir).assert().success();

        let year = fs::read_to_string(dir.path().join("year.txt")).unwrap();
        assert_eq!(year.trim(), "2026");
    }
}

// =============================================================================
// State Tests
// =============================================================================

mod state {
    use super::*;

    #[test]
    fn test_status_before_any_run() {
        let dir = create_project(&[]);
        pipeline(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not started"));
    }

    #[test]
    fn test_status_suggests_failed_stage() {
        let dir = create_project(&["step7"]);
        pipeline(&dir).assert().failure();

        pipeline(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Last completed stage: step6"))
            .stdout(predicate::str::contains("Last failed stage: step7"))
            .stdout(predicate::str::contains("Resume with: --from step7"));
    }

    #[test]
    fn test_status_suggestion_keeps_party_filter() {
        let dir = create_project(&["step8"]);
        pipeline(&dir).args(["--party", "D66"]).assert().failure();

        pipeline(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Resume with: --from step8 --party D66"));
    }

    #[test]
    fn test_status_suggestion_uses_run_filter_for_unscoped_stage() {
        let dir = create_project(&["step10"]);
        pipeline(&dir)
            .args(["--party", "D66"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("--from step10 --party D66"));

        pipeline(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Last failed stage: step10"))
            .stdout(predicate::str::contains("Resume with: --from step10 --party D66"));
    }

    #[test]
    fn test_resume_hint_quotes_party_with_spaces() {
        let dir = create_project(&["step5"]);
        pipeline(&dir)
            .args(["--party", "Partij voor de Dieren"])
            .assert()
            .failure()
            .stdout(predicate::str::contains(
                "--from step5 --party 'Partij voor de Dieren'",
            ));

        pipeline(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Resume with: --from step5 --party 'Partij voor de Dieren'",
            ));
    }

    #[test]
    fn test_status_shows_last_run_outcome() {
        let dir = create_project(&["step7"]);
        pipeline(&dir).assert().failure();

        pipeline(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Recorded runs: 1"))
            .stdout(predicate::str::contains("Last run: aborted at step7"));
    }

    #[test]
    fn test_resume_clears_suggestion_once_stage_completes() {
        let dir = create_project(&["step7"]);
        pipeline(&dir).assert().failure();

        let config = dir.path().join("pipeline.toml");
        let fixed = fs::read_to_string(&config)
            .unwrap()
            .replace("; exit 1", "");
        fs::write(&config, fixed).unwrap();

        pipeline(&dir)
            .args(["--from", "step7"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Pipeline complete"));

        pipeline(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Resume with").not())
            .stdout(predicate::str::contains("Last completed stage: step11"));
    }

    #[test]
    fn test_run_writes_state_and_run_record() {
        let dir = create_project(&[]);
        pipeline(&dir).assert().success();

        let state = fs::read_to_string(dir.path().join(".pipeline/state")).unwrap();
        assert!(state.contains("step11|completed"));
        let runs: Vec<_> = fs::read_dir(dir.path().join(".pipeline/runs"))
            .unwrap()
            .collect();
        assert_eq!(runs.len(), 1);
        assert!(!dir.path().join(".pipeline/current-run.json").exists());
    }

    #[test]
    fn test_reset_force_clears_state() {
        let dir = create_project(&[]);
        pipeline(&dir).assert().success();

        pipeline(&dir)
            .args(["reset", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Reset complete (1 run records removed)"));

        assert!(!dir.path().join(".pipeline/state").exists());
        pipeline(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not started"));
    }
}

// =============================================================================
// Listing and Config Tests
// =============================================================================

mod listing {
    use super::*;

    #[test]
    fn test_list_shows_stages_and_policies() {
        let dir = create_project(&[]);
        pipeline(&dir)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("11 total"))
            .stdout(predicate::str::contains("cross-entity"))
            .stdout(predicate::str::contains("unscoped"))
            .stdout(predicate::str::contains("step11"));
    }

    #[test]
    fn test_list_notes_default_commands_without_party_argument() {
        let dir = TempDir::new().unwrap();
        pipeline(&dir)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "default commands of step8, step11 take no party argument",
            ));

        let configured = create_project(&[]);
        pipeline(&configured)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("take no party argument").not());
    }

    #[test]
    fn test_config_init_then_validate() {
        let dir = TempDir::new().unwrap();

        pipeline(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created pipeline.toml"))
            .stdout(predicate::str::contains("scripts/fetch_social.py"));
        assert!(dir.path().join("pipeline.toml").exists());

        pipeline(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."))
            .stdout(predicate::str::contains("ignore --party"));

        pipeline(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_warns_on_unknown_stage() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pipeline.toml"),
            "[stages.step12]\ncommand = [\"true\"]\n",
        )
        .unwrap();

        pipeline(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Unknown stage 'step12'"));
    }

    #[test]
    fn test_unknown_stage_in_config_fails_run() {
        let dir = create_project(&[]);
        let mut content = fs::read_to_string(dir.path().join("pipeline.toml")).unwrap();
        content.push_str("[stages.step12]\ncommand = [\"true\"]\n");
        fs::write(dir.path().join("pipeline.toml"), content).unwrap();

        pipeline(&dir)
            .assert()
            .failure()
            .stderr(predicate::str::contains("step12"));
        assert!(logged(&dir).is_empty());
    }

    #[test]
    fn test_config_flag_points_at_other_file() {
        let dir = create_project(&[]);
        fs::rename(
            dir.path().join("pipeline.toml"),
            dir.path().join("alt.toml"),
        )
        .unwrap();

        pipeline(&dir)
            .args(["--config", "alt.toml", "--from", "step11"])
            .assert()
            .success();
        assert_eq!(logged_ids(&dir), vec!["step11"]);
    }
}
