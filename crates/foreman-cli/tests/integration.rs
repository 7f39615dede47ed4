#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn foreman(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("foreman").unwrap();
    cmd.current_dir(dir.path())
        .env("FOREMAN_ROOT", dir.path())
        .env_remove("SLACK_WEBHOOK_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn json_out(cmd: &mut Command) -> Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?}");
}

fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::create_dir_all(dir.path().join(".agent")).unwrap();
    std::fs::write(dir.path().join(".agent/config.yaml"), yaml).unwrap();
}

// ---------------------------------------------------------------------------
// foreman init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_state_dirs() {
    let dir = TempDir::new().unwrap();
    foreman(&dir).arg("init").assert().success();

    assert!(dir.path().join(".agent/config.yaml").exists());
    assert!(dir.path().join(".agent/claude-progress.txt").exists());
    assert!(dir.path().join(".coo/agent/state").is_dir());
    assert!(dir.path().join(".coo/agent/staging").is_dir());
    assert!(dir.path().join(".coo/agent/outputs").is_dir());

    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.lines().any(|l| l == ".agent/runner.lock"));
    assert!(gitignore.lines().any(|l| l == ".agent/metrics.json"));
    assert!(gitignore.lines().any(|l| l == ".coo/agent/state/"));
}

#[test]
fn init_is_idempotent_and_keeps_existing_config() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "base_branch: develop\n");
    foreman(&dir).arg("init").assert().success();
    foreman(&dir).arg("init").assert().success();

    let cfg = std::fs::read_to_string(dir.path().join(".agent/config.yaml")).unwrap();
    assert_eq!(cfg, "base_branch: develop\n");
    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert_eq!(gitignore.matches(".agent/runner.lock").count(), 1);
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "review:\n  max_attempts: 0\n");
    foreman(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_attempts"));
}

// ---------------------------------------------------------------------------
// foreman test-gate
// ---------------------------------------------------------------------------

#[test]
fn test_gate_approves_passing_command() {
    let dir = TempDir::new().unwrap();
    let out = json_out(foreman(&dir).args(["test-gate", "--command", "exit 0"]));
    assert_eq!(out["decision"], "approve");
}

#[test]
fn test_gate_blocks_failing_command_with_single_json_line() {
    let dir = TempDir::new().unwrap();
    let assert = foreman(&dir)
        .args(["test-gate", "--command", "echo boom; exit 3"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    let out: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(out["decision"], "block");
    assert_eq!(out.as_object().unwrap().len(), 2);
}

#[test]
fn test_gate_without_command_approves() {
    let dir = TempDir::new().unwrap();
    let out = json_out(foreman(&dir).arg("test-gate"));
    assert_eq!(out["decision"], "approve");
    assert_eq!(out["reason"], "no test command configured");
}

#[test]
fn test_gate_uses_configured_command() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tests:\n  command: \"exit 1\"\n");
    let out = json_out(foreman(&dir).arg("test-gate"));
    assert_eq!(out["decision"], "block");
}

// ---------------------------------------------------------------------------
// foreman notify
// ---------------------------------------------------------------------------

#[test]
fn notify_without_webhook_is_a_skip_not_an_error() {
    let dir = TempDir::new().unwrap();
    let out = json_out(foreman(&dir).args([
        "--json", "notify", "--title", "Deploy", "--message", "done", "--status", "success",
        "--field", "env=prod",
    ]));
    assert_eq!(out["outcome"], "skipped");
}

#[test]
fn notify_rejects_unknown_status() {
    let dir = TempDir::new().unwrap();
    foreman(&dir)
        .args(["notify", "--title", "t", "--message", "m", "--status", "purple"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown status"));
}

// ---------------------------------------------------------------------------
// foreman metrics / warmup
// ---------------------------------------------------------------------------

#[test]
fn metrics_start_at_zero_and_increment() {
    let dir = TempDir::new().unwrap();
    let shown = json_out(foreman(&dir).args(["--json", "metrics", "show"]));
    assert_eq!(shown["tasks_completed"], 0);
    assert_eq!(shown["warmup_day"], 1);

    foreman(&dir)
        .args(["metrics", "incr", "tasks-completed", "--by", "2"])
        .assert()
        .success();
    let after = json_out(foreman(&dir).args(["--json", "metrics", "incr", "tasks_completed"]));
    assert_eq!(after["tasks_completed"], 3);
    assert!(dir.path().join(".agent/metrics.json").exists());
}

#[test]
fn metrics_rejects_unknown_counter() {
    let dir = TempDir::new().unwrap();
    foreman(&dir)
        .args(["metrics", "incr", "coffees"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown counter"));
}

#[test]
fn warmup_status_on_fresh_project() {
    let dir = TempDir::new().unwrap();
    let out = json_out(foreman(&dir).args(["--json", "warmup", "status"]));
    assert_eq!(out["warmup_day"], 1);
    assert_eq!(out["daily_cap"], 10);
    assert_eq!(out["remaining"], 10);
}

#[test]
fn warmup_record_reduces_remaining() {
    let dir = TempDir::new().unwrap();
    let out = json_out(foreman(&dir).args(["--json", "warmup", "record", "--count", "4"]));
    assert_eq!(out["sent_today"], 4);
    assert_eq!(out["remaining"], 6);
    let sent =
        std::fs::read_to_string(dir.path().join(".coo/agent/state/emails-sent-today.txt")).unwrap();
    assert_eq!(sent.trim(), "4");
}

// ---------------------------------------------------------------------------
// foreman progress
// ---------------------------------------------------------------------------

#[test]
fn progress_add_then_prune_keeps_recent_entries() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join(".agent/claude-progress.txt");
    std::fs::create_dir_all(log.parent().unwrap()).unwrap();
    std::fs::write(&log, "# Log\n\n## 2001-01-01 10:00 UTC | ancient\n\nold notes\n").unwrap();

    foreman(&dir)
        .args(["progress", "add", "--heading", "T-1 published", "--body", "PR opened"])
        .assert()
        .success();
    let stats = json_out(foreman(&dir).args(["--json", "progress", "prune", "--days", "7"]));
    assert_eq!(stats["dropped"], 1);
    assert_eq!(stats["kept"], 1);

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.starts_with("# Log"));
    assert!(text.contains("T-1 published"));
    assert!(!text.contains("ancient"));
}

// ---------------------------------------------------------------------------
// foreman qa
// ---------------------------------------------------------------------------

#[test]
fn qa_rejects_bad_date() {
    let dir = TempDir::new().unwrap();
    foreman(&dir)
        .args(["qa", "--date", "03/14/2026"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected YYYY-MM-DD"));
}

#[test]
fn qa_dry_run_reports_without_moving() {
    let dir = TempDir::new().unwrap();
    let staging = dir.path().join(".coo/agent/staging/2026-03-14");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(
        staging.join("tweet-1.json"),
        r#"{"kind":"tweet","text":"Shipped the new exporter today."}"#,
    )
    .unwrap();
    std::fs::write(
        staging.join("email-1.json"),
        r#"{"kind":"email","to":"not-an-address","subject":"Hi","body":"Hello"}"#,
    )
    .unwrap();

    let out = json_out(foreman(&dir).args(["--json", "qa", "--date", "2026-03-14", "--dry-run"]));
    assert_eq!(out["passed"].as_array().unwrap().len(), 1);
    assert_eq!(out["rejected"].as_array().unwrap().len(), 1);
    assert!(staging.join("tweet-1.json").exists());
    assert!(staging.join("email-1.json").exists());
}

// ---------------------------------------------------------------------------
// foreman run
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn fake_bd(dir: &TempDir) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let bd = dir.path().join("fake-bd");
    std::fs::write(
        &bd,
        "#!/bin/sh\nif [ \"$1\" = list ]; then\n  echo 'T-1 [P0] [bug] open - Fix crash'\n  echo 'T-2 [P1] [task] open - Add export'\n  echo 'T-3 [P2] [task] closed - Old thing'\nfi\n",
    )
    .unwrap();
    std::fs::set_permissions(&bd, std::fs::Permissions::from_mode(0o755)).unwrap();
    bd
}

#[cfg(unix)]
#[test]
fn run_dry_run_lists_pending_tasks() {
    let dir = TempDir::new().unwrap();
    let bd = fake_bd(&dir);
    write_config(
        &dir,
        &format!("tracker:\n  kind: beads\n  beads_command: {}\n", bd.display()),
    );

    let out = json_out(foreman(&dir).args(["--json", "run", "--dry-run", "--max-tasks", "1"]));
    assert_eq!(out["processed"], 1);
    assert_eq!(out["failed"], 0);
    assert_eq!(out["outcomes"][0]["key"], "T-1");
    assert_eq!(out["outcomes"][0]["result"], "planned");
    assert!(!dir.path().join(".agent/runner.lock").exists());
}

#[cfg(unix)]
#[test]
fn run_unknown_task_id_fails() {
    let dir = TempDir::new().unwrap();
    let bd = fake_bd(&dir);
    write_config(
        &dir,
        &format!("tracker:\n  kind: beads\n  beads_command: {}\n", bd.display()),
    );
    foreman(&dir)
        .args(["run", "--dry-run", "--task", "T-99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("T-99"));
}

#[test]
fn run_fails_fast_when_tracker_binary_is_missing() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "tracker:\n  kind: beads\n  beads_command: definitely-not-a-real-bd\n",
    );
    foreman(&dir)
        .args(["run", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("definitely-not-a-real-bd"));
}

#[test]
fn run_with_linear_requires_credentials() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tracker:\n  kind: linear\n");
    foreman(&dir)
        .args(["run", "--dry-run"])
        .env_remove("LINEAR_API_KEY")
        .assert()
        .failure()
        .stderr(predicate::str::contains("LINEAR_API_KEY"));
}

// ---------------------------------------------------------------------------
// foreman labels
// ---------------------------------------------------------------------------

#[test]
fn labels_for_branch_changes() {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "-q", "-b", "main"]);
    std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
    git(dir.path(), &["add", "-A"]);
    git(dir.path(), &["commit", "-q", "-m", "init"]);
    git(dir.path(), &["checkout", "-q", "-b", "agent/t-1-fix-crash"]);
    std::fs::create_dir_all(dir.path().join("api")).unwrap();
    std::fs::write(dir.path().join("api/handler.rs"), "fn a() {}\nfn b() {}\n").unwrap();
    git(dir.path(), &["add", "-A"]);
    git(dir.path(), &["commit", "-q", "-m", "fix"]);

    let out = json_out(foreman(&dir).args(["--json", "labels", "--title", "Fix crash"]));
    let labels: Vec<&str> = out
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["agent", "bugfix", "backend", "size/xs"]);
}
