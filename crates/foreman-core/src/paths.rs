use chrono::NaiveDate;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const AGENT_DIR: &str = ".agent";
pub const CONFIG_FILE: &str = ".agent/config.yaml";
pub const METRICS_FILE: &str = ".agent/metrics.json";
pub const METRICS_LOCK: &str = ".agent/metrics.lock";
pub const PROGRESS_FILE: &str = ".agent/claude-progress.txt";
pub const RUN_LOCK: &str = ".agent/runner.lock";

pub const COO_DIR: &str = ".coo/agent";

/// Top-level directories holding foreman's own state. Never staged or cleaned.
pub const STATE_ROOTS: &[&str] = &[".agent", ".coo"];
pub const COO_STATE_DIR: &str = ".coo/agent/state";
pub const COO_STAGING_DIR: &str = ".coo/agent/staging";
pub const COO_OUTPUTS_DIR: &str = ".coo/agent/outputs";

pub const WARMUP_DAY_FILE: &str = "warmup-day.txt";
pub const EMAILS_SENT_FILE: &str = "emails-sent-today.txt";
pub const LAST_RESET_FILE: &str = "last-reset-date.txt";
pub const WARMUP_LOCK: &str = "warmup.lock";

pub const REJECTED_DIR: &str = "rejected";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn agent_dir(root: &Path) -> PathBuf {
    root.join(AGENT_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn metrics_path(root: &Path) -> PathBuf {
    root.join(METRICS_FILE)
}

pub fn metrics_lock_path(root: &Path) -> PathBuf {
    root.join(METRICS_LOCK)
}

pub fn progress_path(root: &Path) -> PathBuf {
    root.join(PROGRESS_FILE)
}

pub fn run_lock_path(root: &Path) -> PathBuf {
    root.join(RUN_LOCK)
}

pub fn coo_state_dir(root: &Path) -> PathBuf {
    root.join(COO_STATE_DIR)
}

pub fn staging_dir(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(COO_STAGING_DIR).join(date.format("%Y-%m-%d").to_string())
}

pub fn outputs_dir(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(COO_OUTPUTS_DIR).join(date.format("%Y-%m-%d").to_string())
}

pub fn rejected_dir(root: &Path, date: NaiveDate) -> PathBuf {
    staging_dir(root, date).join(REJECTED_DIR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
