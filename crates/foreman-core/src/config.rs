use crate::error::{ForemanError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

/// The agent enum lives with the driver so the two cannot drift.
pub use coding_agent::AgentKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub kind: AgentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Override the executable looked up on `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
    /// Wall-clock limit per invocation. Unset means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
}

fn default_permission_mode() -> String {
    "acceptEdits".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: AgentKind::default(),
            model: None,
            executable: None,
            permission_mode: default_permission_mode(),
            timeout_minutes: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TrackerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    /// Local queue backed by the `bd` CLI.
    #[default]
    Beads,
    /// Linear issues over GraphQL.
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub kind: TrackerKind,
    /// Regex matched against the status column of `bd list`.
    #[serde(default = "default_status_pattern")]
    pub status_pattern: String,
    #[serde(default = "default_beads_command")]
    pub beads_command: String,
    #[serde(default = "default_linear_url")]
    pub linear_api_url: String,
}

fn default_status_pattern() -> String {
    "open|pending".to_string()
}

fn default_beads_command() -> String {
    "bd".to_string()
}

fn default_linear_url() -> String {
    "https://api.linear.app/graphql".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            kind: TrackerKind::default(),
            status_pattern: default_status_pattern(),
            beads_command: default_beads_command(),
            linear_api_url: default_linear_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReviewConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Total review runs, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_diff_line_budget")]
    pub diff_line_budget: usize,
    /// Run the pattern scan over the diff; blocking hits fail the review.
    #[serde(default = "default_true")]
    pub static_scan: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_diff_line_budget() -> usize {
    500
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            diff_line_budget: default_diff_line_budget(),
            static_scan: true,
        }
    }
}

// ---------------------------------------------------------------------------
// TestGateConfig
// ---------------------------------------------------------------------------

/// What a timed-out test command counts as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Approve and note the skip. A hung suite never blocks a PR.
    #[default]
    Pass,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestGateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "default_test_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub on_timeout: TimeoutPolicy,
}

fn default_test_timeout() -> u64 {
    120
}

impl Default for TestGateConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_seconds: default_test_timeout(),
            on_timeout: TimeoutPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PrConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrConfig {
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,
    /// Labels attached to every PR in addition to the computed ones.
    #[serde(default = "default_pr_labels")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub draft: bool,
}

fn default_title_prefix() -> String {
    "Agent".to_string()
}

fn default_pr_labels() -> Vec<String> {
    vec!["agent".to_string()]
}

impl Default for PrConfig {
    fn default() -> Self {
        Self {
            title_prefix: default_title_prefix(),
            labels: default_pr_labels(),
            draft: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressConfig / QaConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    7
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QaConfig {
    /// Sender address for outbound email; `RESEND_FROM` overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub tests: TestGateConfig,
    #[serde(default)]
    pub pr: PrConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub qa: QaConfig,
}

fn default_version() -> u32 {
    1
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_branch_prefix() -> String {
    "agent".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            base_branch: default_base_branch(),
            branch_prefix: default_branch_prefix(),
            agent: AgentConfig::default(),
            tracker: TrackerConfig::default(),
            review: ReviewConfig::default(),
            tests: TestGateConfig::default(),
            pr: PrConfig::default(),
            progress: ProgressConfig::default(),
            qa: QaConfig::default(),
        }
    }
}

impl Config {
    /// Load `.agent/config.yaml`, falling back to defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_branch.trim().is_empty() {
            return Err(ForemanError::InvalidConfig(
                "base_branch must not be empty".into(),
            ));
        }
        if self.review.max_attempts == 0 {
            return Err(ForemanError::InvalidConfig(
                "review.max_attempts must be at least 1".into(),
            ));
        }
        if self.review.diff_line_budget == 0 {
            return Err(ForemanError::InvalidConfig(
                "review.diff_line_budget must be at least 1".into(),
            ));
        }
        if let Err(e) = regex::Regex::new(&self.tracker.status_pattern) {
            return Err(ForemanError::InvalidConfig(format!(
                "tracker.status_pattern is not a valid regex: {e}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
