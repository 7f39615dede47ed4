//! [`Agent`] implementation backed by the async `coding-agent` driver.

use coding_agent::{InvokeOptions, PermissionMode};
use foreman_core::agent::{Agent, AgentReply};
use foreman_core::config::{AgentConfig, AgentKind};
use foreman_core::{ForemanError, Result};
use std::path::Path;
use std::time::Duration;

pub struct CodingAgent {
    config: AgentConfig,
}

impl CodingAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Same CLI as the coder, but read-only: review must never touch the tree.
    pub fn reviewer(config: &AgentConfig) -> Self {
        Self {
            config: AgentConfig {
                permission_mode: "plan".to_string(),
                ..config.clone()
            },
        }
    }

    /// Executable that will be spawned, for prerequisite checks.
    pub fn executable(&self) -> String {
        self.config
            .executable
            .clone()
            .unwrap_or_else(|| self.config.kind.as_str().to_string())
    }

    fn options(&self, cwd: &Path) -> InvokeOptions {
        InvokeOptions {
            kind: self.config.kind,
            model: self.config.model.clone(),
            path_to_executable: self.config.executable.clone(),
            permission_mode: permission_mode(&self.config.permission_mode),
            cwd: Some(cwd.to_path_buf()),
            timeout: self
                .config
                .timeout_minutes
                .map(|m| Duration::from_secs(u64::from(m) * 60)),
            ..InvokeOptions::default()
        }
    }
}

/// Apply `--agent`. An explicit executable belongs to the configured agent,
/// so switching kinds drops it.
pub fn apply_override(config: &mut AgentConfig, kind: Option<AgentKind>) {
    let Some(kind) = kind else { return };
    if kind != config.kind {
        config.executable = None;
    }
    config.kind = kind;
}

fn permission_mode(s: &str) -> PermissionMode {
    match s {
        "acceptEdits" => PermissionMode::AcceptEdits,
        "bypassPermissions" => PermissionMode::BypassPermissions,
        "plan" => PermissionMode::Plan,
        _ => PermissionMode::Default,
    }
}

impl Agent for CodingAgent {
    fn invoke(&self, prompt: &str, cwd: &Path) -> Result<AgentReply> {
        let opts = self.options(cwd);
        tracing::info!(agent = self.name(), cwd = %cwd.display(), "invoking agent");

        let output = match tokio::runtime::Handle::try_current() {
            // Already inside a runtime (e.g. an async test harness)
            Ok(handle) => tokio::task::block_in_place(|| {
                handle.block_on(coding_agent::run(prompt, opts))
            }),
            Err(_) => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(coding_agent::run(prompt, opts)),
        }
        .map_err(|e| ForemanError::Agent(e.to_string()))?;

        tracing::info!(
            agent = self.name(),
            is_error = output.is_error,
            cost_usd = ?output.total_cost_usd,
            duration_ms = output.duration_ms,
            "agent finished"
        );
        Ok(AgentReply {
            text: output.text,
            is_error: output.is_error,
            total_cost_usd: output.total_cost_usd,
        })
    }

    fn name(&self) -> &str {
        self.config.kind.as_str()
    }
}
