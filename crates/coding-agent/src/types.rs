use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ─── AgentKind ────────────────────────────────────────────────────────────

/// Which coding-agent CLI to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// `claude --print --output-format json`, prompt on stdin.
    #[default]
    Claude,
    /// `opencode run <prompt>`, plain-text stdout.
    #[serde(alias = "open_code")]
    Opencode,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Opencode => "opencode",
        }
    }

    /// Executable name looked up on `PATH` when no explicit path is given.
    pub fn default_executable(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(AgentKind::Claude),
            "opencode" | "open_code" | "open-code" => Ok(AgentKind::Opencode),
            other => Err(format!("unknown agent '{other}' (expected claude or opencode)")),
        }
    }
}

// ─── PermissionMode ───────────────────────────────────────────────────────

/// Claude permission mode passed as `--permission-mode`. Ignored by OpenCode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
        }
    }
}

// ─── InvokeOptions ────────────────────────────────────────────────────────

/// Options for a single headless agent invocation.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub kind: AgentKind,
    pub model: Option<String>,
    /// Override the executable (absolute path or name on `PATH`).
    pub path_to_executable: Option<String>,
    pub permission_mode: PermissionMode,
    pub allowed_tools: Vec<String>,
    pub max_turns: Option<u32>,
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the subprocess.
    pub env: HashMap<String, String>,
    /// Wall-clock limit. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl InvokeOptions {
    pub fn executable(&self) -> &str {
        self.path_to_executable
            .as_deref()
            .unwrap_or_else(|| self.kind.default_executable())
    }
}

// ─── Result message (claude --output-format json) ─────────────────────────

/// The single JSON object `claude --print --output-format json` writes on exit.
/// Discriminated by `subtype`; the envelope's `"type": "result"` is ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ResultMessage {
    Success(ResultSuccess),
    ErrorMaxTurns(ResultError),
    ErrorDuringExecution(ResultError),
    ErrorMaxBudgetUsd(ResultError),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultSuccess {
    pub session_id: String,
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultError {
    pub session_id: String,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ResultMessage {
    pub fn session_id(&self) -> &str {
        match self {
            ResultMessage::Success(r) => &r.session_id,
            ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => &r.session_id,
        }
    }

    /// Final assistant text. Error subtypes carry none.
    pub fn result_text(&self) -> Option<&str> {
        match self {
            ResultMessage::Success(r) => Some(&r.result),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            ResultMessage::Success(r) => r.is_error,
            _ => true,
        }
    }

    pub fn num_turns(&self) -> u32 {
        match self {
            ResultMessage::Success(r) => r.num_turns,
            ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => r.num_turns,
        }
    }

    pub fn total_cost_usd(&self) -> f64 {
        match self {
            ResultMessage::Success(r) => r.total_cost_usd,
            ResultMessage::ErrorMaxTurns(r)
            | ResultMessage::ErrorDuringExecution(r)
            | ResultMessage::ErrorMaxBudgetUsd(r) => r.total_cost_usd,
        }
    }
}

// ─── AgentOutput ──────────────────────────────────────────────────────────

/// What an invocation produced, normalized across agent kinds.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutput {
    pub kind: AgentKind,
    /// Final text (Claude `result`, or OpenCode stdout).
    pub text: String,
    pub session_id: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub num_turns: Option<u32>,
    /// `true` when the agent reported an error result (max turns, budget…).
    pub is_error: bool,
    pub duration_ms: u64,
}
