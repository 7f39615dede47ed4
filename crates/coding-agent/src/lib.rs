//! `coding-agent`: headless driver for coding-agent CLIs.
//!
//! Shells out to Claude Code (`claude --print --output-format json`) or
//! OpenCode (`opencode run`) with a composed prompt and returns what the agent
//! produced. The task runner in `foreman` calls this once per implementation,
//! review and fix pass.
//!
//! # Architecture
//!
//! ```text
//! InvokeOptions
//!     │
//!     ▼
//! AgentProcess   ← spawns the CLI, prompt on stdin (claude) or argv (opencode)
//!     │             drains stdout/stderr in background tasks
//!     ▼
//! parse_output   ← claude JSON result → AgentOutput, or plain text
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use coding_agent::{run, AgentKind, InvokeOptions};
//! use std::time::Duration;
//!
//! let opts = InvokeOptions {
//!     kind: AgentKind::Claude,
//!     timeout: Some(Duration::from_secs(30 * 60)),
//!     ..Default::default()
//! };
//! let out = run("Implement the task described in TASK.md", opts).await?;
//! println!("{}", out.text);
//! ```

pub mod error;
pub mod runner;
pub mod types;

pub(crate) mod process;


pub use error::AgentError;
pub use runner::run;
pub use types::{
    AgentKind, AgentOutput, InvokeOptions, PermissionMode, ResultError, ResultMessage,
    ResultSuccess,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;
