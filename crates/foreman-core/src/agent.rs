//! The seam between the task loop and whichever coding-agent CLI does the work.
//!
//! The CLI crate implements [`Agent`] on top of the async `coding-agent`
//! driver; tests substitute scripted fakes.

use crate::error::Result;
use crate::task::TaskRecord;
use std::path::Path;

/// What an agent run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub is_error: bool,
    pub total_cost_usd: Option<f64>,
}

impl AgentReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

pub trait Agent {
    /// Run the agent with `prompt` inside `cwd` and wait for it to finish.
    fn invoke(&self, prompt: &str, cwd: &Path) -> Result<AgentReply>;

    /// Short name for logs and PR bodies.
    fn name(&self) -> &str;
}

/// Prompt that asks the agent to implement `task` on the current branch.
pub fn task_prompt(task: &TaskRecord) -> String {
    let mut prompt = format!(
        "You are working on task {key}: {title}\n",
        key = task.key,
        title = task.title
    );
    if !task.description.trim().is_empty() {
        prompt.push_str("\n## Description\n\n");
        prompt.push_str(task.description.trim());
        prompt.push('\n');
    }
    prompt.push_str(
        "\n## Instructions\n\n\
         - Implement the task in this repository on the current branch.\n\
         - Keep the change focused on the task; do not refactor unrelated code.\n\
         - Add or update tests where it makes sense.\n\
         - Do not push, open pull requests or switch branches.\n\
         - Leave your changes in the working tree when done.\n",
    );
    prompt
}
