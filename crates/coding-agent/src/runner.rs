use std::time::Instant;

use crate::process::AgentProcess;
use crate::types::{AgentKind, AgentOutput, InvokeOptions, ResultMessage};
use crate::{AgentError, Result};

// ─── Public API ───────────────────────────────────────────────────────────

/// Drive a single headless agent invocation to completion.
///
/// Spawns the configured CLI, waits for it to exit (bounded by
/// `opts.timeout`), and normalizes its stdout into an [`AgentOutput`].
///
/// Returns `Err` when the executable is missing, the process exits non-zero,
/// the timeout elapses, or Claude's JSON result cannot be parsed.
///
/// # Example
///
/// ```rust,ignore
/// use coding_agent::{run, AgentKind, InvokeOptions};
///
/// let out = run("Fix the failing test in src/lib.rs", InvokeOptions {
///     kind: AgentKind::Claude,
///     ..Default::default()
/// }).await?;
/// println!("{}", out.text);
/// ```
pub async fn run(prompt: impl Into<String>, opts: InvokeOptions) -> Result<AgentOutput> {
    let prompt = prompt.into();
    let started = Instant::now();

    tracing::debug!(
        agent = %opts.kind,
        exe = opts.executable(),
        prompt_bytes = prompt.len(),
        "spawning agent"
    );
    let process = AgentProcess::spawn(&prompt, &opts).await?;
    let stdout = process.wait(opts.timeout).await?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let output = parse_output(opts.kind, &stdout, duration_ms)?;
    tracing::debug!(
        agent = %opts.kind,
        duration_ms,
        is_error = output.is_error,
        "agent finished"
    );
    Ok(output)
}

// ─── Output parsing ───────────────────────────────────────────────────────

/// Normalize raw stdout into an [`AgentOutput`].
///
/// Claude's JSON result is taken from the whole output or, failing that, its
/// last non-empty line (some builds print warnings first). Output that is not
/// JSON at all is treated as plain text, which covers custom executables
/// configured with `--output-format text`.
pub(crate) fn parse_output(kind: AgentKind, stdout: &str, duration_ms: u64) -> Result<AgentOutput> {
    match kind {
        AgentKind::Opencode => Ok(AgentOutput {
            kind,
            text: stdout.trim().to_string(),
            session_id: None,
            total_cost_usd: None,
            num_turns: None,
            is_error: false,
            duration_ms,
        }),
        AgentKind::Claude => {
            let trimmed = stdout.trim();
            match parse_result_message(trimmed) {
                Some(Ok(msg)) => Ok(AgentOutput {
                    kind,
                    text: msg.result_text().unwrap_or("").to_string(),
                    session_id: Some(msg.session_id().to_string()),
                    total_cost_usd: Some(msg.total_cost_usd()),
                    num_turns: Some(msg.num_turns()),
                    is_error: msg.is_error(),
                    duration_ms,
                }),
                Some(Err(source)) => Err(AgentError::Parse {
                    output: truncate_for_error(trimmed),
                    source,
                }),
                None => Ok(AgentOutput {
                    kind,
                    text: trimmed.to_string(),
                    session_id: None,
                    total_cost_usd: None,
                    num_turns: None,
                    is_error: false,
                    duration_ms,
                }),
            }
        }
    }
}

/// `None` when the output does not look like JSON at all.
fn parse_result_message(
    trimmed: &str,
) -> Option<std::result::Result<ResultMessage, serde_json::Error>> {
    if let Ok(msg) = serde_json::from_str::<ResultMessage>(trimmed) {
        return Some(Ok(msg));
    }
    let last = trimmed.lines().rev().find(|l| !l.trim().is_empty())?.trim();
    if !last.starts_with('{') {
        return None;
    }
    Some(serde_json::from_str::<ResultMessage>(last))
}

fn truncate_for_error(s: &str) -> String {
    const MAX: usize = 500;
    if s.len() <= MAX {
        return s.to_string();
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

// ─── Tests ────────────────────────────────────────────────────────────────
