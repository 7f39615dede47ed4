use crate::config::{TestGateConfig, TimeoutPolicy};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Combined output is capped to this many bytes, keeping the tail.
pub const MAX_OUTPUT: usize = 10 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestGateOutcome {
    pub decision: Decision,
    pub reason: String,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub output: String,
}

impl TestGateOutcome {
    pub fn passed(&self) -> bool {
        self.decision == Decision::Approve
    }

    /// The hook contract: one line of JSON with `decision` and `reason`.
    pub fn to_json_line(&self) -> String {
        serde_json::json!({
            "decision": self.decision,
            "reason": self.reason,
        })
        .to_string()
    }

    fn approve(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Approve,
            reason: reason.into(),
            timed_out: false,
            exit_code: None,
            duration_ms: 0,
            output: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// TestGate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TestGate {
    pub command: Option<String>,
    pub timeout: Duration,
    pub on_timeout: TimeoutPolicy,
    pub poll_interval: Duration,
}

impl TestGate {
    pub fn from_config(cfg: &TestGateConfig) -> Self {
        Self {
            command: cfg.command.clone(),
            timeout: Duration::from_secs(cfg.timeout_seconds),
            on_timeout: cfg.on_timeout,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Run the configured command through `sh -c` in `cwd`.
    pub fn run(&self, cwd: &Path) -> TestGateOutcome {
        let Some(command) = self.command.as_deref().filter(|c| !c.trim().is_empty()) else {
            return TestGateOutcome::approve("no test command configured");
        };
        tracing::info!(command, timeout_secs = self.timeout.as_secs(), "running test gate");
        let started = Instant::now();

        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                return TestGateOutcome {
                    decision: Decision::Block,
                    reason: format!("failed to spawn test command: {e}"),
                    timed_out: false,
                    exit_code: None,
                    duration_ms: elapsed_ms(started),
                    output: String::new(),
                }
            }
        };

        // Drain pipes on their own threads so a chatty suite cannot fill the buffer.
        let stdout_thread = spawn_reader(child.stdout.take());
        let stderr_thread = spawn_reader(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) if started.elapsed() >= self.timeout => break Err(None),
                Ok(None) => std::thread::sleep(self.poll_interval),
                Err(e) => break Err(Some(e)),
            }
        };

        let status = match status {
            Ok(s) => s,
            Err(None) => {
                kill_process(child.id());
                let _ = child.wait();
                return self.timed_out(started);
            }
            Err(Some(e)) => {
                kill_process(child.id());
                return TestGateOutcome {
                    decision: Decision::Block,
                    reason: format!("failed to wait for test command: {e}"),
                    timed_out: false,
                    exit_code: None,
                    duration_ms: elapsed_ms(started),
                    output: String::new(),
                };
            }
        };

        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();
        let output = format_output(&stdout, &stderr);
        let duration_ms = elapsed_ms(started);

        if status.success() {
            tracing::info!(duration_ms, "tests passed");
            TestGateOutcome {
                decision: Decision::Approve,
                reason: "tests passed".to_string(),
                timed_out: false,
                exit_code: status.code(),
                duration_ms,
                output,
            }
        } else {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            tracing::warn!(exit = %code, duration_ms, "tests failed");
            TestGateOutcome {
                decision: Decision::Block,
                reason: format!("tests failed (exit {code})"),
                timed_out: false,
                exit_code: status.code(),
                duration_ms,
                output,
            }
        }
    }

    fn timed_out(&self, started: Instant) -> TestGateOutcome {
        let secs = self.timeout.as_secs();
        let (decision, reason) = match self.on_timeout {
            TimeoutPolicy::Pass => (
                Decision::Approve,
                format!("tests timed out after {secs}s; approved per on_timeout=pass"),
            ),
            TimeoutPolicy::Fail => (
                Decision::Block,
                format!("tests timed out after {secs}s"),
            ),
        };
        tracing::warn!(timeout_secs = secs, decision = ?decision, "test command timed out");
        TestGateOutcome {
            decision,
            reason,
            timed_out: true,
            exit_code: None,
            duration_ms: elapsed_ms(started),
            output: String::new(),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = pipe {
            let _ = r.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Combine stdout/stderr and cap to [`MAX_OUTPUT`] bytes, keeping the tail.
fn format_output(stdout: &str, stderr: &str) -> String {
    let output = if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    };
    let trimmed = output.trim();
    if trimmed.len() <= MAX_OUTPUT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_OUTPUT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// SIGKILL by PID. Best-effort.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gate(command: Option<&str>, timeout_secs: u64, on_timeout: TimeoutPolicy) -> TestGate {
        TestGate {
            command: command.map(str::to_string),
            timeout: Duration::from_secs(timeout_secs),
            on_timeout,
            poll_interval: Duration::from_millis(50),
        }
    }

    #[test]
    fn no_command_approves() {
        let dir = TempDir::new().unwrap();
        let out = gate(None, 5, TimeoutPolicy::Pass).run(dir.path());
        assert!(out.passed());
        assert_eq!(out.reason, "no test command configured");
        assert_eq!(
            out.to_json_line(),
            r#"{"decision":"approve","reason":"no test command configured"}"#
        );
    }

    #[test]
    fn passing_command_approves() {
        let dir = TempDir::new().unwrap();
        let out = gate(Some("echo ok"), 5, TimeoutPolicy::Pass).run(dir.path());
        assert!(out.passed());
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.output, "ok");
    }

    #[test]
    fn failing_command_blocks() {
        let dir = TempDir::new().unwrap();
        let out = gate(Some("echo boom >&2; exit 3"), 5, TimeoutPolicy::Pass).run(dir.path());
        assert!(!out.passed());
        assert_eq!(out.exit_code, Some(3));
        assert!(out.reason.contains("exit 3"));
        assert!(out.output.contains("boom"));
        assert!(!out.to_json_line().contains('\n'));
    }

    #[test]
    fn timeout_fails_open_by_default() {
        let dir = TempDir::new().unwrap();
        let out = gate(Some("sleep 30"), 1, TimeoutPolicy::Pass).run(dir.path());
        assert!(out.timed_out);
        assert!(out.passed());
        assert!(out.duration_ms < 10_000);
    }

    #[test]
    fn timeout_can_block() {
        let dir = TempDir::new().unwrap();
        let out = gate(Some("sleep 30"), 1, TimeoutPolicy::Fail).run(dir.path());
        assert!(out.timed_out);
        assert_eq!(out.decision, Decision::Block);
    }

    #[test]
    fn runs_in_given_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        let out = gate(Some("test -f marker"), 5, TimeoutPolicy::Pass).run(dir.path());
        assert!(out.passed());
    }

    #[test]
    fn output_keeps_tail() {
        let long = "x".repeat(MAX_OUTPUT + 100) + "END";
        let capped = format_output(&long, "");
        assert_eq!(capped.len(), MAX_OUTPUT);
        assert!(capped.ends_with("END"));
    }
}
