use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use crate::types::{AgentKind, InvokeOptions, PermissionMode};
use crate::{AgentError, Result};

// ─── AgentProcess ─────────────────────────────────────────────────────────

/// A running coding-agent subprocess.
///
/// Stdout is drained into a `String` by a background task so a chatty agent
/// can never fill the pipe and stall. Stderr is collected the same way and
/// surfaced when the process exits non-zero.
pub(crate) struct AgentProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout_task: JoinHandle<std::io::Result<String>>,
    stderr_task: Option<JoinHandle<String>>,
}

impl AgentProcess {
    /// Spawn the agent CLI for `prompt`.
    ///
    /// Claude reads the prompt from stdin (no argv length limits); OpenCode
    /// takes it as the positional message. Stdin is closed either way.
    ///
    /// `CLAUDECODE` is removed from the environment so a nested invocation
    /// from inside a running Claude session still works.
    pub(crate) async fn spawn(prompt: &str, opts: &InvokeOptions) -> Result<Self> {
        let mut cmd = build_command(prompt, opts);
        cmd.env_remove("CLAUDECODE");

        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        let mut process = Self::from_command(cmd, opts.executable())?;
        if opts.kind == AgentKind::Claude {
            process.write_prompt(prompt).await?;
        }
        process.close_stdin();
        Ok(process)
    }

    fn from_command(mut cmd: Command, exe: &str) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AgentError::NotFound(exe.to_string())
            } else {
                AgentError::Io(e)
            }
        })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Process("stdout not captured".into()))?;
        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).await.map(|_| buf)
        });

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if !buf.is_empty() {
                        buf.push('\n');
                    }
                    buf.push_str(&line);
                }
                buf
            })
        });

        let stdin = child.stdin.take();
        Ok(Self {
            child,
            stdin,
            stdout_task,
            stderr_task,
        })
    }

    async fn write_prompt(&mut self, prompt: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AgentError::Process("stdin already closed".into()))?;

        match stdin.write_all(prompt.as_bytes()).await {
            Ok(()) => {}
            // The agent exited without reading; its exit status tells the story.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(AgentError::Io(e)),
        }
        stdin.flush().await.map_err(AgentError::Io)?;
        Ok(())
    }

    fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Wait for exit (bounded by `timeout` when given) and return stdout.
    ///
    /// A timeout kills the child and yields [`AgentError::Timeout`]. A non-zero
    /// exit yields [`AgentError::Process`] with the captured stderr.
    pub(crate) async fn wait(mut self, timeout: Option<Duration>) -> Result<String> {
        let status = match timeout {
            None => self.child.wait().await.map_err(AgentError::Io)?,
            Some(limit) => match tokio::time::timeout(limit, self.child.wait()).await {
                Ok(res) => res.map_err(AgentError::Io)?,
                Err(_) => {
                    self.kill().await;
                    return Err(AgentError::Timeout(limit));
                }
            },
        };

        let stdout = self
            .stdout_task
            .await
            .map_err(|e| AgentError::Process(format!("stdout reader failed: {e}")))?
            .map_err(AgentError::Io)?;

        if status.success() {
            return Ok(stdout);
        }
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        Err(exit_error(status, &stderr))
    }

    /// Kill the subprocess (best-effort; errors are silently ignored).
    async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// Error for a non-zero exit: exit code (or signal) plus any captured stderr.
fn exit_error(status: ExitStatus, stderr: &str) -> AgentError {
    let head = match status.code() {
        Some(code) => format!("agent process exited with code {code}"),
        None => "agent process terminated by signal".to_string(),
    };
    let msg = if stderr.is_empty() {
        head
    } else {
        format!("{head}\nstderr: {stderr}")
    };
    AgentError::Process(msg)
}

// ─── Command builder ──────────────────────────────────────────────────────

pub(crate) fn build_command(prompt: &str, opts: &InvokeOptions) -> Command {
    let mut cmd = Command::new(opts.executable());

    match opts.kind {
        AgentKind::Claude => {
            cmd.arg("--print").arg("--output-format").arg("json");

            if let Some(model) = &opts.model {
                cmd.arg("--model").arg(model);
            }

            if let Some(max_turns) = opts.max_turns {
                cmd.arg("--max-turns").arg(max_turns.to_string());
            }

            if opts.permission_mode != PermissionMode::Default {
                cmd.arg("--permission-mode")
                    .arg(opts.permission_mode.as_str());
            }

            if !opts.allowed_tools.is_empty() {
                cmd.arg("--allowed-tools").args(&opts.allowed_tools);
            }
            // NOTE: prompt goes over stdin, not argv
        }
        AgentKind::Opencode => {
            cmd.arg("run");
            if let Some(model) = &opts.model {
                cmd.arg("--model").arg(model);
            }
            cmd.arg(prompt);
        }
    }

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    cmd
}
