use super::TaskSource;
use crate::error::{ForemanError, Result};
use crate::task::{TaskRecord, TaskState};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

static LINE_RE: OnceLock<Regex> = OnceLock::new();

fn line_re() -> &'static Regex {
    LINE_RE.get_or_init(|| {
        Regex::new(r"^(?P<id>\S+)\s+(?:\[[^\]]*\]\s+)*(?P<status>[A-Za-z_\-]+)\s+-\s+(?P<title>.+)$")
            .unwrap()
    })
}

/// Parse one `bd list` line, e.g. `T-1 [P0] [bug] open - Fix crash`.
/// Returns the record and its raw status.
pub fn parse_list_line(line: &str) -> Option<(TaskRecord, String)> {
    let caps = line_re().captures(line.trim())?;
    let id = caps["id"].to_string();
    let status = caps["status"].to_ascii_lowercase();
    let mut task = TaskRecord::new(id.clone(), id, caps["title"].trim());
    task.state = match status.as_str() {
        "in_progress" | "in-progress" => TaskState::InProgress,
        "closed" | "done" => TaskState::Done,
        _ => TaskState::Open,
    };
    Some((task, status))
}

/// [`TaskSource`] backed by the Beads `bd` CLI.
pub struct BeadsCli {
    program: PathBuf,
    cwd: PathBuf,
    status: Regex,
}

impl BeadsCli {
    /// `status_pattern` is matched against the whole status column.
    pub fn new(program: impl Into<PathBuf>, cwd: &Path, status_pattern: &str) -> Result<Self> {
        let status = Regex::new(&format!("^(?:{status_pattern})$")).map_err(|e| {
            ForemanError::InvalidConfig(format!("bad status pattern '{status_pattern}': {e}"))
        })?;
        Ok(Self {
            program: program.into(),
            cwd: cwd.to_path_buf(),
            status,
        })
    }

    fn bd(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(args = ?args, "bd");
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.cwd)
            .output()
            .map_err(|e| ForemanError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;
        if !output.status.success() {
            return Err(ForemanError::CommandFailed {
                command: format!("bd {}", args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TaskSource for BeadsCli {
    fn name(&self) -> &str {
        "beads"
    }

    fn list_pending(&self) -> Result<Vec<TaskRecord>> {
        let out = self.bd(&["list"])?;
        let tasks: Vec<TaskRecord> = out
            .lines()
            .filter_map(parse_list_line)
            .filter(|(_, status)| self.status.is_match(status))
            .map(|(task, _)| task)
            .collect();
        tracing::info!(count = tasks.len(), "beads tasks pending");
        Ok(tasks)
    }

    fn mark_in_progress(&self, task: &TaskRecord) -> Result<()> {
        self.bd(&["update", &task.id, "--status", "in_progress"])
            .map(|_| ())
    }

    fn mark_in_review(&self, task: &TaskRecord, pr_url: &str) -> Result<()> {
        let note = format!("PR opened: {pr_url}");
        self.bd(&["update", &task.id, "--notes", &note]).map(|_| ())
    }

    fn close(&self, task: &TaskRecord, note: &str) -> Result<()> {
        self.bd(&["close", &task.id, "--reason", note]).map(|_| ())
    }
}
