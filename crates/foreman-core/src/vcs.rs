use crate::error::{ForemanError, Result};
use crate::paths::STATE_ROOTS;
use crate::task::TaskRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One changed file from `git diff --numstat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub added: u64,
    pub deleted: u64,
}

/// Working-copy operations the task loop needs.
pub trait Repo {
    fn root(&self) -> &Path;
    fn current_branch(&self) -> Result<String>;
    fn checkout(&self, branch: &str) -> Result<()>;
    /// Create (or reset) `name` at `base` and switch to it.
    fn create_branch(&self, name: &str, base: &str) -> Result<()>;
    /// Stage everything outside foreman's state directories and commit.
    /// Returns false when there was nothing to commit.
    fn commit_all(&self, message: &str) -> Result<bool>;
    /// Drop uncommitted edits and untracked files, leaving foreman's state alone.
    fn discard_changes(&self) -> Result<()>;
    /// Diff of the current branch against `base`, or the staged diff when that is empty.
    fn diff(&self, base: &str) -> Result<String>;
    fn changes(&self, base: &str) -> Result<Vec<FileChange>>;
    fn push(&self, branch: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

const MAX_SLUG: usize = 60;

/// Lowercase kebab-case, cut to 60 characters at a `-` boundary.
pub fn kebab(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let out = out.trim_matches('-');
    if out.len() <= MAX_SLUG {
        return out.to_string();
    }
    let head = &out[..MAX_SLUG];
    match head.rfind('-') {
        Some(i) if i > 0 => head[..i].to_string(),
        _ => head.to_string(),
    }
}

/// `{prefix}/{key}-{kebab(title)}`.
pub fn branch_name(prefix: &str, task: &TaskRecord) -> String {
    let key = kebab(&task.key);
    let slug = kebab(&task.title);
    let leaf = match (key.is_empty(), slug.is_empty()) {
        (false, false) => format!("{key}-{slug}"),
        (false, true) => key,
        (true, false) => slug,
        (true, true) => "task".to_string(),
    };
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        leaf
    } else {
        format!("{prefix}/{leaf}")
    }
}

/// Parse `git diff --numstat`. Binary files (`-\t-\tpath`) count as zero lines.
pub fn parse_numstat(output: &str) -> Vec<FileChange> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let added = parts.next()?;
            let deleted = parts.next()?;
            let path = parts.next()?.trim();
            if path.is_empty() {
                return None;
            }
            Some(FileChange {
                path: path.to_string(),
                added: added.trim().parse().unwrap_or(0),
                deleted: deleted.trim().parse().unwrap_or(0),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// [`Repo`] backed by the `git` binary.
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(args = ?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| ForemanError::Spawn {
                program: "git".into(),
                source: e,
            })?;
        if !output.status.success() {
            return Err(ForemanError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// `git <args> -- . :(exclude).agent :(exclude).coo`
    fn git_outside_state(&self, args: &[&str]) -> Result<String> {
        let excludes: Vec<String> = STATE_ROOTS
            .iter()
            .map(|dir| format!(":(exclude){dir}"))
            .collect();
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--", "."]);
        full.extend(excludes.iter().map(String::as_str));
        self.git(&full)
    }
}

impl Repo for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?.trim().to_string())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", branch]).map(|_| ())
    }

    fn create_branch(&self, name: &str, base: &str) -> Result<()> {
        self.git(&["checkout", "-B", name, base]).map(|_| ())
    }

    fn commit_all(&self, message: &str) -> Result<bool> {
        self.git_outside_state(&["add", "-A"])?;
        if self.git(&["diff", "--cached", "--name-only"])?.trim().is_empty() {
            return Ok(false);
        }
        self.git(&["commit", "-m", message])?;
        Ok(true)
    }

    fn discard_changes(&self) -> Result<()> {
        self.git(&["reset", "-q"])?;
        self.git_outside_state(&["checkout"])?;
        let mut clean = vec!["clean", "-fdq"];
        for dir in STATE_ROOTS {
            clean.extend(["-e", *dir]);
        }
        self.git(&clean).map(|_| ())
    }

    fn diff(&self, base: &str) -> Result<String> {
        let range = format!("{base}...HEAD");
        match self.git(&["diff", &range]) {
            Ok(d) if !d.trim().is_empty() => Ok(d),
            Ok(_) => self.git(&["diff", "--cached"]),
            Err(e) => {
                tracing::warn!(base, error = %e, "branch diff failed, using staged changes");
                self.git(&["diff", "--cached"])
            }
        }
    }

    fn changes(&self, base: &str) -> Result<Vec<FileChange>> {
        let range = format!("{base}...HEAD");
        Ok(parse_numstat(&self.git(&["diff", "--numstat", &range])?))
    }

    fn push(&self, branch: &str) -> Result<()> {
        self.git(&["push", "-u", "origin", branch]).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
