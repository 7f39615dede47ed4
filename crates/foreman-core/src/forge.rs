use crate::error::{ForemanError, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;

#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub url: String,
    pub number: Option<u64>,
}

/// Code-hosting operations needed to publish a branch.
pub trait Forge {
    /// Make sure `name` exists in the repository, creating it when missing.
    fn ensure_label(&self, name: &str, color: &str) -> Result<()>;
    fn open_pr(&self, pr: &NewPullRequest) -> Result<PullRequest>;
    fn add_labels(&self, pr: &PullRequest, labels: &[String]) -> Result<()>;
}

/// Extract the PR number from a `.../pull/123` URL.
pub fn pr_number_from_url(url: &str) -> Option<u64> {
    let (_, tail) = url.trim().rsplit_once("/pull/")?;
    tail.split(|c: char| !c.is_ascii_digit()).next()?.parse().ok()
}

// ---------------------------------------------------------------------------
// GhCli
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LabelRow {
    name: String,
}

/// [`Forge`] backed by the GitHub CLI.
pub struct GhCli {
    program: PathBuf,
    cwd: PathBuf,
    known_labels: RefCell<Option<HashSet<String>>>,
}

impl GhCli {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self::with_program("gh", cwd)
    }

    pub fn with_program(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: cwd.into(),
            known_labels: RefCell::new(None),
        }
    }

    fn gh(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(args = ?args, "gh");
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
                command: format!("gh {}", args.first().copied().unwrap_or_default()),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn list_labels(&self) -> Result<HashSet<String>> {
        let raw = self.gh(&["label", "list", "--limit", "1000", "--json", "name"])?;
        let rows: Vec<LabelRow> = serde_json::from_str(raw.trim())?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }
}

impl Forge for GhCli {
    fn ensure_label(&self, name: &str, color: &str) -> Result<()> {
        let mut cache = self.known_labels.borrow_mut();
        if cache.is_none() {
            *cache = Some(self.list_labels()?);
        }
        let known = cache.get_or_insert_with(HashSet::new);
        if known.contains(name) {
            return Ok(());
        }
        self.gh(&["label", "create", name, "--color", color, "--force"])?;
        tracing::info!(label = name, "created label");
        known.insert(name.to_string());
        Ok(())
    }

    fn open_pr(&self, pr: &NewPullRequest) -> Result<PullRequest> {
        let mut args = vec![
            "pr", "create", "--title", &pr.title, "--body", &pr.body, "--head", &pr.head,
            "--base", &pr.base,
        ];
        if pr.draft {
            args.push("--draft");
        }
        let out = self.gh(&args)?;
        let url = out
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| l.starts_with("http"))
            .ok_or_else(|| ForemanError::CommandFailed {
                command: "gh pr create".into(),
                status: "0".into(),
                stderr: format!("no PR URL in output: {}", out.trim()),
            })?
            .to_string();
        let number = pr_number_from_url(&url);
        tracing::info!(url = %url, "opened pull request");
        Ok(PullRequest { url, number })
    }

    fn add_labels(&self, pr: &PullRequest, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let joined = labels.join(",");
        self.gh(&["pr", "edit", &pr.url, "--add-label", &joined])
            .map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_from_url() {
        assert_eq!(
            pr_number_from_url("https://github.com/acme/app/pull/42\n"),
            Some(42)
        );
        assert_eq!(pr_number_from_url("https://github.com/acme/app/pull/7/files"), Some(7));
        assert_eq!(pr_number_from_url("https://github.com/acme/app"), None);
    }

    #[cfg(unix)]
    mod fake_gh {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use tempfile::TempDir;

        /// A `gh` stand-in that logs its argv and answers the calls we make.
        fn install(dir: &Path) -> PathBuf {
            let script = dir.join("gh");
            let log = dir.join("calls.log");
            let body = format!(
                r#"#!/bin/sh
echo "$*" >> "{log}"
case "$1 $2" in
  "label list") echo '[{{"name":"agent"}},{{"name":"bugfix"}}]' ;;
  "label create") ;;
  "pr create") echo "Creating pull request"; echo "https://github.com/acme/app/pull/17" ;;
  "pr edit") ;;
  *) echo "unexpected: $*" >&2; exit 2 ;;
esac
"#,
                log = log.display()
            );
            std::fs::write(&script, body).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script
        }

        fn calls(dir: &Path) -> Vec<String> {
            std::fs::read_to_string(dir.join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        #[test]
        fn ensure_label_lists_once_and_creates_missing() {
            let dir = TempDir::new().unwrap();
            let gh = GhCli::with_program(install(dir.path()), dir.path());
            gh.ensure_label("agent", "7057ff").unwrap();
            gh.ensure_label("size/xs", "ededed").unwrap();
            gh.ensure_label("size/xs", "ededed").unwrap();

            let log = calls(dir.path());
            assert_eq!(log.iter().filter(|l| l.starts_with("label list")).count(), 1);
            let creates: Vec<_> = log.iter().filter(|l| l.starts_with("label create")).collect();
            assert_eq!(creates.len(), 1);
            assert!(creates[0].contains("size/xs"));
        }

        #[test]
        fn open_pr_returns_url_and_number() {
            let dir = TempDir::new().unwrap();
            let gh = GhCli::with_program(install(dir.path()), dir.path());
            let pr = gh
                .open_pr(&NewPullRequest {
                    title: "Agent: Fix crash".into(),
                    body: "body".into(),
                    head: "agent/t-1-fix-crash".into(),
                    base: "main".into(),
                    draft: false,
                })
                .unwrap();
            assert_eq!(pr.url, "https://github.com/acme/app/pull/17");
            assert_eq!(pr.number, Some(17));

            gh.add_labels(&pr, &["agent".into(), "bugfix".into()]).unwrap();
            let log = calls(dir.path());
            assert!(log.iter().any(|l| l.contains("--add-label agent,bugfix")));
        }

        #[test]
        fn failing_gh_reports_stderr() {
            let dir = TempDir::new().unwrap();
            let gh = GhCli::with_program(install(dir.path()), dir.path());
            let err = gh.gh(&["repo", "view"]).unwrap_err();
            assert!(matches!(
                err,
                ForemanError::CommandFailed { ref stderr, .. } if stderr.contains("unexpected")
            ));
        }
    }
}
