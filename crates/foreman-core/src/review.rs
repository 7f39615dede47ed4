//! Automated review gate.
//!
//! The reviewer is asked for a JSON verdict followed by the legacy
//! `REVIEW_STATUS:` marker line. Parsing tries the JSON object first, then
//! the marker, and otherwise reports [`ReviewVerdict::Indeterminate`].
//!
//! ```text
//!   diff ──▶ truncate ──▶ review prompt ──▶ agent ──▶ parse
//!                                                      │
//!        ┌──────────── Fail: fix prompt + commit ◀─────┤
//!        └──────────── Indeterminate: re-run ◀─────────┤
//!                                                Pass ─┴──▶ done
//! ```

use crate::agent::Agent;
use crate::config::ReviewConfig;
use crate::error::Result;
use crate::scan::{scan_diff, Finding};
use crate::task::TaskRecord;
use crate::vcs::Repo;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewVerdict {
    Pass,
    Fail { issues: Vec<String> },
    Indeterminate,
}

impl ReviewVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, ReviewVerdict::Pass)
    }

    pub fn issues(&self) -> &[String] {
        match self {
            ReviewVerdict::Fail { issues } => issues,
            _ => &[],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReviewVerdict::Pass => "PASS",
            ReviewVerdict::Fail { .. } => "FAIL",
            ReviewVerdict::Indeterminate => "INDETERMINATE",
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonVerdict {
    status: String,
    #[serde(default)]
    blocking_issues: Vec<String>,
}

/// Interpret reviewer output.
pub fn parse_review(output: &str) -> ReviewVerdict {
    if let Some(v) = parse_json_verdict(output) {
        return v;
    }
    if output.contains("REVIEW_STATUS: PASS") {
        return ReviewVerdict::Pass;
    }
    if output.contains("REVIEW_STATUS: FAIL") {
        return ReviewVerdict::Fail {
            issues: extract_blocking_issues(output),
        };
    }
    ReviewVerdict::Indeterminate
}

/// First JSON object in `output` whose `status` is PASS or FAIL.
fn parse_json_verdict(output: &str) -> Option<ReviewVerdict> {
    for (i, _) in output.match_indices('{') {
        let mut stream =
            serde_json::Deserializer::from_str(&output[i..]).into_iter::<JsonVerdict>();
        let Some(Ok(v)) = stream.next() else {
            continue;
        };
        match v.status.trim().to_ascii_uppercase().as_str() {
            "PASS" => return Some(ReviewVerdict::Pass),
            "FAIL" => {
                let issues = v
                    .blocking_issues
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                return Some(ReviewVerdict::Fail { issues });
            }
            _ => continue,
        }
    }
    None
}

/// Lines after `BLOCKING_ISSUES:` up to the next blank line, bullets stripped.
pub fn extract_blocking_issues(output: &str) -> Vec<String> {
    let Some(start) = output.find("BLOCKING_ISSUES:") else {
        return Vec::new();
    };
    let rest = &output[start + "BLOCKING_ISSUES:".len()..];
    let mut issues = Vec::new();
    let mut lines = rest.lines();

    if let Some(first) = lines.next() {
        let first = strip_bullet(first);
        if !first.is_empty() {
            issues.push(first.to_string());
        }
    }
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        let item = strip_bullet(line);
        if !item.is_empty() && !item.starts_with("REVIEW_STATUS:") {
            issues.push(item.to_string());
        }
    }
    issues.retain(|i| !i.eq_ignore_ascii_case("none"));
    issues
}

fn strip_bullet(line: &str) -> &str {
    let t = line.trim();
    let t = t
        .strip_prefix("- ")
        .or_else(|| t.strip_prefix("* "))
        .unwrap_or(t);
    match t.split_once(". ") {
        Some((n, rest)) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => rest.trim(),
        _ => t.trim(),
    }
}

// ---------------------------------------------------------------------------
// Diff truncation
// ---------------------------------------------------------------------------

/// Keep at most `budget` lines; when cut, append a marker naming the total.
pub fn truncate_diff(diff: &str, budget: usize) -> String {
    let total = diff.lines().count();
    if total <= budget {
        return diff.to_string();
    }
    let mut out: String = diff
        .lines()
        .take(budget)
        .collect::<Vec<_>>()
        .join("\n");
    out.push_str(&format!(
        "\n\n[... diff truncated: showing {budget} of {total} lines ...]\n"
    ));
    out
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

pub fn review_prompt(task: &TaskRecord, diff: &str) -> String {
    format!(
        "You are reviewing changes made for task {key}: {title}\n\
         \n\
         Review the diff below for correctness bugs, security problems, missing\n\
         error handling and changes unrelated to the task. Style nits are not\n\
         blocking.\n\
         \n\
         ```diff\n{diff}\n```\n\
         \n\
         Reply with a single JSON object on its own line:\n\
         {{\"status\": \"PASS\" | \"FAIL\", \"blocking_issues\": [\"...\"], \"summary\": \"...\"}}\n\
         \n\
         Then end your reply with exactly one of these lines:\n\
         REVIEW_STATUS: PASS\n\
         REVIEW_STATUS: FAIL\n\
         \n\
         When failing, also list the problems as:\n\
         BLOCKING_ISSUES:\n\
         - <issue>\n",
        key = task.key,
        title = task.title,
    )
}

pub fn fix_prompt(task: &TaskRecord, issues: &[String]) -> String {
    let mut prompt = format!(
        "A code review of your changes for task {key}: {title} found blocking issues.\n\
         Fix each of them on the current branch and leave the changes in the working tree.\n\n\
         ## Blocking issues\n\n",
        key = task.key,
        title = task.title,
    );
    if issues.is_empty() {
        prompt.push_str("- The reviewer did not itemize the problems; re-check the diff for bugs.\n");
    }
    for issue in issues {
        prompt.push_str(&format!("- {issue}\n"));
    }
    prompt
}

// ---------------------------------------------------------------------------
// Review loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub verdict: ReviewVerdict,
    pub attempts: u32,
    /// Static scan hits on the last reviewed diff.
    pub findings: Vec<Finding>,
}

/// Fold blocking scan hits into the agent's verdict. Any blocking hit fails
/// the review; the agent's own issues come first.
pub fn apply_scan(verdict: ReviewVerdict, findings: &[Finding]) -> ReviewVerdict {
    let blocking: Vec<String> = findings
        .iter()
        .filter(|f| f.blocking)
        .map(Finding::to_string)
        .collect();
    if blocking.is_empty() {
        return verdict;
    }
    let mut issues = match verdict {
        ReviewVerdict::Fail { issues } => issues,
        _ => Vec::new(),
    };
    for issue in blocking {
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    }
    ReviewVerdict::Fail { issues }
}

/// Review, fix and re-review up to `cfg.max_attempts` times in total.
///
/// `reviewer` judges the diff; fix passes go back to `coder`.
pub fn review_loop(
    coder: &dyn Agent,
    reviewer: &dyn Agent,
    repo: &dyn Repo,
    task: &TaskRecord,
    base: &str,
    cfg: &ReviewConfig,
) -> Result<ReviewOutcome> {
    let max_attempts = cfg.max_attempts.max(1);
    let mut verdict = ReviewVerdict::Indeterminate;
    let mut findings = Vec::new();

    for attempt in 1..=max_attempts {
        let raw = repo.diff(base)?;
        findings = if cfg.static_scan { scan_diff(&raw) } else { Vec::new() };
        let diff = truncate_diff(&raw, cfg.diff_line_budget);
        let agent_verdict = match reviewer.invoke(&review_prompt(task, &diff), repo.root()) {
            Ok(reply) => parse_review(&reply.text),
            Err(e) => {
                tracing::warn!(task = %task.key, attempt, error = %e, "review agent failed");
                ReviewVerdict::Indeterminate
            }
        };
        verdict = apply_scan(agent_verdict, &findings);
        tracing::info!(
            task = %task.key,
            attempt,
            verdict = verdict.label(),
            findings = findings.len(),
            "review finished"
        );

        if verdict.passed() {
            return Ok(ReviewOutcome {
                verdict,
                attempts: attempt,
                findings,
            });
        }
        if attempt == max_attempts {
            break;
        }
        if let ReviewVerdict::Fail { issues } = &verdict {
            if let Err(e) = coder.invoke(&fix_prompt(task, issues), repo.root()) {
                tracing::warn!(task = %task.key, attempt, error = %e, "fix pass failed");
                continue;
            }
            let message = format!("{}: address review feedback (attempt {attempt})", task.key);
            repo.commit_all(&message)?;
        }
    }

    Ok(ReviewOutcome {
        verdict,
        attempts: max_attempts,
        findings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentReply;
    use crate::error::ForemanError;
    use crate::vcs::FileChange;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    #[test]
    fn short_diff_is_unchanged() {
        let diff = (1..=500).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(truncate_diff(&diff, 500), diff);
    }

    #[test]
    fn long_diff_keeps_budget_and_names_total() {
        let diff = (1..=501).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let out = truncate_diff(&diff, 500);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[499], "line 500");
        assert!(!out.contains("line 501"));
        assert!(out.contains("501"));
        assert!(out.contains("showing 500 of 501 lines"));
    }

    #[test]
    fn json_verdict_wins() {
        let out = "Looks fine.\n{\"status\": \"FAIL\", \"blocking_issues\": [\"unchecked unwrap\"], \"summary\": \"x\"}\nREVIEW_STATUS: PASS\n";
        assert_eq!(
            parse_review(out),
            ReviewVerdict::Fail { issues: vec!["unchecked unwrap".into()] }
        );
    }

    #[test]
    fn json_inside_code_fence() {
        let out = "```json\n{\"status\":\"pass\",\"blocking_issues\":[]}\n```";
        assert_eq!(parse_review(out), ReviewVerdict::Pass);
    }

    #[test]
    fn legacy_marker_pass() {
        assert_eq!(parse_review("all good\nREVIEW_STATUS: PASS"), ReviewVerdict::Pass);
    }

    #[test]
    fn legacy_marker_fail_with_issues() {
        let out = "BLOCKING_ISSUES:\n- SQL built by string concat\n2. missing test\n\nOther notes\nREVIEW_STATUS: FAIL\n";
        assert_eq!(
            parse_review(out),
            ReviewVerdict::Fail {
                issues: vec!["SQL built by string concat".into(), "missing test".into()]
            }
        );
    }

    #[test]
    fn unrelated_json_falls_through() {
        let out = "{\"foo\": 1}\nno verdict here";
        assert_eq!(parse_review(out), ReviewVerdict::Indeterminate);
    }

    #[test]
    fn no_contract_is_indeterminate() {
        assert_eq!(parse_review("I think it's fine"), ReviewVerdict::Indeterminate);
        assert!(!ReviewVerdict::Indeterminate.passed());
    }

    // ─── review_loop ────────────────────────────────────────────────────

    struct ScriptedAgent {
        replies: RefCell<Vec<String>>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedAgent {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: RefCell::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl Agent for ScriptedAgent {
        fn invoke(&self, prompt: &str, _cwd: &Path) -> Result<AgentReply> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.replies
                .borrow_mut()
                .pop()
                .map(AgentReply::text)
                .ok_or_else(|| ForemanError::Agent("script exhausted".into()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct StaticRepo {
        root: PathBuf,
        diff: String,
        commits: RefCell<Vec<String>>,
    }

    impl StaticRepo {
        fn new() -> Self {
            Self::with_diff("+fn main() {}\n")
        }

        fn with_diff(diff: &str) -> Self {
            Self {
                root: PathBuf::from("."),
                diff: diff.to_string(),
                commits: RefCell::new(Vec::new()),
            }
        }
    }

    impl Repo for StaticRepo {
        fn root(&self) -> &Path {
            &self.root
        }
        fn current_branch(&self) -> Result<String> {
            Ok("agent/t-1".into())
        }
        fn checkout(&self, _branch: &str) -> Result<()> {
            Ok(())
        }
        fn create_branch(&self, _name: &str, _base: &str) -> Result<()> {
            Ok(())
        }
        fn commit_all(&self, message: &str) -> Result<bool> {
            self.commits.borrow_mut().push(message.to_string());
            Ok(true)
        }
        fn discard_changes(&self) -> Result<()> {
            Ok(())
        }
        fn diff(&self, _base: &str) -> Result<String> {
            Ok(self.diff.clone())
        }
        fn changes(&self, _base: &str) -> Result<Vec<FileChange>> {
            Ok(Vec::new())
        }
        fn push(&self, _branch: &str) -> Result<()> {
            Ok(())
        }
    }

    fn task() -> TaskRecord {
        TaskRecord::new("T-1", "T-1", "Fix crash")
    }

    fn cfg(max_attempts: u32) -> ReviewConfig {
        ReviewConfig { max_attempts, ..ReviewConfig::default() }
    }

    const SECRET_DIFF: &str =
        "+++ b/src/client.rs\n@@ -0,0 +1 @@\n+let token = \"ghp_abcdefghijklmnop\";\n";

    #[test]
    fn fail_then_pass_runs_one_fix() {
        let agent = ScriptedAgent::new(&[
            "BLOCKING_ISSUES:\n- leaks fd\n\nREVIEW_STATUS: FAIL",
            "fixed",
            "REVIEW_STATUS: PASS",
        ]);
        let repo = StaticRepo::new();
        let out = review_loop(&agent, &agent, &repo, &task(), "main", &cfg(3)).unwrap();
        assert!(out.verdict.passed());
        assert_eq!(out.attempts, 2);
        assert!(agent.prompts.borrow()[1].contains("- leaks fd"));
        assert_eq!(repo.commits.borrow().len(), 1);
    }

    #[test]
    fn gives_up_after_max_attempts_without_final_fix() {
        let fail = "REVIEW_STATUS: FAIL";
        let agent = ScriptedAgent::new(&[fail, "fix 1", fail, "fix 2", fail]);
        let repo = StaticRepo::new();
        let out = review_loop(&agent, &agent, &repo, &task(), "main", &cfg(3)).unwrap();
        assert!(matches!(out.verdict, ReviewVerdict::Fail { .. }));
        assert_eq!(out.attempts, 3);
        assert_eq!(agent.prompts.borrow().len(), 5);
        assert_eq!(repo.commits.borrow().len(), 2);
    }

    #[test]
    fn indeterminate_reruns_without_fix() {
        let agent = ScriptedAgent::new(&["hmm", "REVIEW_STATUS: PASS"]);
        let repo = StaticRepo::new();
        let out = review_loop(&agent, &agent, &repo, &task(), "main", &cfg(3)).unwrap();
        assert!(out.verdict.passed());
        assert_eq!(agent.prompts.borrow().len(), 2);
        assert!(repo.commits.borrow().is_empty());
    }

    #[test]
    fn blocking_scan_hit_overrides_agent_pass() {
        let agent = ScriptedAgent::new(&["REVIEW_STATUS: PASS"]);
        let repo = StaticRepo::with_diff(SECRET_DIFF);
        let out = review_loop(&agent, &agent, &repo, &task(), "main", &cfg(1)).unwrap();
        let issues = out.verdict.issues();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].starts_with("issue (security, blocking): hardcoded credential"));
        assert!(issues[0].ends_with("(src/client.rs:1)"));
        assert_eq!(out.findings.len(), 1);
    }

    #[test]
    fn scan_issues_reach_the_fix_prompt() {
        let agent = ScriptedAgent::new(&[
            "{\"status\":\"FAIL\",\"blocking_issues\":[\"no tests\"]}",
            "fixed",
            "REVIEW_STATUS: PASS",
        ]);
        let repo = StaticRepo::with_diff(SECRET_DIFF);
        let out = review_loop(&agent, &agent, &repo, &task(), "main", &cfg(2)).unwrap();
        assert_eq!(out.attempts, 2);
        let fix = &agent.prompts.borrow()[1];
        assert!(fix.contains("- no tests"));
        assert!(fix.contains("hardcoded credential"));
        assert!(!out.verdict.passed());
    }

    #[test]
    fn disabled_scan_trusts_the_agent() {
        let agent = ScriptedAgent::new(&["REVIEW_STATUS: PASS"]);
        let repo = StaticRepo::with_diff(SECRET_DIFF);
        let config = ReviewConfig { static_scan: false, ..cfg(1) };
        let out = review_loop(&agent, &agent, &repo, &task(), "main", &config).unwrap();
        assert!(out.verdict.passed());
        assert!(out.findings.is_empty());
    }

    #[test]
    fn non_blocking_findings_leave_verdict_alone() {
        let findings = scan_diff("+++ b/a.js\n@@ -0,0 +1 @@\n+console.log(x);\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(apply_scan(ReviewVerdict::Pass, &findings), ReviewVerdict::Pass);
        assert_eq!(
            apply_scan(ReviewVerdict::Indeterminate, &findings),
            ReviewVerdict::Indeterminate
        );
    }
}
