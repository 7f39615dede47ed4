//! Deterministic diff scan run alongside the review agent.
//!
//! Added lines are matched against an ordered rule table. Each hit becomes a
//! [`Finding`] rendered as a conventional comment
//! (`issue (security, blocking): ...`). Blocking findings turn the review
//! verdict into a failure no matter what the agent said.
//!
//! [`split_advice`] looks at the changed-file list and suggests splitting a
//! PR that spans too many file types, files or areas.

use crate::labels::{area_labels, size_label};
use crate::vcs::FileChange;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentLabel {
    Issue,
    Suggestion,
    Nitpick,
    Todo,
}

impl CommentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentLabel::Issue => "issue",
            CommentLabel::Suggestion => "suggestion",
            CommentLabel::Nitpick => "nitpick",
            CommentLabel::Todo => "todo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: &'static str,
    pub label: CommentLabel,
    pub subject: String,
    pub file: String,
    pub line: u32,
    pub blocking: bool,
    pub security: bool,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut decorations = Vec::new();
        if self.security {
            decorations.push("security");
        }
        decorations.push(if self.blocking { "blocking" } else { "non-blocking" });
        write!(
            f,
            "{} ({}): {} ({}:{})",
            self.label.as_str(),
            decorations.join(", "),
            self.subject,
            self.file,
            self.line
        )
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct ScanRule {
    id: &'static str,
    label: CommentLabel,
    subject: &'static str,
    pattern: &'static str,
    blocking: bool,
    security: bool,
    /// Also applies to comment lines.
    in_comments: bool,
}

/// At most one finding per rule per line.
const RULES: &[ScanRule] = &[
    ScanRule {
        id: "sql_injection",
        label: CommentLabel::Issue,
        subject: "SQL built from interpolated input; use bound parameters",
        pattern: r#"(?i)["'`]\s*(SELECT|INSERT|UPDATE|DELETE)\b[^"'`]*(\$?\{|["'`]\s*\+\s*\w|%s)"#,
        blocking: true,
        security: true,
        in_comments: false,
    },
    ScanRule {
        id: "hardcoded_secret",
        label: CommentLabel::Issue,
        subject: "hardcoded credential; read it from the environment",
        pattern: r#"(?i)\b(api[_-]?key|secret|password|passwd|token)\s*[:=]\s*["'][^"'\s]{8,}["']|\b(bearer|authorization)\s*[:=]\s*["'][^"']{20,}["']"#,
        blocking: true,
        security: true,
        in_comments: false,
    },
    ScanRule {
        id: "unsafe_html",
        label: CommentLabel::Issue,
        subject: "raw HTML or eval from a string; escape or use text content",
        pattern: r"\binnerHTML\s*=|\bdocument\.write\s*\(|\beval\s*\(",
        blocking: false,
        security: true,
        in_comments: false,
    },
    ScanRule {
        id: "debug_output",
        label: CommentLabel::Nitpick,
        subject: "debug output left in",
        pattern: r"\bconsole\.(log|debug|warn)\s*\(|\bdbg!\s*\(",
        blocking: false,
        security: false,
        in_comments: false,
    },
    ScanRule {
        id: "complex_conditional",
        label: CommentLabel::Suggestion,
        subject: "long boolean chain; consider naming the condition",
        pattern: r"\bif\b.*(&&.*&&|\|\|.*\|\|)",
        blocking: false,
        security: false,
        in_comments: false,
    },
    ScanRule {
        id: "magic_number",
        label: CommentLabel::Nitpick,
        subject: "magic number; consider a named constant",
        pattern: r"\b(\d{4,}|\d+\.\d{4,})\b",
        blocking: false,
        security: false,
        in_comments: false,
    },
    ScanRule {
        id: "todo",
        label: CommentLabel::Todo,
        subject: "unresolved marker",
        pattern: r"\b(TODO|FIXME|XXX|HACK)\b",
        blocking: false,
        security: false,
        in_comments: true,
    },
];

/// Numbers common enough not to count as magic.
const ALLOWED_NUMBERS: &[&str] = &["1000", "1024", "3600", "8080"];

static RULE_RES: OnceLock<Vec<Regex>> = OnceLock::new();
static HUNK_RE: OnceLock<Regex> = OnceLock::new();

fn rule_res() -> &'static [Regex] {
    RULE_RES.get_or_init(|| RULES.iter().map(|r| Regex::new(r.pattern).unwrap()).collect())
}

fn is_comment(code: &str) -> bool {
    let t = code.trim_start();
    t.starts_with("//") || t.starts_with('#') || t.starts_with('*') || t.starts_with("/*")
}

// ---------------------------------------------------------------------------
// Diff parsing
// ---------------------------------------------------------------------------

/// One added line with its new-file line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub file: String,
    pub line: u32,
    pub code: String,
}

/// Added lines of a unified diff. Deleted files and lines outside a hunk are
/// skipped.
pub fn added_lines(diff: &str) -> Vec<AddedLine> {
    let hunk_re = HUNK_RE.get_or_init(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)").unwrap());
    let mut out = Vec::new();
    let mut file: Option<String> = None;
    let mut line_no: u32 = 0;
    let mut in_hunk = false;

    for line in diff.lines() {
        if line.starts_with("diff --git ") {
            file = None;
            in_hunk = false;
            continue;
        }
        if let Some(path) = line.strip_prefix("+++ ") {
            file = path.strip_prefix("b/").map(str::to_string);
            in_hunk = false;
            continue;
        }
        if line.starts_with("--- ") && !in_hunk {
            continue;
        }
        if let Some(caps) = hunk_re.captures(line) {
            line_no = caps[1].parse().unwrap_or(1);
            in_hunk = true;
            continue;
        }
        if !in_hunk {
            continue;
        }
        let Some(path) = &file else { continue };
        if let Some(code) = line.strip_prefix('+') {
            out.push(AddedLine {
                file: path.clone(),
                line: line_no,
                code: code.to_string(),
            });
            line_no += 1;
        } else if line.starts_with(' ') || line.is_empty() {
            line_no += 1;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

pub fn scan_diff(diff: &str) -> Vec<Finding> {
    let res = rule_res();
    let mut findings = Vec::new();
    for added in added_lines(diff) {
        let code = added.code.trim();
        if code.is_empty() {
            continue;
        }
        let comment = is_comment(code);
        for (rule, re) in RULES.iter().zip(res) {
            if comment && !rule.in_comments {
                continue;
            }
            let Some(m) = re.find(code) else { continue };
            if rule.id == "magic_number" && ALLOWED_NUMBERS.contains(&m.as_str()) {
                continue;
            }
            findings.push(Finding {
                rule: rule.id,
                label: rule.label,
                subject: rule.subject.to_string(),
                file: added.file.clone(),
                line: added.line,
                blocking: rule.blocking,
                security: rule.security,
            });
        }
    }
    findings
}

/// Markdown section listing `findings`, or `None` when there are none.
pub fn findings_markdown(findings: &[Finding]) -> Option<String> {
    if findings.is_empty() {
        return None;
    }
    let mut md = String::from("### Static scan\n\n");
    for f in findings {
        md.push_str(&format!("- {f}\n"));
    }
    Some(md)
}

// ---------------------------------------------------------------------------
// Split advice
// ---------------------------------------------------------------------------

const MAX_FILE_TYPES: usize = 3;
const MAX_FILES: usize = 15;
const MAX_AREAS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitAdvice {
    pub reasons: Vec<String>,
    pub suggested_splits: Vec<String>,
}

impl SplitAdvice {
    pub fn should_split(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn to_markdown(&self) -> Option<String> {
        if !self.should_split() {
            return None;
        }
        let mut md = String::from("### Consider splitting this PR\n\n");
        for r in &self.reasons {
            md.push_str(&format!("- {r}\n"));
        }
        if !self.suggested_splits.is_empty() {
            md.push_str("\nSuggested splits:\n");
            for (i, s) in self.suggested_splits.iter().enumerate() {
                md.push_str(&format!("{}. {s}\n", i + 1));
            }
        }
        Some(md)
    }
}

pub fn split_advice(changes: &[FileChange]) -> SplitAdvice {
    let mut advice = SplitAdvice::default();

    let extensions: BTreeSet<&str> = changes
        .iter()
        .filter_map(|c| c.path.rsplit_once('.').map(|(_, ext)| ext))
        .filter(|ext| !ext.contains('/'))
        .collect();
    if extensions.len() > MAX_FILE_TYPES {
        let list: Vec<&str> = extensions.into_iter().collect();
        advice.reasons.push(format!("{} file types: {}", list.len(), list.join(", ")));
    }

    if changes.len() > MAX_FILES {
        advice.reasons.push(format!("{} files changed", changes.len()));
    }

    let lines: u64 = changes.iter().map(|c| c.added + c.deleted).sum();
    if size_label(lines) == "size/xl" {
        advice.reasons.push(format!("{lines} lines changed"));
    }

    let areas = area_labels(changes);
    if areas.len() > MAX_AREAS {
        advice.reasons.push(format!("{} areas: {}", areas.len(), areas.join(", ")));
        advice.suggested_splits = areas
            .iter()
            .filter(|a| **a != "tests")
            .map(|a| format!("{a} changes with their tests"))
            .collect();
    }
    advice
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
