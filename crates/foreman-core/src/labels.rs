//! PR label computation: type from the task title, areas from changed paths,
//! size from the line count.

use crate::vcs::FileChange;
use regex::Regex;
use std::sync::OnceLock;

pub const NEEDS_REVIEW: &str = "needs-review";

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Checked in order; the first match wins. No match means `feature`.
const TYPE_RULES: &[(&str, &str)] = &[
    ("bugfix", r"(?i)\b(fix(es|ed)?|bug|crash(es)?|broken|regression|hotfix|error)\b"),
    ("performance", r"(?i)\b(perf|performance|optimi[sz]e[sd]?|speed( up)?|slow|latency)\b"),
    ("refactor", r"(?i)\b(refactor(ing)?|restructure|clean ?up|rename|simplify)\b"),
    ("docs", r"(?i)\b(docs?|documentation|readme|changelog)\b"),
    ("chore", r"(?i)\b(chore|deps|dependenc(y|ies)|bump|upgrade|ci|lint)\b"),
];

const AREA_RULES: &[(&str, &str)] = &[
    ("frontend", r"(?i)(^|/)(web|ui|client|frontend|components?|pages|styles)/|\.(tsx|jsx|vue|svelte|css|scss|html)$"),
    ("backend", r"(?i)(^|/)(api|server|backend|handlers?|routes?|services?|db|migrations?)/"),
    ("tests", r"(?i)(^|/)(tests?|spec|__tests__)/|(_test|\.test|\.spec)\.[a-z]+$|(^|/)test_[^/]+$"),
    ("infra", r"(?i)(^|/)(\.github|infra|terraform|deploy|k8s|helm|docker)/|(^|/)(Dockerfile|docker-compose\.ya?ml|Makefile)$|\.tf$"),
    // Whole path segments only: `auth/`, `login.rs`, `auth_middleware.rs`; not `author.rs`.
    ("auth", r"(?i)(^|/)((auth|login|logout|oauth2?|sessions?|jwt|passwords?)(/|\.[^/]*$|$)|auth[_-])"),
];

static TYPE_RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
static AREA_RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn compile(rules: &'static [(&'static str, &'static str)]) -> Vec<(&'static str, Regex)> {
    rules
        .iter()
        .map(|(name, pat)| (*name, Regex::new(pat).unwrap()))
        .collect()
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

pub fn type_label(title: &str) -> &'static str {
    TYPE_RES
        .get_or_init(|| compile(TYPE_RULES))
        .iter()
        .find(|(_, re)| re.is_match(title))
        .map(|(name, _)| *name)
        .unwrap_or("feature")
}

/// Area labels touched by `changes`, in rule order.
pub fn area_labels(changes: &[FileChange]) -> Vec<&'static str> {
    AREA_RES
        .get_or_init(|| compile(AREA_RULES))
        .iter()
        .filter(|(_, re)| changes.iter().any(|c| re.is_match(&c.path)))
        .map(|(name, _)| *name)
        .collect()
}

pub fn size_label(lines_changed: u64) -> &'static str {
    match lines_changed {
        0..=10 => "size/xs",
        11..=100 => "size/s",
        101..=500 => "size/m",
        501..=1000 => "size/l",
        _ => "size/xl",
    }
}

/// Full label set for a PR, deduplicated in first-seen order.
pub fn compute_labels(
    base: &[String],
    title: &str,
    changes: &[FileChange],
    gates_passed: bool,
) -> Vec<String> {
    let lines: u64 = changes.iter().map(|c| c.added + c.deleted).sum();
    let mut labels: Vec<String> = Vec::new();
    let mut push = |l: &str| {
        if !labels.iter().any(|x| x == l) {
            labels.push(l.to_string());
        }
    };
    for l in base {
        push(l);
    }
    push(type_label(title));
    for l in area_labels(changes) {
        push(l);
    }
    push(size_label(lines));
    if !gates_passed {
        push(NEEDS_REVIEW);
    }
    labels
}

/// Hex color (no `#`) used when a label has to be created.
pub fn label_color(name: &str) -> &'static str {
    match name {
        "bugfix" => "d73a4a",
        "feature" => "a2eeef",
        "refactor" => "cfd3d7",
        "docs" => "0075ca",
        "performance" => "fbca04",
        "chore" => "ededed",
        "frontend" => "bfdadc",
        "backend" => "c5def5",
        "tests" => "0e8a16",
        "infra" => "5319e7",
        "auth" => "b60205",
        NEEDS_REVIEW => "e99695",
        n if n.starts_with("size/") => "ededed",
        _ => "7057ff",
    }
}
