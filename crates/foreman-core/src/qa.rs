//! Staging → QA → publish for generated business artifacts.
//!
//! ```text
//! staging/{date}/*.json ──validate──┬── fail ──▶ staging/{date}/rejected/ (+ .reasons.txt)
//!                                   └── pass ──▶ send/post ──▶ outputs/{date}/
//!                                                   │
//!                                                   └─ over cap / send error: stays staged
//! ```

use crate::error::Result;
use crate::io::{atomic_write, ensure_dir};
use crate::metrics::{Counter, MetricsStore};
use crate::outbound::{Outbound, OutgoingEmail};
use crate::paths;
use crate::warmup::WarmupStore;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const MAX_SUBJECT_CHARS: usize = 120;
pub const MAX_TWEET_CHARS: usize = 280;

const PLACEHOLDERS: &[&str] = &["{{", "}}", "[FIRST_NAME]", "[NAME]", "[COMPANY]", "TODO"];

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").unwrap())
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Artifact {
    Email {
        #[serde(default)]
        to: String,
        #[serde(default)]
        subject: String,
        #[serde(default)]
        body: String,
    },
    Tweet {
        #[serde(default)]
        text: String,
    },
    Lead {
        #[serde(default)]
        name: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        handle: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        company: Option<String>,
    },
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Email { .. } => "email",
            Artifact::Tweet { .. } => "tweet",
            Artifact::Lead { .. } => "lead",
        }
    }

    fn text_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Artifact::Email { to, subject, body } => {
                vec![("to", to.as_str()), ("subject", subject.as_str()), ("body", body.as_str())]
            }
            Artifact::Tweet { text } => vec![("text", text.as_str())],
            Artifact::Lead {
                name,
                email,
                handle,
                url,
                company,
            } => {
                let mut v = vec![("name", name.as_str())];
                for (k, f) in [("email", email), ("handle", handle), ("url", url), ("company", company)] {
                    if let Some(s) = f {
                        v.push((k, s.as_str()));
                    }
                }
                v
            }
        }
    }
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn present(s: &Option<String>) -> bool {
    s.as_deref().is_some_and(|v| !blank(v))
}

/// Reasons `artifact` must not be published. Empty means it passes.
pub fn validate(artifact: &Artifact) -> Vec<String> {
    let mut reasons = Vec::new();
    match artifact {
        Artifact::Email { to, subject, body } => {
            if !email_re().is_match(to.trim()) {
                reasons.push(format!("recipient '{to}' is not a valid email address"));
            }
            if blank(subject) {
                reasons.push("subject is empty".to_string());
            } else if subject.chars().count() > MAX_SUBJECT_CHARS {
                reasons.push(format!(
                    "subject is {} characters (max {MAX_SUBJECT_CHARS})",
                    subject.chars().count()
                ));
            }
            if blank(body) {
                reasons.push("body is empty".to_string());
            }
        }
        Artifact::Tweet { text } => {
            let n = text.chars().count();
            if blank(text) {
                reasons.push("tweet is empty".to_string());
            } else if n > MAX_TWEET_CHARS {
                reasons.push(format!("tweet is {n} characters (max {MAX_TWEET_CHARS})"));
            }
        }
        Artifact::Lead {
            name,
            email,
            handle,
            url,
            ..
        } => {
            if blank(name) {
                reasons.push("lead has no name".to_string());
            }
            if !(present(email) || present(handle) || present(url)) {
                reasons.push("lead has no contact (email, handle or url)".to_string());
            }
        }
    }
    for (field, value) in artifact.text_fields() {
        if let Some(p) = find_placeholder(value) {
            reasons.push(format!("{field} contains unresolved placeholder '{p}'"));
        }
    }
    reasons
}

fn find_placeholder(text: &str) -> Option<&'static str> {
    if let Some(p) = PLACEHOLDERS.iter().find(|p| text.contains(**p)) {
        return Some(p);
    }
    text.to_ascii_lowercase()
        .contains("lorem ipsum")
        .then_some("lorem ipsum")
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct QaOptions {
    /// Staging date to process.
    pub date: NaiveDate,
    /// Calendar day the warm-up cap is charged against.
    pub today: NaiveDate,
    pub dry_run: bool,
    pub skip_send: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub file: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaReport {
    pub date: NaiveDate,
    pub passed: Vec<String>,
    pub rejected: Vec<Rejection>,
    pub sent: Vec<String>,
    pub posted: Vec<String>,
    pub moved: Vec<String>,
    pub deferred: Vec<String>,
    pub errors: Vec<String>,
}

impl QaReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            passed: Vec::new(),
            rejected: Vec::new(),
            sent: Vec::new(),
            posted: Vec::new(),
            moved: Vec::new(),
            deferred: Vec::new(),
            errors: Vec::new(),
        }
    }
}

pub struct QaPipeline<'a> {
    root: PathBuf,
    outbound: &'a dyn Outbound,
    metrics: MetricsStore,
    warmup: WarmupStore,
}

impl<'a> QaPipeline<'a> {
    pub fn new(root: &Path, outbound: &'a dyn Outbound) -> Self {
        Self {
            root: root.to_path_buf(),
            outbound,
            metrics: MetricsStore::new(root),
            warmup: WarmupStore::new(root),
        }
    }

    pub fn run(&self, opts: &QaOptions) -> Result<QaReport> {
        let staging = paths::staging_dir(&self.root, opts.date);
        let mut report = QaReport::new(opts.date);
        let files = staged_files(&staging)?;
        if files.is_empty() {
            tracing::info!(dir = %staging.display(), "nothing staged");
            return Ok(report);
        }

        let mut passed: Vec<(PathBuf, Artifact)> = Vec::new();
        for path in files {
            let name = file_name(&path);
            let reasons = match read_artifact(&path) {
                Ok(artifact) => {
                    let reasons = validate(&artifact);
                    if reasons.is_empty() {
                        report.passed.push(name.clone());
                        passed.push((path.clone(), artifact));
                    }
                    reasons
                }
                Err(reason) => vec![reason],
            };
            if reasons.is_empty() {
                continue;
            }
            tracing::warn!(file = %name, reasons = ?reasons, "artifact rejected");
            if !opts.dry_run {
                self.reject(&path, opts.date, &reasons)?;
            }
            report.rejected.push(Rejection {
                file: name,
                reasons,
            });
        }

        if opts.dry_run {
            return Ok(report);
        }
        if !report.passed.is_empty() {
            self.metrics.record(Counter::QaPassed, report.passed.len() as u64);
        }
        if !report.rejected.is_empty() {
            self.metrics.record(Counter::QaFailed, report.rejected.len() as u64);
        }

        let outputs = paths::outputs_dir(&self.root, opts.date);
        for (path, artifact) in passed {
            let name = file_name(&path);
            if opts.skip_send {
                move_into(&path, &outputs)?;
                report.moved.push(name);
                continue;
            }
            match &artifact {
                Artifact::Email { to, subject, body } => {
                    if self.warmup.remaining(opts.today)? == 0 {
                        tracing::info!(file = %name, "daily email cap reached, deferring");
                        report.deferred.push(name);
                        continue;
                    }
                    match self.outbound.send_email(&OutgoingEmail { to, subject, body }) {
                        Ok(_) => {
                            self.warmup.record_sent(opts.today, 1)?;
                            self.metrics.record(Counter::EmailsSent, 1);
                            move_into(&path, &outputs)?;
                            report.sent.push(name);
                        }
                        Err(e) => report.errors.push(format!("{name}: {e}")),
                    }
                }
                Artifact::Tweet { text } => match self.outbound.post_tweet(text) {
                    Ok(_) => {
                        self.metrics.record(Counter::TweetsPosted, 1);
                        move_into(&path, &outputs)?;
                        report.posted.push(name);
                    }
                    Err(e) => report.errors.push(format!("{name}: {e}")),
                },
                Artifact::Lead { .. } => {
                    move_into(&path, &outputs)?;
                    report.moved.push(name);
                }
            }
        }
        for e in &report.errors {
            tracing::warn!(error = %e, "publish failed, item left staged");
        }
        Ok(report)
    }

    fn reject(&self, path: &Path, date: NaiveDate, reasons: &[String]) -> Result<()> {
        let dir = paths::rejected_dir(&self.root, date);
        let moved = move_into(path, &dir)?;
        let stem = moved
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut text = reasons.join("\n");
        text.push('\n');
        atomic_write(&dir.join(format!("{stem}.reasons.txt")), text.as_bytes())
    }
}

fn staged_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|x| x == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_artifact(path: &Path) -> std::result::Result<Artifact, String> {
    let data = std::fs::read_to_string(path).map_err(|e| format!("unreadable: {e}"))?;
    serde_json::from_str(&data).map_err(|e| format!("invalid artifact JSON: {e}"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn move_into(path: &Path, dir: &Path) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let dest = dir.join(path.file_name().unwrap_or_default());
    std::fs::rename(path, &dest)?;
    Ok(dest)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForemanError;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn email(to: &str, subject: &str, body: &str) -> Artifact {
        Artifact::Email {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    #[test]
    fn valid_email_passes() {
        assert!(validate(&email("ana@acme.io", "Quick question", "Hi Ana, ...")).is_empty());
    }

    #[test]
    fn email_rules() {
        let reasons = validate(&email("not-an-address", "", ""));
        assert_eq!(reasons.len(), 3);
        let long = "x".repeat(MAX_SUBJECT_CHARS + 1);
        assert!(validate(&email("a@b.co", &long, "body"))[0].contains("121 characters"));
    }

    #[test]
    fn placeholders_fail() {
        for bad in ["Hi {{first_name}}", "Hi [FIRST_NAME]", "About [COMPANY]", "TODO: write", "Lorem ipsum dolor"] {
            let reasons = validate(&email("a@b.co", "Hello", bad));
            assert_eq!(reasons.len(), 1, "{bad}");
            assert!(reasons[0].contains("placeholder"));
        }
    }

    #[test]
    fn tweet_length_bounds() {
        let ok = Artifact::Tweet { text: "y".repeat(MAX_TWEET_CHARS) };
        let long = Artifact::Tweet { text: "y".repeat(MAX_TWEET_CHARS + 1) };
        let empty = Artifact::Tweet { text: "  ".into() };
        assert!(validate(&ok).is_empty());
        assert_eq!(validate(&long).len(), 1);
        assert_eq!(validate(&empty).len(), 1);
    }

    #[test]
    fn lead_needs_name_and_contact() {
        let lead: Artifact = serde_json::from_value(json!({ "kind": "lead", "name": "Ana" })).unwrap();
        assert_eq!(validate(&lead), vec!["lead has no contact (email, handle or url)".to_string()]);
        let lead: Artifact =
            serde_json::from_value(json!({ "kind": "lead", "name": "Ana", "handle": "@ana" })).unwrap();
        assert!(validate(&lead).is_empty());
    }

    // ─── pipeline ───────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingOutbound {
        emails: RefCell<Vec<String>>,
        tweets: RefCell<Vec<String>>,
        fail_tweets: bool,
    }

    impl Outbound for RecordingOutbound {
        fn send_email(&self, email: &OutgoingEmail<'_>) -> Result<String> {
            self.emails.borrow_mut().push(email.to.to_string());
            Ok(format!("em_{}", self.emails.borrow().len()))
        }

        fn post_tweet(&self, text: &str) -> Result<String> {
            if self.fail_tweets {
                return Err(ForemanError::Http("twitter returned 503".into()));
            }
            self.tweets.borrow_mut().push(text.to_string());
            Ok("1".into())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    fn stage(root: &Path, name: &str, value: serde_json::Value) {
        let dir = paths::staging_dir(root, date());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn opts(dry_run: bool, skip_send: bool) -> QaOptions {
        QaOptions {
            date: date(),
            today: date(),
            dry_run,
            skip_send,
        }
    }

    fn seed(root: &Path) {
        stage(root, "01-email.json", json!({ "kind": "email", "to": "ana@acme.io", "subject": "Hi", "body": "Hello Ana" }));
        stage(root, "02-email.json", json!({ "kind": "email", "to": "bob@acme.io", "subject": "Hi", "body": "Hello [FIRST_NAME]" }));
        stage(root, "03-tweet.json", json!({ "kind": "tweet", "text": "We shipped." }));
        stage(root, "04-lead.json", json!({ "kind": "lead", "name": "Cy", "email": "cy@acme.io" }));
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let ob = RecordingOutbound::default();
        let report = QaPipeline::new(dir.path(), &ob).run(&opts(true, false)).unwrap();
        assert_eq!(report.passed.len(), 3);
        assert_eq!(report.rejected.len(), 1);
        assert!(ob.emails.borrow().is_empty());
        assert!(!paths::rejected_dir(dir.path(), date()).exists());
        assert!(!paths::metrics_path(dir.path()).exists());
    }

    #[test]
    fn publishes_and_rejects() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let ob = RecordingOutbound::default();
        let report = QaPipeline::new(dir.path(), &ob).run(&opts(false, false)).unwrap();

        assert_eq!(report.sent, vec!["01-email.json"]);
        assert_eq!(report.posted, vec!["03-tweet.json"]);
        assert_eq!(report.moved, vec!["04-lead.json"]);
        assert_eq!(report.rejected[0].file, "02-email.json");

        let rejected = paths::rejected_dir(dir.path(), date());
        assert!(rejected.join("02-email.json").exists());
        let reasons = std::fs::read_to_string(rejected.join("02-email.reasons.txt")).unwrap();
        assert!(reasons.contains("[FIRST_NAME]"));

        let outputs = paths::outputs_dir(dir.path(), date());
        assert!(outputs.join("01-email.json").exists());
        assert!(outputs.join("03-tweet.json").exists());

        let m = MetricsStore::new(dir.path()).load(chrono::Utc::now()).unwrap();
        assert_eq!(m.qa_passed, 3);
        assert_eq!(m.qa_failed, 1);
        assert_eq!(m.emails_sent, 1);
        assert_eq!(m.tweets_posted, 1);
        assert_eq!(WarmupStore::new(dir.path()).status(date()).unwrap().sent_today, 1);
    }

    #[test]
    fn skip_send_moves_without_sending() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let ob = RecordingOutbound::default();
        let report = QaPipeline::new(dir.path(), &ob).run(&opts(false, true)).unwrap();
        assert_eq!(report.moved.len(), 3);
        assert!(ob.emails.borrow().is_empty());
        assert!(ob.tweets.borrow().is_empty());
    }

    #[test]
    fn over_cap_emails_are_deferred() {
        let dir = TempDir::new().unwrap();
        WarmupStore::new(dir.path()).record_sent(date(), 10).unwrap();
        stage(dir.path(), "a.json", json!({ "kind": "email", "to": "ana@acme.io", "subject": "Hi", "body": "Hello" }));
        let ob = RecordingOutbound::default();
        let report = QaPipeline::new(dir.path(), &ob).run(&opts(false, false)).unwrap();
        assert_eq!(report.deferred, vec!["a.json"]);
        assert!(paths::staging_dir(dir.path(), date()).join("a.json").exists());
    }

    #[test]
    fn send_failure_leaves_item_staged() {
        let dir = TempDir::new().unwrap();
        stage(dir.path(), "t.json", json!({ "kind": "tweet", "text": "hello" }));
        let ob = RecordingOutbound { fail_tweets: true, ..Default::default() };
        let report = QaPipeline::new(dir.path(), &ob).run(&opts(false, false)).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("503"));
        assert!(paths::staging_dir(dir.path(), date()).join("t.json").exists());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let dir = TempDir::new().unwrap();
        let staging = paths::staging_dir(dir.path(), date());
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("bad.json"), "{ nope").unwrap();
        let ob = RecordingOutbound::default();
        let report = QaPipeline::new(dir.path(), &ob).run(&opts(false, false)).unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].reasons[0].contains("invalid artifact JSON"));
    }
}
