use crate::error::Result;
use crate::io::{append_text, atomic_write};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Append-only Markdown session log at `.agent/claude-progress.txt`.
pub struct ProgressLog {
    path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    pub kept: usize,
    pub dropped: usize,
}

static HEADER_RE: OnceLock<Regex> = OnceLock::new();

fn header_re() -> &'static Regex {
    HEADER_RE.get_or_init(|| Regex::new(r"^## (\d{4}-\d{2}-\d{2})\b").unwrap())
}

impl ProgressLog {
    pub fn new(root: &Path) -> Self {
        Self {
            path: crate::paths::progress_path(root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry headed `## YYYY-MM-DD HH:MM UTC | heading`.
    pub fn append(&self, now: DateTime<Utc>, heading: &str, body: &str) -> Result<()> {
        let mut entry = format!("\n## {} UTC | {}\n", now.format("%Y-%m-%d %H:%M"), heading.trim());
        let body = body.trim_end();
        if !body.is_empty() {
            entry.push('\n');
            entry.push_str(body);
            entry.push('\n');
        }
        append_text(&self.path, &entry)
    }

    /// Drop dated entries older than `retention_days` before `now`.
    pub fn prune(&self, now: DateTime<Utc>, retention_days: u32) -> Result<PruneStats> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PruneStats { kept: 0, dropped: 0 })
            }
            Err(e) => return Err(e.into()),
        };
        let cutoff = now.date_naive() - Duration::days(i64::from(retention_days));
        let (out, stats) = prune_text(&text, cutoff);
        if stats.dropped > 0 {
            atomic_write(&self.path, out.as_bytes())?;
            tracing::info!(kept = stats.kept, dropped = stats.dropped, "pruned progress log");
        }
        Ok(stats)
    }
}

/// Split on `## ` headers and keep the preamble, undated entries and entries
/// dated on or after `cutoff`.
fn prune_text(text: &str, cutoff: NaiveDate) -> (String, PruneStats) {
    let mut out = String::with_capacity(text.len());
    let mut stats = PruneStats { kept: 0, dropped: 0 };
    let mut keep_current = true;

    for line in text.split_inclusive('\n') {
        if line.starts_with("## ") {
            let date = header_re()
                .captures(line)
                .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok());
            keep_current = match date {
                Some(d) => d >= cutoff,
                None => true,
            };
            if keep_current {
                stats.kept += 1;
            } else {
                stats.dropped += 1;
            }
        }
        if keep_current {
            out.push_str(line);
        }
    }
    (out, stats)
}
