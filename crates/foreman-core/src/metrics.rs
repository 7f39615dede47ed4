use crate::error::{ForemanError, Result};
use crate::io::{atomic_write, FileLock};
use crate::paths;
use crate::warmup::{roll_over, RollOver};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Daily counters persisted in `.agent/metrics.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub date: NaiveDate,
    #[serde(default)]
    pub tasks_started: u64,
    #[serde(default)]
    pub tasks_completed: u64,
    #[serde(default)]
    pub tasks_failed: u64,
    #[serde(default)]
    pub qa_passed: u64,
    #[serde(default)]
    pub qa_failed: u64,
    #[serde(default)]
    pub emails_sent: u64,
    #[serde(default)]
    pub tweets_posted: u64,
    #[serde(default = "default_warmup_day")]
    pub warmup_day: u32,
    pub last_updated: DateTime<Utc>,
}

fn default_warmup_day() -> u32 {
    1
}

impl Metrics {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            date: now.date_naive(),
            tasks_started: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            qa_passed: 0,
            qa_failed: 0,
            emails_sent: 0,
            tweets_posted: 0,
            warmup_day: default_warmup_day(),
            last_updated: now,
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        *self.slot(counter)
    }

    pub fn incr(&mut self, counter: Counter, by: u64) {
        let slot = self.slot_mut(counter);
        *slot = slot.saturating_add(by);
    }

    /// Zero the per-day counters when `today` differs from the stored date.
    /// Returns true when a reset happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        match roll_over(self.date, today, self.warmup_day) {
            RollOver::SameDay => false,
            RollOver::NewDay { warmup_day } => {
                let last_updated = self.last_updated;
                *self = Metrics {
                    date: today,
                    warmup_day,
                    last_updated,
                    ..Metrics::new(last_updated)
                };
                true
            }
        }
    }

    fn slot(&self, counter: Counter) -> &u64 {
        match counter {
            Counter::TasksStarted => &self.tasks_started,
            Counter::TasksCompleted => &self.tasks_completed,
            Counter::TasksFailed => &self.tasks_failed,
            Counter::QaPassed => &self.qa_passed,
            Counter::QaFailed => &self.qa_failed,
            Counter::EmailsSent => &self.emails_sent,
            Counter::TweetsPosted => &self.tweets_posted,
        }
    }

    fn slot_mut(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::TasksStarted => &mut self.tasks_started,
            Counter::TasksCompleted => &mut self.tasks_completed,
            Counter::TasksFailed => &mut self.tasks_failed,
            Counter::QaPassed => &mut self.qa_passed,
            Counter::QaFailed => &mut self.qa_failed,
            Counter::EmailsSent => &mut self.emails_sent,
            Counter::TweetsPosted => &mut self.tweets_posted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    TasksStarted,
    TasksCompleted,
    TasksFailed,
    QaPassed,
    QaFailed,
    EmailsSent,
    TweetsPosted,
}

impl Counter {
    pub const ALL: [Counter; 7] = [
        Counter::TasksStarted,
        Counter::TasksCompleted,
        Counter::TasksFailed,
        Counter::QaPassed,
        Counter::QaFailed,
        Counter::EmailsSent,
        Counter::TweetsPosted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::TasksStarted => "tasks_started",
            Counter::TasksCompleted => "tasks_completed",
            Counter::TasksFailed => "tasks_failed",
            Counter::QaPassed => "qa_passed",
            Counter::QaFailed => "qa_failed",
            Counter::EmailsSent => "emails_sent",
            Counter::TweetsPosted => "tweets_posted",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Counter {
    type Err = ForemanError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('-', "_");
        Counter::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Counter::ALL.iter().map(|c| c.as_str()).collect();
                ForemanError::InvalidConfig(format!(
                    "unknown counter '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// MetricsStore
// ---------------------------------------------------------------------------

/// Locked read-modify-write access to the metrics document.
pub struct MetricsStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl MetricsStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: paths::metrics_path(root),
            lock_path: paths::metrics_lock_path(root),
        }
    }

    /// Current document with today's roll-over applied and persisted.
    pub fn load(&self, now: DateTime<Utc>) -> Result<Metrics> {
        self.update(now, |_| {})
    }

    pub fn incr(&self, counter: Counter, by: u64, now: DateTime<Utc>) -> Result<Metrics> {
        self.update(now, |m| m.incr(counter, by))
    }

    pub fn update<F>(&self, now: DateTime<Utc>, f: F) -> Result<Metrics>
    where
        F: FnOnce(&mut Metrics),
    {
        let _lock = FileLock::exclusive(&self.lock_path)?;
        let mut metrics = self.read(now)?;
        if metrics.roll_over(now.date_naive()) {
            tracing::info!(date = %metrics.date, warmup_day = metrics.warmup_day, "metrics reset for new day");
        }
        f(&mut metrics);
        metrics.last_updated = now;
        let data = serde_json::to_string_pretty(&metrics)?;
        atomic_write(&self.path, data.as_bytes())?;
        Ok(metrics)
    }

    fn read(&self, now: DateTime<Utc>) -> Result<Metrics> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Metrics::new(now)),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort increment for callers whose main work must not fail on it.
    pub fn record(&self, counter: Counter, by: u64) {
        if let Err(e) = self.incr(counter, by, Utc::now()) {
            tracing::warn!(counter = %counter, error = %e, "failed to update metrics");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
