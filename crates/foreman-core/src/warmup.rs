//! Email warm-up schedule and the daily roll-over shared with the metrics store.
//!
//! State lives in three text files under `.coo/agent/state/`:
//! `warmup-day.txt`, `emails-sent-today.txt` and `last-reset-date.txt`.

use crate::error::Result;
use crate::io::{atomic_write, FileLock};
use crate::paths;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Maximum outbound emails for a given warm-up day (1-based).
pub fn daily_email_cap(day: u32) -> u32 {
    match day {
        0..=3 => 10,
        4..=7 => 25,
        8..=14 => 50,
        _ => 100,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollOver {
    /// Still the stored day; nothing to reset.
    SameDay,
    /// A new calendar day: zero the daily counters and adopt `warmup_day`.
    NewDay { warmup_day: u32 },
}

/// Decide whether per-day counters reset.
///
/// Any date change advances `warmup_day` by exactly one, however many
/// calendar days passed in between.
pub fn roll_over(stored: NaiveDate, today: NaiveDate, warmup_day: u32) -> RollOver {
    if stored == today {
        RollOver::SameDay
    } else {
        RollOver::NewDay {
            warmup_day: warmup_day.saturating_add(1),
        }
    }
}

// ---------------------------------------------------------------------------
// WarmupStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmupStatus {
    pub date: NaiveDate,
    pub warmup_day: u32,
    pub sent_today: u32,
    pub daily_cap: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone)]
struct WarmupState {
    warmup_day: u32,
    sent_today: u32,
    last_reset: NaiveDate,
}

impl WarmupState {
    fn status(&self) -> WarmupStatus {
        let cap = daily_email_cap(self.warmup_day);
        WarmupStatus {
            date: self.last_reset,
            warmup_day: self.warmup_day,
            sent_today: self.sent_today,
            daily_cap: cap,
            remaining: cap.saturating_sub(self.sent_today),
        }
    }
}

pub struct WarmupStore {
    dir: PathBuf,
}

impl WarmupStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: paths::coo_state_dir(root),
        }
    }

    /// Current state after applying today's roll-over.
    pub fn status(&self, today: NaiveDate) -> Result<WarmupStatus> {
        self.update(today, |_| {})
    }

    pub fn remaining(&self, today: NaiveDate) -> Result<u32> {
        Ok(self.status(today)?.remaining)
    }

    /// Add `count` to today's sent tally.
    pub fn record_sent(&self, today: NaiveDate, count: u32) -> Result<WarmupStatus> {
        self.update(today, |s| s.sent_today = s.sent_today.saturating_add(count))
    }

    fn update<F>(&self, today: NaiveDate, f: F) -> Result<WarmupStatus>
    where
        F: FnOnce(&mut WarmupState),
    {
        let _lock = FileLock::exclusive(&self.dir.join(paths::WARMUP_LOCK))?;
        let mut state = self.read(today)?;
        if let RollOver::NewDay { warmup_day } = roll_over(state.last_reset, today, state.warmup_day)
        {
            tracing::info!(
                from = %state.last_reset,
                to = %today,
                warmup_day,
                "warm-up day rolled over"
            );
            state.warmup_day = warmup_day;
            state.sent_today = 0;
            state.last_reset = today;
        }
        f(&mut state);
        self.write(&state)?;
        Ok(state.status())
    }

    fn read(&self, today: NaiveDate) -> Result<WarmupState> {
        let warmup_day = read_number(&self.dir.join(paths::WARMUP_DAY_FILE))?
            .unwrap_or(1)
            .max(1);
        let sent_today = read_number(&self.dir.join(paths::EMAILS_SENT_FILE))?.unwrap_or(0);
        let last_reset = match read_trimmed(&self.dir.join(paths::LAST_RESET_FILE))? {
            Some(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                Ok(d) => d,
                Err(_) => {
                    tracing::warn!(value = %s, "unreadable last-reset date, treating as today");
                    today
                }
            },
            None => today,
        };
        Ok(WarmupState {
            warmup_day,
            sent_today,
            last_reset,
        })
    }

    fn write(&self, state: &WarmupState) -> Result<()> {
        atomic_write(
            &self.dir.join(paths::WARMUP_DAY_FILE),
            format!("{}\n", state.warmup_day).as_bytes(),
        )?;
        atomic_write(
            &self.dir.join(paths::EMAILS_SENT_FILE),
            format!("{}\n", state.sent_today).as_bytes(),
        )?;
        atomic_write(
            &self.dir.join(paths::LAST_RESET_FILE),
            format!("{}\n", state.last_reset.format("%Y-%m-%d")).as_bytes(),
        )
    }
}

fn read_trimmed(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_number(path: &Path) -> Result<Option<u32>> {
    Ok(read_trimmed(path)?.and_then(|s| match s.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(path = %path.display(), value = %s, "ignoring non-numeric state file");
            None
        }
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cap_step_function() {
        for d in 1..=3 {
            assert_eq!(daily_email_cap(d), 10);
        }
        for d in 4..=7 {
            assert_eq!(daily_email_cap(d), 25);
        }
        for d in 8..=14 {
            assert_eq!(daily_email_cap(d), 50);
        }
        assert_eq!(daily_email_cap(15), 100);
        assert_eq!(daily_email_cap(400), 100);
    }

    #[test]
    fn roll_over_same_day_is_noop() {
        let today = day(2026, 3, 9);
        assert_eq!(roll_over(today, today, 4), RollOver::SameDay);
    }

    #[test]
    fn roll_over_advances_by_one_even_after_gap() {
        let stored = day(2026, 3, 1);
        let today = day(2026, 3, 9);
        assert_eq!(
            roll_over(stored, today, 4),
            RollOver::NewDay { warmup_day: 5 }
        );
    }

    #[test]
    fn fresh_store_starts_at_day_one() {
        let dir = TempDir::new().unwrap();
        let store = WarmupStore::new(dir.path());
        let status = store.status(day(2026, 3, 9)).unwrap();
        assert_eq!(status.warmup_day, 1);
        assert_eq!(status.sent_today, 0);
        assert_eq!(status.daily_cap, 10);
        assert_eq!(status.remaining, 10);
    }

    #[test]
    fn record_sent_reduces_remaining() {
        let dir = TempDir::new().unwrap();
        let store = WarmupStore::new(dir.path());
        let today = day(2026, 3, 9);
        store.record_sent(today, 4).unwrap();
        assert_eq!(store.remaining(today).unwrap(), 6);
        store.record_sent(today, 20).unwrap();
        assert_eq!(store.remaining(today).unwrap(), 0);
    }

    #[test]
    fn one_increment_per_day_transition() {
        let dir = TempDir::new().unwrap();
        let store = WarmupStore::new(dir.path());
        store.record_sent(day(2026, 3, 9), 7).unwrap();

        let next = day(2026, 3, 10);
        let first = store.status(next).unwrap();
        let second = store.status(next).unwrap();
        assert_eq!(first.warmup_day, 2);
        assert_eq!(first.sent_today, 0);
        assert_eq!(first, second);

        let state_dir = paths::coo_state_dir(dir.path());
        let stored = std::fs::read_to_string(state_dir.join(paths::LAST_RESET_FILE)).unwrap();
        assert_eq!(stored.trim(), "2026-03-10");
    }

    #[test]
    fn reads_existing_text_files() {
        let dir = TempDir::new().unwrap();
        let state_dir = paths::coo_state_dir(dir.path());
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(state_dir.join(paths::WARMUP_DAY_FILE), "9\n").unwrap();
        std::fs::write(state_dir.join(paths::EMAILS_SENT_FILE), "12\n").unwrap();
        std::fs::write(state_dir.join(paths::LAST_RESET_FILE), "2026-03-09\n").unwrap();

        let status = WarmupStore::new(dir.path())
            .status(day(2026, 3, 9))
            .unwrap();
        assert_eq!(status.warmup_day, 9);
        assert_eq!(status.daily_cap, 50);
        assert_eq!(status.remaining, 38);
    }
}
