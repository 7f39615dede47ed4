use crate::error::{ForemanError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Open,
    InProgress,
    InReview,
    Done,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Open => "open",
            TaskState::InProgress => "in_progress",
            TaskState::InReview => "in_review",
            TaskState::Done => "done",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A work item as fetched from a tracker. Never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Tracker-native handle used for mutations.
    pub id: String,
    /// Human-facing identifier, e.g. `CON-12` or `T-1`.
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub state: TaskState,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            title: title.into(),
            description: String::new(),
            created_at: None,
            state: TaskState::Open,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// True when `needle` names this task by id or key (case-insensitive key).
    pub fn matches(&self, needle: &str) -> bool {
        self.id == needle || self.key.eq_ignore_ascii_case(needle)
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Narrow `tasks` to `only` (when given) and then to the first `max` items.
pub fn select(
    tasks: Vec<TaskRecord>,
    only: Option<&str>,
    max: Option<usize>,
) -> Result<Vec<TaskRecord>> {
    let mut selected = match only {
        Some(needle) => {
            let hit: Vec<TaskRecord> = tasks.into_iter().filter(|t| t.matches(needle)).collect();
            if hit.is_empty() {
                return Err(ForemanError::TaskNotFound(needle.to_string()));
            }
            hit
        }
        None => tasks,
    };
    if let Some(max) = max {
        selected.truncate(max);
    }
    Ok(selected)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
