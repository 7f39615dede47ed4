//! Slack incoming-webhook notifications.
//!
//! Sending never fails the caller: a missing webhook is a logged skip and an
//! HTTP failure is a logged warning.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const SLACK_WEBHOOK_ENV: &str = "SLACK_WEBHOOK_URL";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyStatus {
    #[default]
    Info,
    Success,
    Failure,
    Warning,
}

impl NotifyStatus {
    pub fn color(&self) -> &'static str {
        match self {
            NotifyStatus::Info => "#439FE0",
            NotifyStatus::Success => "#36a64f",
            NotifyStatus::Failure => "#d00000",
            NotifyStatus::Warning => "#ff9900",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyStatus::Info => "info",
            NotifyStatus::Success => "success",
            NotifyStatus::Failure => "failure",
            NotifyStatus::Warning => "warning",
        }
    }
}

impl fmt::Display for NotifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(NotifyStatus::Info),
            "success" => Ok(NotifyStatus::Success),
            "failure" | "error" => Ok(NotifyStatus::Failure),
            "warning" | "warn" => Ok(NotifyStatus::Warning),
            other => Err(format!(
                "unknown status '{other}' (expected info, success, failure or warning)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub status: NotifyStatus,
    pub fields: Vec<(String, String)>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, status: NotifyStatus) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            status,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum NotifyOutcome {
    Sent,
    Skipped,
    Failed(String),
}

pub trait Notify {
    fn notify(&self, n: &Notification) -> NotifyOutcome;
}

/// Slack attachment payload for `n`.
pub fn slack_payload(n: &Notification) -> Value {
    let fields: Vec<Value> = n
        .fields
        .iter()
        .map(|(k, v)| json!({ "title": k, "value": v, "short": v.len() <= 40 }))
        .collect();
    json!({
        "attachments": [{
            "color": n.status.color(),
            "title": n.title,
            "text": n.message,
            "fields": fields,
            "footer": "foreman",
            "ts": chrono::Utc::now().timestamp(),
        }]
    })
}

// ---------------------------------------------------------------------------
// SlackNotifier
// ---------------------------------------------------------------------------

pub struct SlackNotifier {
    webhook: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook: Option<String>) -> Self {
        Self {
            webhook: webhook.filter(|w| !w.trim().is_empty()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(SLACK_WEBHOOK_ENV).ok())
    }

    pub fn is_configured(&self) -> bool {
        self.webhook.is_some()
    }
}

impl Notify for SlackNotifier {
    fn notify(&self, n: &Notification) -> NotifyOutcome {
        let Some(url) = self.webhook.as_deref() else {
            tracing::warn!(title = %n.title, "{SLACK_WEBHOOK_ENV} not set, skipping notification");
            return NotifyOutcome::Skipped;
        };

        let result = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .and_then(|client| client.post(url).json(&slack_payload(n)).send())
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(_) => {
                tracing::debug!(title = %n.title, status = %n.status, "notification sent");
                NotifyOutcome::Sent
            }
            Err(e) => {
                tracing::warn!(title = %n.title, error = %e, "slack notification failed");
                NotifyOutcome::Failed(e.to_string())
            }
        }
    }
}
