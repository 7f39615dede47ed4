//! Task sources. Both adapters normalize into [`TaskRecord`].

pub mod beads;
pub mod linear;

use crate::config::{TrackerConfig, TrackerKind};
use crate::error::Result;
use crate::task::TaskRecord;
use std::path::Path;

pub use beads::BeadsCli;
pub use linear::{LinearClient, LinearSettings};

pub trait TaskSource {
    fn name(&self) -> &str;

    /// Pending tasks, oldest first.
    fn list_pending(&self) -> Result<Vec<TaskRecord>>;

    /// Claim: move the task to in-progress.
    fn mark_in_progress(&self, task: &TaskRecord) -> Result<()>;

    /// A PR is open for the task.
    fn mark_in_review(&self, task: &TaskRecord, pr_url: &str) -> Result<()>;

    /// Mark done with a closing note.
    fn close(&self, task: &TaskRecord, note: &str) -> Result<()>;
}

/// Build the configured adapter. Linear reads its credentials from the environment.
pub fn from_config(cfg: &TrackerConfig, root: &Path) -> Result<Box<dyn TaskSource>> {
    match cfg.kind {
        TrackerKind::Beads => Ok(Box::new(BeadsCli::new(
            &cfg.beads_command,
            root,
            &cfg.status_pattern,
        )?)),
        TrackerKind::Linear => {
            let settings = LinearSettings::from_env(&cfg.linear_api_url)?;
            Ok(Box::new(LinearClient::new(settings)))
        }
    }
}
