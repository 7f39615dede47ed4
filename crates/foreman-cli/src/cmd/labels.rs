use crate::output::print_json;
use anyhow::Context;
use foreman_core::config::Config;
use foreman_core::labels::compute_labels;
use foreman_core::vcs::{GitCli, Repo};
use std::path::Path;

/// Labels the task loop would attach to a PR for this branch, assuming both
/// gates passed.
pub fn run(root: &Path, title: &str, base: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let base = base.unwrap_or(&config.base_branch);
    let changes = GitCli::new(root)
        .changes(base)
        .with_context(|| format!("failed to diff against {base}"))?;

    let labels = compute_labels(&config.pr.labels, title, &changes, true);
    if json {
        print_json(&labels)?;
    } else {
        for label in &labels {
            println!("{label}");
        }
    }
    Ok(())
}
