use super::agent::{apply_override, CodingAgent};
use crate::output::print_json;
use anyhow::{bail, Context};
use foreman_core::config::{AgentKind, Config, ReviewConfig};
use foreman_core::review::{review_loop, ReviewVerdict};
use foreman_core::task::TaskRecord;
use foreman_core::vcs::{GitCli, Repo};
use std::path::Path;

/// One review pass over `base...HEAD`; no fix attempts. Exits non-zero when
/// the verdict is not a pass.
pub fn run(
    root: &Path,
    base: Option<&str>,
    agent: Option<AgentKind>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    apply_override(&mut config.agent, agent);
    let base = base.unwrap_or(&config.base_branch).to_string();

    let repo = GitCli::new(root);
    let branch = repo.current_branch().context("failed to read current branch")?;
    let task = TaskRecord::new(branch.clone(), branch.clone(), branch);
    let reviewer = CodingAgent::reviewer(&config.agent);

    let outcome = review_loop(
        &reviewer,
        &reviewer,
        &repo,
        &task,
        &base,
        &ReviewConfig {
            max_attempts: 1,
            ..config.review.clone()
        },
    )?;

    if json {
        print_json(&outcome)?;
    } else {
        match &outcome.verdict {
            ReviewVerdict::Pass => println!("Review passed."),
            ReviewVerdict::Fail { issues } => {
                println!("Review found {} blocking issue(s):", issues.len());
                for issue in issues {
                    println!("  - {issue}");
                }
            }
            ReviewVerdict::Indeterminate => {
                println!("Review output could not be interpreted.")
            }
        }
        let notes: Vec<_> = outcome.findings.iter().filter(|f| !f.blocking).collect();
        if !notes.is_empty() {
            println!("Non-blocking notes:");
            for note in notes {
                println!("  - {note}");
            }
        }
    }

    if !outcome.verdict.passed() {
        bail!("review verdict: {}", outcome.verdict.label().to_lowercase());
    }
    Ok(())
}
