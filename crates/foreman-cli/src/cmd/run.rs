use super::agent::{apply_override, CodingAgent};
use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use foreman_core::config::{AgentKind, Config, TrackerKind};
use foreman_core::forge::GhCli;
use foreman_core::notify::SlackNotifier;
use foreman_core::runner::{Driver, RunOptions, RunSummary, TaskResult};
use foreman_core::tracker;
use foreman_core::vcs::GitCli;
use std::path::Path;

pub fn run(
    root: &Path,
    max_tasks: Option<usize>,
    agent: Option<AgentKind>,
    dry_run: bool,
    task: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    apply_override(&mut config.agent, agent);

    let coder = CodingAgent::new(config.agent.clone());
    let reviewer = CodingAgent::reviewer(&config.agent);
    check_prerequisites(&config, &coder, dry_run)?;

    let tracker = tracker::from_config(&config.tracker, root).context("tracker unavailable")?;
    let repo = GitCli::new(root);
    let forge = GhCli::new(root);
    let notifier = SlackNotifier::from_env();

    let driver = Driver {
        config: &config,
        tracker: tracker.as_ref(),
        coder: &coder,
        reviewer: &reviewer,
        repo: &repo,
        forge: &forge,
        notifier: &notifier,
    };
    let summary = driver.run(&RunOptions {
        max_tasks,
        task_id: task,
        dry_run,
    })?;

    if json {
        print_json(&summary)?;
    } else {
        print_summary(&summary, dry_run);
    }
    Ok(())
}

/// Required binaries must be on `PATH` before anything is claimed.
fn check_prerequisites(config: &Config, coder: &CodingAgent, dry_run: bool) -> anyhow::Result<()> {
    let mut required = vec!["git".to_string()];
    if config.tracker.kind == TrackerKind::Beads {
        required.push(config.tracker.beads_command.clone());
    }
    if !dry_run {
        required.push("gh".to_string());
        required.push(coder.executable());
    }

    let missing: Vec<String> = required
        .into_iter()
        .filter(|bin| which::which(bin).is_err())
        .collect();
    if !missing.is_empty() {
        bail!("required executables not found on PATH: {}", missing.join(", "));
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    if summary.outcomes.is_empty() {
        println!("No pending tasks.");
        return;
    }
    let rows = summary
        .outcomes
        .iter()
        .map(|o| {
            let (result, detail) = match &o.result {
                TaskResult::Planned => ("planned".to_string(), String::new()),
                TaskResult::Published {
                    pr_url,
                    review,
                    tests,
                    closed,
                } => (
                    if *closed { "closed" } else { "in review" }.to_string(),
                    format!("{pr_url} (review: {review}, tests: {tests})"),
                ),
                TaskResult::Failed { reason } => ("failed".to_string(), reason.clone()),
            };
            vec![o.key.clone(), o.title.clone(), result, detail]
        })
        .collect();
    print_table(&["TASK", "TITLE", "RESULT", "DETAIL"], rows);

    println!();
    if dry_run {
        println!("Dry run: {} task(s) would be processed.", summary.processed);
    } else {
        println!(
            "Processed {}: {} succeeded, {} failed.",
            summary.processed, summary.succeeded, summary.failed
        );
    }
}
