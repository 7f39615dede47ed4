use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use foreman_core::config::Config;
use foreman_core::progress::ProgressLog;
use serde_json::json;
use std::path::Path;

#[derive(Subcommand)]
pub enum ProgressSubcommand {
    /// Append a timestamped entry
    Add {
        #[arg(long)]
        heading: String,

        #[arg(long, default_value = "")]
        body: String,
    },

    /// Drop entries older than the retention window
    Prune {
        /// Retention in days (default: config progress.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

pub fn run(root: &Path, subcommand: ProgressSubcommand, json: bool) -> anyhow::Result<()> {
    let log = ProgressLog::new(root);
    match subcommand {
        ProgressSubcommand::Add { heading, body } => {
            log.append(Utc::now(), &heading, &body)
                .context("failed to append progress entry")?;
            if json {
                print_json(&json!({ "path": log.path(), "heading": heading }))?;
            } else {
                println!("Appended to {}", log.path().display());
            }
        }
        ProgressSubcommand::Prune { days } => {
            let days = match days {
                Some(d) => d,
                None => {
                    Config::load(root)
                        .context("failed to load config")?
                        .progress
                        .retention_days
                }
            };
            let stats = log.prune(Utc::now(), days)?;
            if json {
                print_json(&stats)?;
            } else {
                println!(
                    "Kept {} entries, dropped {} older than {days} day(s).",
                    stats.kept, stats.dropped
                );
            }
        }
    }
    Ok(())
}
