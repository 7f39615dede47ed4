use crate::output::print_json;
use chrono::Utc;
use clap::Subcommand;
use foreman_core::warmup::{WarmupStatus, WarmupStore};
use std::path::Path;

#[derive(Subcommand)]
pub enum WarmupSubcommand {
    /// Show the warm-up day, today's cap and what is left of it
    Status,

    /// Record emails sent outside the QA pipeline
    Record {
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

pub fn run(root: &Path, subcommand: WarmupSubcommand, json: bool) -> anyhow::Result<()> {
    let store = WarmupStore::new(root);
    let today = Utc::now().date_naive();
    let status = match subcommand {
        WarmupSubcommand::Status => store.status(today)?,
        WarmupSubcommand::Record { count } => store.record_sent(today, count)?,
    };

    if json {
        print_json(&status)?;
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(s: &WarmupStatus) {
    println!("Date:        {}", s.date);
    println!("Warm-up day: {}", s.warmup_day);
    println!("Daily cap:   {}", s.daily_cap);
    println!("Sent today:  {}", s.sent_today);
    println!("Remaining:   {}", s.remaining);
}
