use crate::output::{print_json, print_table};
use chrono::Utc;
use clap::Subcommand;
use foreman_core::metrics::{Counter, Metrics, MetricsStore};
use std::path::Path;

#[derive(Subcommand)]
pub enum MetricsSubcommand {
    /// Show today's counters (resets them if the date has changed)
    Show,

    /// Increment a counter
    Incr {
        /// tasks_started, tasks_completed, tasks_failed, qa_passed, qa_failed,
        /// emails_sent or tweets_posted
        counter: Counter,

        #[arg(long, default_value_t = 1)]
        by: u64,
    },
}

pub fn run(root: &Path, subcommand: MetricsSubcommand, json: bool) -> anyhow::Result<()> {
    let store = MetricsStore::new(root);
    let metrics = match subcommand {
        MetricsSubcommand::Show => store.load(Utc::now())?,
        MetricsSubcommand::Incr { counter, by } => store.incr(counter, by, Utc::now())?,
    };

    if json {
        print_json(&metrics)?;
    } else {
        print_metrics(&metrics);
    }
    Ok(())
}

fn print_metrics(m: &Metrics) {
    println!("Metrics for {} (warm-up day {})\n", m.date, m.warmup_day);
    let rows = Counter::ALL
        .iter()
        .map(|c| vec![c.as_str().to_string(), m.get(*c).to_string()])
        .collect();
    print_table(&["COUNTER", "VALUE"], rows);
}
