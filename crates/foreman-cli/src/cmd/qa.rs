use crate::output::print_json;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use foreman_core::config::Config;
use foreman_core::outbound::HttpOutbound;
use foreman_core::qa::{QaOptions, QaPipeline, QaReport};
use foreman_core::ForemanError;
use std::path::Path;

pub fn run(
    root: &Path,
    date: Option<&str>,
    dry_run: bool,
    skip_send: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let today = Utc::now().date_naive();
    let date = match date {
        Some(d) => parse_date(d)?,
        None => today,
    };

    let outbound = HttpOutbound::from_env(config.qa.from_email.clone());
    let report = QaPipeline::new(root, &outbound).run(&QaOptions {
        date,
        today,
        dry_run,
        skip_send,
    })?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report, dry_run);
    }
    Ok(())
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ForemanError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ForemanError::InvalidDate(s.to_string()))
}

fn print_report(report: &QaReport, dry_run: bool) {
    println!("QA for {}{}", report.date, if dry_run { " (dry run)" } else { "" });
    println!("  passed:   {}", report.passed.len());
    println!("  rejected: {}", report.rejected.len());
    for r in &report.rejected {
        println!("    {}: {}", r.file, r.reasons.join("; "));
    }
    if dry_run {
        return;
    }
    println!("  sent:     {}", report.sent.len());
    println!("  posted:   {}", report.posted.len());
    println!("  moved:    {}", report.moved.len());
    if !report.deferred.is_empty() {
        println!("  deferred: {} (daily email cap reached)", report.deferred.len());
    }
    if !report.errors.is_empty() {
        println!("  errors:   {}", report.errors.len());
        for e in &report.errors {
            println!("    {e}");
        }
    }
}
