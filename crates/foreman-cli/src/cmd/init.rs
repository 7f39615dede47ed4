use anyhow::Context;
use foreman_core::{config::Config, io, paths};
use std::path::Path;

const PROGRESS_PREAMBLE: &str = "# Agent progress\n\n\
Shared log for agents and humans. Newest entries at the bottom; entries older\n\
than the retention window are pruned by `foreman progress prune`.\n";

/// Generated state that should never be committed. The config and progress
/// log stay trackable.
const IGNORED: [&str; 4] = [
    paths::RUN_LOCK,
    paths::METRICS_LOCK,
    paths::METRICS_FILE,
    ".coo/agent/state/",
];

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing foreman in: {}", root.display());

    let dirs = [
        paths::AGENT_DIR,
        paths::COO_STATE_DIR,
        paths::COO_STAGING_DIR,
        paths::COO_OUTPUTS_DIR,
    ];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    if paths::config_path(root).exists() {
        // Parse it so a broken file is reported now rather than on the first run.
        Config::load(root).context("existing config is invalid")?;
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let created = io::write_if_missing(&paths::progress_path(root), PROGRESS_PREAMBLE.as_bytes())
        .context("failed to write progress log")?;
    println!(
        "  {}  {}",
        if created { "created:" } else { "exists: " },
        paths::PROGRESS_FILE
    );

    for entry in IGNORED {
        io::ensure_gitignore_entry(root, entry).context("failed to update .gitignore")?;
    }

    println!("\nNext: edit {} and run `foreman run --dry-run`.", paths::CONFIG_FILE);
    Ok(())
}
