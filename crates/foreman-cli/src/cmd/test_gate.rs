use anyhow::Context;
use foreman_core::config::Config;
use foreman_core::test_gate::TestGate;
use std::path::Path;
use std::time::Duration;

/// Prints exactly one JSON line (`decision`, `reason`) on stdout. The
/// decision is carried in the JSON, so a block still exits 0.
pub fn run(root: &Path, command: Option<String>, timeout: Option<u64>) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut gate = TestGate::from_config(&config.tests);
    if command.is_some() {
        gate.command = command;
    }
    if let Some(secs) = timeout {
        gate.timeout = Duration::from_secs(secs);
    }

    let outcome = gate.run(root);
    if !outcome.passed() && !outcome.output.is_empty() {
        eprintln!("{}", outcome.output);
    }
    println!("{}", outcome.to_json_line());
    Ok(())
}
