mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{metrics::MetricsSubcommand, progress::ProgressSubcommand, warmup::WarmupSubcommand};
use foreman_core::config::AgentKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "foreman",
    about = "Run coding agents against a task queue and publish their work as pull requests",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .agent/ or .git/)
    #[arg(long, global = true, env = "FOREMAN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config and state directories
    Init,

    /// Process pending tasks: agent, review, tests, pull request
    Run {
        /// Stop after this many tasks
        #[arg(long)]
        max_tasks: Option<usize>,

        /// Agent CLI to drive (overrides config)
        #[arg(long)]
        agent: Option<AgentKind>,

        /// List what would be processed without side effects
        #[arg(long)]
        dry_run: bool,

        /// Only process this task id or key
        #[arg(long)]
        task: Option<String>,
    },

    /// Validate staged outputs and publish the ones that pass
    Qa {
        /// Staging date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,

        /// Validate only; move and send nothing
        #[arg(long)]
        dry_run: bool,

        /// Move passed outputs without sending them
        #[arg(long)]
        skip_send: bool,
    },

    /// Run the review gate once against the current branch
    Review {
        /// Branch to diff against (default: config base_branch)
        #[arg(long)]
        base: Option<String>,

        /// Agent CLI to drive (overrides config)
        #[arg(long)]
        agent: Option<AgentKind>,
    },

    /// Run the test command and print the gate decision as one JSON line
    TestGate {
        /// Shell command (default: config tests.command)
        #[arg(long)]
        command: Option<String>,

        /// Timeout in seconds (default: config tests.timeout_seconds)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Post a notification to Slack
    Notify {
        #[arg(long)]
        title: String,

        #[arg(long)]
        message: String,

        /// info, success, failure or warning
        #[arg(long, default_value = "info")]
        status: String,

        /// Extra field as key=value (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Daily counters
    Metrics {
        #[command(subcommand)]
        subcommand: MetricsSubcommand,
    },

    /// Email warm-up schedule
    Warmup {
        #[command(subcommand)]
        subcommand: WarmupSubcommand,
    },

    /// Shared progress log
    Progress {
        #[command(subcommand)]
        subcommand: ProgressSubcommand,
    },

    /// Compute PR labels for the current branch
    Labels {
        /// PR or task title used for the type label
        #[arg(long)]
        title: String,

        /// Branch to diff against (default: config base_branch)
        #[arg(long)]
        base: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Qa { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run {
            max_tasks,
            agent,
            dry_run,
            task,
        } => cmd::run::run(&root, max_tasks, agent, dry_run, task, cli.json),
        Commands::Qa {
            date,
            dry_run,
            skip_send,
        } => cmd::qa::run(&root, date.as_deref(), dry_run, skip_send, cli.json),
        Commands::Review { base, agent } => {
            cmd::review::run(&root, base.as_deref(), agent, cli.json)
        }
        Commands::TestGate { command, timeout } => cmd::test_gate::run(&root, command, timeout),
        Commands::Notify {
            title,
            message,
            status,
            fields,
        } => cmd::notify::run(&title, &message, &status, &fields, cli.json),
        Commands::Metrics { subcommand } => cmd::metrics::run(&root, subcommand, cli.json),
        Commands::Warmup { subcommand } => cmd::warmup::run(&root, subcommand, cli.json),
        Commands::Progress { subcommand } => cmd::progress::run(&root, subcommand, cli.json),
        Commands::Labels { title, base } => {
            cmd::labels::run(&root, &title, base.as_deref(), cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
