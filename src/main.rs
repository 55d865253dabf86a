use anyhow::Result;
use clap::{Parser, Subcommand};

use benchctl::cli::{self, OutputFormat};
use benchctl::config;

#[derive(Debug, Parser)]
#[command(name = "benchctl")]
#[command(about = "Start, follow and inspect benchmark runs on a remote runner")]
struct App {
    /// Override the runner base URL for this invocation
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show all tests with their config, phase and latest results
    List {
        /// Output format: table, json, csv (default from config)
        #[arg(long)]
        format: Option<String>,
    },
    /// Start a test and follow it until the runner is idle
    Run {
        /// Test id, e.g. rest-read
        test: String,
    },
    /// Follow a run that is already in flight
    Watch,
    /// Show the current runner state
    Status {
        #[arg(long)]
        format: Option<String>,
    },
    /// Show the latest result for every test
    Results {
        #[arg(long)]
        format: Option<String>,
    },
    /// Show run history for a test, newest first
    History {
        /// Test id
        test: String,
        /// Number of runs to fetch
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        format: Option<String>,
    },
    /// Persist a duration / VU override for a test on the runner
    Configure {
        /// Test id
        test: String,
        /// Run length in seconds
        #[arg(long)]
        duration: Option<u32>,
        /// Number of virtual users
        #[arg(long)]
        vus: Option<u32>,
    },
    /// Summarize the local event log
    Events {
        /// Only include the last N days
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        format: Option<String>,
    },
    /// Check runner reachability, config files and the event log
    Health,
    /// Manage local configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default config to ~/.benchctl/config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. runner.base_url
    Set { key: String, value: String },
    /// Overwrite the global config with defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    let mut cfg = config::load();
    if let Some(url) = app.url {
        cfg.runner.base_url = url;
    }
    let format = |f: Option<String>| match f {
        Some(f) => OutputFormat::from_str_opt(Some(&f)),
        None => cfg.display.format,
    };

    match app.command {
        Commands::List { format: f } => cli::run_list(&cfg, format(f)),
        Commands::Run { test } => cli::run_start(&cfg, &test),
        Commands::Watch => cli::run_watch(&cfg),
        Commands::Status { format: f } => cli::run_status(&cfg, format(f)),
        Commands::Results { format: f } => cli::run_results(&cfg, format(f)),
        Commands::History {
            test,
            limit,
            format: f,
        } => cli::run_history(&cfg, &test, limit, format(f)),
        Commands::Configure {
            test,
            duration,
            vus,
        } => cli::run_configure(&cfg, &test, duration, vus),
        Commands::Events { days, format: f } => cli::run_events(&cfg, days, format(f)),
        Commands::Health => cli::run_health(&cfg),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
