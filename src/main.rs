//! SafeChat - chat abuse detection
//!
//! Evaluates chat messages against the configured checks and manages the
//! stored violation counters.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;

/// SafeChat - chat abuse detection engine
#[derive(Parser)]
#[command(name = "safechat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Settings file (YAML); missing files fall back to defaults
    #[arg(short, long, global = true, default_value = "config/safechat.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered checks in evaluation order
    Checks,

    /// Evaluate a single message
    Check {
        /// Message text
        message: String,
        /// Sender name
        #[arg(short, long, default_value = "Player")]
        player: String,
    },

    /// Replay a chat transcript ("name: message" per line)
    Simulate {
        /// Transcript file; reads stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Simulated gap between consecutive lines
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
        /// Players allowed to bypass every check
        #[arg(long)]
        bypass: Vec<String>,
        /// Load and save counters in the configured database
        #[arg(long)]
        persist: bool,
        /// Print one JSON decision per line
        #[arg(long)]
        json: bool,
    },

    /// Manage stored violation counters
    Violations {
        #[command(subcommand)]
        action: ViolationsAction,
    },

    /// View the violation log
    Logs {
        /// Number of recent entries to show
        #[arg(short, long, default_value = "20")]
        tail: usize,
        /// First delete entries older than this many days
        #[arg(long)]
        prune_days: Option<u32>,
    },

    /// Write a default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ViolationsAction {
    /// List counters
    List {
        /// Only this player
        #[arg(short, long)]
        player: Option<String>,
    },
    /// Reset a player's counters
    Reset {
        player: String,
        /// Only this check
        #[arg(long)]
        check: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Checks => cli::checks::run(&cli.config)?,
        Commands::Check { message, player } => cli::check::run(&cli.config, &player, &message)?,
        Commands::Simulate {
            file,
            interval_ms,
            bypass,
            persist,
            json,
        } => {
            let options = cli::simulate::Options {
                file,
                interval_ms,
                bypass,
                persist,
                json,
            };
            cli::simulate::run(&cli.config, options).await?;
        }
        Commands::Violations { action } => match action {
            ViolationsAction::List { player } => {
                cli::violations::list(&cli.config, player.as_deref())?
            }
            ViolationsAction::Reset { player, check } => {
                cli::violations::reset(&cli.config, &player, check.as_deref())?
            }
        },
        Commands::Logs { tail, prune_days } => cli::logs::run(&cli.config, tail, prune_days)?,
        Commands::Init { force } => cli::init::run(&cli.config, force)?,
    }

    Ok(())
}
