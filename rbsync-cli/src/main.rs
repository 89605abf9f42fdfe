//! rbsync — mirror PowerShell runbooks from a GitLab branch into an Azure
//! Automation account.
//!
//! # Usage
//!
//! ```text
//! rbsync sync [--dry-run] [--from <sha>] [--json]
//! rbsync status [--json]
//! rbsync state show|set <sha>
//! rbsync serve
//! ```
//!
//! Global flags: `--config <path>` (default `~/.rbsync/config.yaml`),
//! `--log-json`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{serve::ServeArgs, state::StateCommand, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rbsync",
    version,
    about = "Mirror runbook scripts from GitLab into Azure Automation",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the config file (default: ~/.rbsync/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit log records as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the changes between the last synced commit and the branch head.
    Sync(SyncArgs),

    /// Show the report of the last sync run.
    Status(StatusArgs),

    /// Inspect or seed the last synced commit.
    State {
        #[command(subcommand)]
        command: StateCommand,
    },

    /// Listen for GitLab push webhooks and sync on each push.
    Serve(ServeArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    rbsync_daemon::init_tracing(cli.global.log_json);
    match cli.command {
        Commands::Sync(args) => args.run(&cli.global),
        Commands::Status(args) => args.run(),
        Commands::State { command } => commands::state::run(command, &cli.global),
        Commands::Serve(args) => args.run(&cli.global),
    }
}
