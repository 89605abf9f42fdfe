//! `rbsync state` — read or seed the last synced commit.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use rbsync_core::{StateBackend, SyncConfig};
use rbsync_remote::{open_state_store, AutomationClient};
use rbsync_sync::StateStore;

use crate::GlobalArgs;

#[derive(Subcommand, Debug)]
pub enum StateCommand {
    /// Print the stored commit.
    Show,
    /// Store a commit as the last synced one (seed or reset).
    Set {
        /// Commit SHA the next sync diffs from.
        sha: String,
    },
}

pub fn run(command: StateCommand, global: &GlobalArgs) -> Result<()> {
    let home = super::home_dir()?;
    let config = super::load_config(&home, global)?;
    let mut store = open_store(&config, &home)?;
    let key = &config.state.variable;

    match command {
        StateCommand::Show => {
            match store
                .get(key)
                .with_context(|| format!("failed to read '{key}'"))?
            {
                Some(sha) => println!("{sha}"),
                None => println!("no commit stored under '{key}'"),
            }
        }
        StateCommand::Set { sha } => {
            let sha = sha.trim();
            if sha.is_empty() || sha.contains(char::is_whitespace) {
                bail!("'{sha}' is not a commit reference");
            }
            store
                .set(key, sha)
                .with_context(|| format!("failed to store '{key}'"))?;
            println!("✓ '{key}' set to {sha}");
        }
    }
    Ok(())
}

fn open_store(config: &SyncConfig, home: &Path) -> Result<Box<dyn StateStore>> {
    let azure_token = match config.state.backend {
        StateBackend::File => String::new(),
        StateBackend::AutomationVariable => config
            .azure_token()
            .context("the automation_variable backend needs the Azure token")?,
    };
    let client = AutomationClient::from_config(&config.automation, &azure_token);
    Ok(open_state_store(config, &client, home))
}
