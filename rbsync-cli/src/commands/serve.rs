//! `rbsync serve` — webhook listener in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use crate::GlobalArgs;

/// Arguments for `rbsync serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides `webhook.listen`).
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,
}

impl ServeArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let home = super::home_dir()?;
        let mut config = super::load_config(&home, global)?;
        if let Some(listen) = self.listen {
            config.webhook.listen = listen;
        }
        let credentials = config
            .resolve_credentials()
            .context("cannot authenticate against the remote hosts")?;

        rbsync_daemon::start_blocking(&home, config, credentials)
            .context("webhook listener exited with error")
    }
}
