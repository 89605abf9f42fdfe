//! `rbsync sync` — one pass from the stored commit to the branch head.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use rbsync_core::{paths, CommitSha};
use rbsync_remote::Remotes;
use rbsync_sync::{FileOutcome, FileResult, SyncOptions, SyncReport, TagRestore};

use crate::GlobalArgs;

/// Arguments for `rbsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Show what would change without touching the automation account or the
    /// stored commit.
    #[arg(long)]
    pub dry_run: bool,

    /// Diff from this commit instead of the stored one.
    #[arg(long, value_name = "SHA")]
    pub from: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let home = super::home_dir()?;
        let config = super::load_config(&home, global)?;
        let credentials = config
            .resolve_credentials()
            .context("cannot authenticate against the remote hosts")?;

        let mut remotes = Remotes::connect(&config, &credentials, &home);
        let mut options = SyncOptions::from_config(&config);
        options.dry_run = self.dry_run;
        options.from = self.from.map(CommitSha::from);

        let report = rbsync_sync::run(
            &remotes.repo,
            &remotes.automation,
            remotes.state.as_mut(),
            &options,
        )
        .context("sync aborted")?;

        report
            .save(&paths::last_report_path(&home))
            .context("failed to save sync report")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_report(&report);
        }

        // Per-file and checkpoint failures are in the report; only fatal steps
        // fail the process.
        if report.has_failures() {
            tracing::warn!(
                "sync finished with {} failed file(s), synced commit {}",
                report.failed(),
                if report.state_persisted { "stored" } else { "not stored" }
            );
        }
        Ok(())
    }
}

pub fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let range = format!("{}..{}", report.previous.short(), report.current.short());
    let mark = if report.has_failures() {
        "✗".red().to_string()
    } else {
        "✓".green().to_string()
    };

    if report.outcomes.is_empty() {
        println!("{prefix}{mark} {range} — nothing to do");
    } else {
        println!(
            "{prefix}{mark} {range} ({} applied, {} failed, {} skipped)",
            report.applied(),
            report.failed(),
            report.skipped()
        );
    }

    for outcome in &report.outcomes {
        println!("  {}", outcome_line(outcome));
    }

    if !report.dry_run && !report.state_persisted {
        println!(
            "  {} synced commit {} was not stored; the next run replays this diff",
            "!".yellow(),
            report.current.short()
        );
    }
}

fn outcome_line(outcome: &FileOutcome) -> String {
    let runbook = outcome
        .runbook
        .as_ref()
        .map(|name| format!(" → {name}"))
        .unwrap_or_default();
    let (symbol, detail) = match &outcome.result {
        FileResult::Deleted => ("-".red().to_string(), "deleted".to_string()),
        FileResult::AlreadyAbsent => ("·".normal().to_string(), "already absent".to_string()),
        FileResult::Imported { replaced, tags } => {
            let action = if *replaced { "replaced" } else { "imported" };
            let detail = match tags {
                TagRestore::NotNeeded => action.to_string(),
                TagRestore::Restored { count } => format!("{action}, {count} tag(s) restored"),
                TagRestore::Failed { reason } => format!("{action}, tags lost: {reason}"),
            };
            let symbol = if matches!(tags, TagRestore::Failed { .. }) {
                "!".yellow().to_string()
            } else {
                "+".green().to_string()
            };
            (symbol, detail)
        }
        FileResult::WouldDelete => ("~".normal().to_string(), "would delete".to_string()),
        FileResult::WouldImport { replaced } => (
            "~".normal().to_string(),
            if *replaced {
                "would replace".to_string()
            } else {
                "would import".to_string()
            },
        ),
        FileResult::Skipped { reason } => ("·".bright_black().to_string(), reason.clone()),
        FileResult::Failed { reason } => ("✗".red().to_string(), format!("failed: {reason}")),
    };
    format!("{symbol}  {}{runbook} ({detail})", outcome.path)
}
