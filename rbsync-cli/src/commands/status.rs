//! `rbsync status` — report of the last sync run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rbsync_core::paths;
use rbsync_sync::{FileResult, SyncReport, TagRestore};

/// Arguments for `rbsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "runbook")]
    runbook: String,
    #[tabled(rename = "result")]
    result: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let path = paths::last_report_path(&home);
        let report = SyncReport::load(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let Some(report) = report else {
            if self.json {
                println!("null");
            } else {
                println!("No sync has run yet. Run `rbsync sync` first.");
            }
            return Ok(());
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
            return Ok(());
        }

        print_summary(&report, Utc::now());
        Ok(())
    }
}

fn print_summary(report: &SyncReport, now: DateTime<Utc>) {
    let state = if report.dry_run {
        "dry run".bright_black().to_string()
    } else if report.has_failures() {
        "with failures".red().to_string()
    } else {
        "ok".green().to_string()
    };
    println!(
        "rbsync v{} | last sync {} ({}) | {}..{} | {}",
        env!("CARGO_PKG_VERSION"),
        format_age(report.finished_at, now),
        report.finished_at.to_rfc3339(),
        report.previous.short(),
        report.current.short(),
        state,
    );
    println!(
        "{} applied, {} failed, {} skipped; synced commit {}",
        report.applied(),
        report.failed(),
        report.skipped(),
        if report.state_persisted {
            "stored"
        } else {
            "not stored"
        },
    );

    if report.outcomes.is_empty() {
        println!("No file changes.");
        return;
    }

    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .map(|o| OutcomeRow {
            path: o.path.clone(),
            runbook: o
                .runbook
                .as_ref()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            result: result_label(&o.result),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn result_label(result: &FileResult) -> String {
    match result {
        FileResult::Deleted => "deleted".to_string(),
        FileResult::AlreadyAbsent => "already absent".to_string(),
        FileResult::Imported { replaced, tags } => {
            let action = if *replaced { "replaced" } else { "imported" };
            match tags {
                TagRestore::NotNeeded => action.to_string(),
                TagRestore::Restored { count } => format!("{action} (+{count} tags)"),
                TagRestore::Failed { reason } => format!("{action} (tags lost: {reason})"),
            }
        }
        FileResult::WouldDelete => "would delete".to_string(),
        FileResult::WouldImport { replaced: true } => "would replace".to_string(),
        FileResult::WouldImport { replaced: false } => "would import".to_string(),
        FileResult::Skipped { reason } => format!("skipped: {reason}"),
        FileResult::Failed { reason } => format!("FAILED: {reason}"),
    }
}

fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
