//! checkin migrate - schema status and upgrade with legacy CSV import.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json};
use crate::error::Result;
use crate::storage::{ImportOutcome, ImportReport};

#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub command: MigrateCommand,
}

#[derive(Subcommand, Debug)]
pub enum MigrateCommand {
    /// Report applied and pending migrations without touching the database
    Status,
    /// Apply pending migrations and import legacy per-event CSV files
    Run,
}

#[derive(Serialize)]
struct RunReport {
    status: &'static str,
    applied: Vec<String>,
    imported_rows: usize,
    failed_events: usize,
    import: ImportReport,
}

pub fn run(ctx: &AppContext, args: &MigrateArgs) -> Result<()> {
    match args.command {
        MigrateCommand::Status => run_status(ctx),
        MigrateCommand::Run => run_migrate(ctx),
    }
}

fn run_status(ctx: &AppContext) -> Result<()> {
    let status = ctx.migrator().check_status()?;

    if ctx.robot_mode {
        return emit_json(&status);
    }

    let mut layout = HumanLayout::new();
    layout.title("Migration Status");
    layout.kv("Database", &status.database_path.display().to_string());
    layout.kv("Exists", if status.database_exists { "yes" } else { "no" });
    layout.kv("Applied", &status.applied.len().to_string());
    layout.kv("Pending", &status.pending.len().to_string());
    layout.blank();

    if !status.applied.is_empty() {
        layout.section("Applied");
        for record in &status.applied {
            layout.bullet(&format!("{}  {}", record.name, record.applied_at));
        }
        layout.blank();
    }
    if !status.pending.is_empty() {
        layout.section("Pending");
        for name in &status.pending {
            layout.bullet(name);
        }
        layout.blank();
    }
    if !status.events.is_empty() {
        layout.section("Events");
        for event in &status.events {
            layout.kv(
                &event.event_id,
                &format!("{} attendees, {} checked in", event.attendees, event.checked_in),
            );
        }
    }

    emit_human(layout);
    Ok(())
}

fn run_migrate(ctx: &AppContext) -> Result<()> {
    let migrator = ctx.migrator();
    let pending = migrator.check_status()?.pending;
    let mut db = migrator.run_migrations()?;
    let import = migrator.migrate_existing_data(&mut db)?;

    let report = RunReport {
        status: "ok",
        applied: pending,
        imported_rows: import.total_inserted(),
        failed_events: import.failed().len(),
        import,
    };

    if ctx.robot_mode {
        return emit_json(&report);
    }

    let mut layout = HumanLayout::new();
    layout.title("Migration");
    layout.kv("Applied", &report.applied.len().to_string());
    for name in &report.applied {
        layout.bullet(name);
    }
    layout.kv("Imported rows", &report.imported_rows.to_string());
    layout.blank();

    if !report.import.events.is_empty() {
        layout.section("Legacy import");
        for event in &report.import.events {
            let summary = match &event.outcome {
                ImportOutcome::Imported {
                    rows_read,
                    inserted,
                    ignored,
                    skipped_blank,
                } => format!(
                    "{inserted} inserted, {ignored} already present, {skipped_blank} blank of {rows_read}"
                ),
                ImportOutcome::NoLegacyCsv => "no legacy CSV".to_string(),
                ImportOutcome::Failed { error } => format!("FAILED: {error}"),
            };
            layout.kv(&event.event_id, &summary);
        }
    }

    emit_human(layout);
    Ok(())
}
