//! checkin backup - snapshot, prune, restore and schedule database backups.

use std::sync::Arc;

use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::backup::{BackupScheduler, BackupStatus};
use crate::cli::output::{HumanLayout, emit_human, emit_json, format_bytes};
use crate::error::{CheckinError, Result};

#[derive(Args, Debug)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Create a new compressed backup now
    Create,
    /// List available backups, newest first
    List(BackupListArgs),
    /// Apply the retention policy
    Cleanup,
    /// Show schedule and retention settings
    Status,
    /// Show recorded backup outcomes
    History(BackupListArgs),
    /// Restore the live database from a backup
    Restore(BackupRestoreArgs),
    /// Run scheduled backups in the foreground until interrupted
    Schedule,
}

#[derive(Args, Debug)]
pub struct BackupListArgs {
    /// Maximum number of entries to show
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct BackupRestoreArgs {
    /// Backup filename (attendees_backup_YYYYMMDD_HHMMSS.db.gz)
    pub file: String,

    /// Apply restore (required)
    #[arg(long)]
    pub approve: bool,
}

pub fn run(ctx: &AppContext, args: &BackupArgs) -> Result<()> {
    match &args.command {
        BackupCommand::Create => run_create(ctx),
        BackupCommand::List(list) => run_list(ctx, list),
        BackupCommand::Cleanup => run_cleanup(ctx),
        BackupCommand::Status => run_status(ctx),
        BackupCommand::History(list) => run_history(ctx, list),
        BackupCommand::Restore(restore) => run_restore(ctx, restore),
        BackupCommand::Schedule => run_schedule(ctx),
    }
}

fn run_create(ctx: &AppContext) -> Result<()> {
    let created = ctx.backup_manager()?.create_backup()?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "backup": created,
        }));
    }

    println!("Backup created: {}", created.backup.filename);
    println!("Path: {}", created.backup.path.display());
    println!(
        "Size: {} (database {})",
        format_bytes(created.backup.size_bytes),
        format_bytes(created.source_bytes)
    );
    if !created.cleanup.removed.is_empty() {
        println!("Pruned: {}", created.cleanup.removed.join(", "));
    }
    Ok(())
}

fn run_list(ctx: &AppContext, args: &BackupListArgs) -> Result<()> {
    let mut backups = ctx.detached_backup_manager().list_backups()?;
    backups.truncate(args.limit);

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "count": backups.len(),
            "backups": backups,
        }));
    }

    if backups.is_empty() {
        println!("No backups found.");
        return Ok(());
    }

    println!("Backups:");
    for backup in backups {
        let created = backup
            .created_at
            .map_or_else(|| "unknown".to_string(), |at| at.to_string());
        println!(
            "  {}  {}  {}",
            backup.filename,
            created,
            format_bytes(backup.size_bytes)
        );
    }
    Ok(())
}

fn run_cleanup(ctx: &AppContext) -> Result<()> {
    let report = ctx.detached_backup_manager().cleanup_old_backups()?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "cleanup": report,
        }));
    }

    println!(
        "Removed {} backup(s), kept {}.",
        report.removed.len(),
        report.kept
    );
    for name in &report.removed {
        println!("  {name}");
    }
    Ok(())
}

fn run_status(ctx: &AppContext) -> Result<()> {
    let scheduler = BackupScheduler::new(Arc::new(ctx.detached_backup_manager()));
    let status = scheduler.status();

    if ctx.robot_mode {
        return emit_json(&status);
    }
    emit_human(status_layout(&status));
    Ok(())
}

fn run_history(ctx: &AppContext, args: &BackupListArgs) -> Result<()> {
    let records = ctx.backup_manager()?.backup_history(args.limit)?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "count": records.len(),
            "history": records,
        }));
    }

    if records.is_empty() {
        println!("No backup history recorded.");
        return Ok(());
    }
    for record in records {
        let outcome = match &record.error {
            Some(error) => format!("{} ({error})", record.status.as_str()),
            None => record.status.as_str().to_string(),
        };
        println!(
            "  {}  {}  {}  {}",
            record.created_at,
            record.filename,
            format_bytes(record.size_bytes),
            outcome
        );
    }
    Ok(())
}

fn run_restore(ctx: &AppContext, args: &BackupRestoreArgs) -> Result<()> {
    if !args.approve {
        return Err(CheckinError::ApprovalRequired(
            "backup restore requires --approve".to_string(),
        ));
    }
    let report = ctx.detached_backup_manager().restore_backup(&args.file)?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "restore": report,
        }));
    }

    println!("Restored {} into {}", report.restored, report.database_path.display());
    if let Some(safety) = &report.safety_copy {
        println!("Previous database saved as {}", safety.display());
    }
    println!("Restart any process using the database.");
    Ok(())
}

fn run_schedule(ctx: &AppContext) -> Result<()> {
    let manager = Arc::new(ctx.backup_manager()?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let scheduler = BackupScheduler::new(manager);
        scheduler.start()?;
        if !ctx.robot_mode {
            emit_human(status_layout(&scheduler.status()));
            println!("Press Ctrl-C to stop.");
        }
        tokio::signal::ctrl_c().await?;
        scheduler.stop();

        if ctx.robot_mode {
            emit_json(&scheduler.status())?;
        }
        Ok::<(), CheckinError>(())
    })
}

fn status_layout(status: &BackupStatus) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title("Backup Status");
    layout.kv("Running", if status.running { "yes" } else { "no" });
    layout.kv("Schedule", &status.schedule);
    layout.kv(
        "Next run",
        status.next_run.as_deref().unwrap_or("invalid schedule"),
    );
    layout.kv("Directory", &status.backup_dir.display().to_string());
    layout.kv("Retention", &format!("{} days", status.retention_days));
    layout.kv("Max backups", &status.max_backups.to_string());
    if let Some(last) = &status.last_run {
        layout.kv(
            "Last run",
            &format!("{} {} {}", last.finished_at, last.filename, last.status.as_str()),
        );
    }
    layout
}
