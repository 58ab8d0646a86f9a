//! checkin attendees - list, export, import, add and check in attendees.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json};
use crate::core::AttendeeRecord;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct AttendeesArgs {
    #[command(subcommand)]
    pub command: AttendeesCommand,
}

#[derive(Subcommand, Debug)]
pub enum AttendeesCommand {
    /// List attendees of an event
    List(EventArg),
    /// Write an event's attendees as CSV
    Export(ExportArgs),
    /// Replace an event's attendees with the rows of a CSV file
    Import(ImportArgs),
    /// Add one attendee
    Add(AddArgs),
    /// Mark an attendee as checked in (or undo it)
    CheckIn(CheckInArgs),
    /// Remove one attendee
    Remove(RemoveArgs),
    /// Check-in totals for an event
    Stats(EventArg),
}

#[derive(Args, Debug)]
pub struct EventArg {
    /// Event id
    pub event: String,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Event id
    pub event: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Event id
    pub event: String,

    /// CSV file whose header names the columns
    pub csv: PathBuf,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Event id
    pub event: String,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    /// Registration number (allocated when omitted)
    #[arg(long)]
    pub registration_number: Option<String>,

    #[arg(long, default_value = "")]
    pub company: String,

    #[arg(long, default_value = "")]
    pub contact: String,

    #[arg(long, default_value = "")]
    pub invitation_type: String,
}

#[derive(Args, Debug)]
pub struct CheckInArgs {
    /// Event id
    pub event: String,

    /// Registration number
    pub registration_number: String,

    /// Clear the check-in instead
    #[arg(long)]
    pub undo: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Event id
    pub event: String,

    /// Registration number
    pub registration_number: String,
}

pub fn run(ctx: &AppContext, args: &AttendeesArgs) -> Result<()> {
    match &args.command {
        AttendeesCommand::List(event) => run_list(ctx, event),
        AttendeesCommand::Export(export) => run_export(ctx, export),
        AttendeesCommand::Import(import) => run_import(ctx, import),
        AttendeesCommand::Add(add) => run_add(ctx, add),
        AttendeesCommand::CheckIn(check_in) => run_check_in(ctx, check_in),
        AttendeesCommand::Remove(remove) => run_remove(ctx, remove),
        AttendeesCommand::Stats(event) => run_stats(ctx, event),
    }
}

fn run_list(ctx: &AppContext, args: &EventArg) -> Result<()> {
    let attendees = ctx.open_store()?.list_attendees(&args.event)?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "event_id": args.event,
            "count": attendees.len(),
            "attendees": attendees,
        }));
    }

    if attendees.is_empty() {
        println!("No attendees for event {}.", args.event);
        return Ok(());
    }
    for attendee in attendees {
        let record = attendee.record;
        let mark = if record.checked_in { "[x]" } else { "[ ]" };
        println!(
            "{mark} {}  {}  {}  {}",
            record.registration_number, record.name, record.company, record.email
        );
    }
    Ok(())
}

fn run_export(ctx: &AppContext, args: &ExportArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let rows = store.read_attendees(&args.event)?;
    let csv = store.generate_csv(&rows)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &csv)?;
            if ctx.robot_mode {
                return emit_json(&serde_json::json!({
                    "status": "ok",
                    "event_id": args.event,
                    "rows": rows.len(),
                    "path": path,
                }));
            }
            println!("Wrote {} rows to {}", rows.len(), path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

fn run_import(ctx: &AppContext, args: &ImportArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let content = std::fs::read_to_string(&args.csv)?;
    let rows = store.parse_csv(&content)?;
    let written = store.write_attendees(&args.event, &rows)?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "event_id": args.event,
            "written": written,
        }));
    }
    println!("Replaced attendees of {} with {written} rows.", args.event);
    Ok(())
}

fn run_add(ctx: &AppContext, args: &AddArgs) -> Result<()> {
    let record = AttendeeRecord {
        registration_number: args.registration_number.clone().unwrap_or_default(),
        name: args.name.clone(),
        company: args.company.clone(),
        contact: args.contact.clone(),
        email: args.email.clone(),
        invitation_type: args.invitation_type.clone(),
        checked_in: false,
        checkin_time: None,
    };
    let stored = ctx.open_store()?.add_attendee(&args.event, record)?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "event_id": args.event,
            "attendee": stored,
        }));
    }
    println!("Added {} ({})", stored.registration_number, stored.name);
    Ok(())
}

fn run_check_in(ctx: &AppContext, args: &CheckInArgs) -> Result<()> {
    let store = ctx.open_store()?;
    store.set_checked_in(&args.event, &args.registration_number, !args.undo)?;
    let attendee = store.find_attendee(&args.event, &args.registration_number)?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "event_id": args.event,
            "attendee": attendee,
        }));
    }
    if args.undo {
        println!("Cleared check-in for {}", args.registration_number);
    } else {
        let time = attendee
            .and_then(|a| a.record.checkin_time)
            .unwrap_or_default();
        println!("Checked in {} at {time}", args.registration_number);
    }
    Ok(())
}

fn run_remove(ctx: &AppContext, args: &RemoveArgs) -> Result<()> {
    ctx.open_store()?
        .delete_attendee(&args.event, &args.registration_number)?;

    if ctx.robot_mode {
        return emit_json(&serde_json::json!({
            "status": "ok",
            "event_id": args.event,
            "removed": args.registration_number,
        }));
    }
    println!("Removed {} from {}", args.registration_number, args.event);
    Ok(())
}

fn run_stats(ctx: &AppContext, args: &EventArg) -> Result<()> {
    let stats = ctx.open_store()?.checkin_stats(&args.event)?;

    if ctx.robot_mode {
        return emit_json(&stats);
    }

    let mut layout = HumanLayout::new();
    layout.title(&format!("Event {}", stats.event_id));
    layout.kv("Total", &stats.total.to_string());
    layout.kv("Checked in", &stats.checked_in.to_string());
    layout.kv("Not checked in", &stats.not_checked_in.to_string());
    emit_human(layout);
    Ok(())
}
