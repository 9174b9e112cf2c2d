use cadence_core::materialization::{FailureKind, MaterializationSummary};
use chrono::{DateTime, Utc};
use comfy_table::{Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub fn display_summary(summary: &MaterializationSummary) {
    let verb = if summary.dry_run {
        "would be created"
    } else {
        "created"
    };
    let headline = format!("{} task(s) {}", summary.tasks_created, verb);
    if summary.errors.is_empty() {
        println!("{}", headline.green().bold());
    } else {
        println!("{}", headline.yellow().bold());
    }

    let mut stats = Table::new();
    stats.set_header(vec!["Definitions processed", "Skipped", "With errors", "Duration"]);
    stats.add_row(vec![
        Cell::new(summary.definitions_processed),
        Cell::new(summary.definitions_skipped),
        Cell::new(summary.definitions_with_errors),
        Cell::new(format!("{} ms", summary.duration_ms)),
    ]);
    println!("{stats}");

    if !summary.created.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Task", "Recurring task", "Occurrence", "Title"]);
        for task in &summary.created {
            let task_cell = match &task.task_id {
                Some(id) => Cell::new(short_id(id)),
                None => Cell::new("(preview)").fg(Color::DarkGrey),
            };
            table.add_row(vec![
                task_cell,
                Cell::new(short_id(&task.recurring_task_id)),
                Cell::new(task.occurrence_at.format(TIMESTAMP_FORMAT)),
                Cell::new(&task.title),
            ]);
        }
        println!("{table}");
    }

    if !summary.errors.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Recurring task", "Occurrence", "Kind", "Error"]);
        for error in &summary.errors {
            let kind = match error.kind {
                FailureKind::Occurrence => Cell::new("occurrence").fg(Color::Yellow),
                FailureKind::Definition => Cell::new("definition")
                    .fg(Color::Red)
                    .add_attribute(Attribute::Bold),
            };
            let occurrence = error
                .occurrence_at
                .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(short_id(&error.recurring_task_id)),
                Cell::new(occurrence),
                kind,
                Cell::new(&error.message),
            ]);
        }
        println!("{table}");
    }

    if summary.deferred {
        println!(
            "{}",
            "Some occurrences were deferred to the next pass.".yellow()
        );
    }
    if summary.stopped_early {
        println!("{}", "Stopped early: task budget reached.".yellow());
    }
    if summary.cancelled {
        println!("{}", "Pass was cancelled before finishing.".red());
    }
}

pub fn display_occurrences(title: &str, occurrences: &[DateTime<Utc>]) {
    if occurrences.is_empty() {
        println!("No upcoming occurrences for '{}'.", title);
        return;
    }

    println!("Upcoming occurrences for '{}':", title.bold());
    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Weekday"]);
    for (index, at) in occurrences.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(at.format(TIMESTAMP_FORMAT)).fg(Color::Cyan),
            Cell::new(at.format("%A")),
        ]);
    }
    println!("{table}");
}
