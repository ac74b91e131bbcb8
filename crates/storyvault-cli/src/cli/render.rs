//! # Rendering Module
//!
//! Turns a [`CmdResult`] into terminal text. Styling comes from `console`, which drops
//! colors when stdout is not a terminal; the `_internal` variants take an explicit color
//! flag so tests see plain text.
//!
//! Layout follows the result's shape: database listings, then the active database summary,
//! then import tallies, then listed records and paths, and finally the command messages.

use chrono::{DateTime, Utc};
use console::Style;
use serde_json::Value;
use storyvault::commands::{CmdMessage, CmdResult, DatabaseListing, ImportReport, MessageLevel};
use storyvault::model::{field_str, record_id, DatabaseSummary, Record};
use std::path::PathBuf;

pub const NAME_WIDTH: usize = 28;
pub const TIME_WIDTH: usize = 14;
pub const CURRENT_MARKER: &str = "*";

pub fn render_result(result: &CmdResult) -> String {
    render_result_internal(result, console::colors_enabled())
}

fn render_result_internal(result: &CmdResult, color: bool) -> String {
    let mut out = String::new();
    if !result.databases.is_empty() {
        out.push_str(&render_database_list(&result.databases, color));
    }
    if let Some(summary) = &result.database {
        out.push_str(&render_summary(summary, color));
    }
    if let Some(report) = &result.import {
        out.push_str(&render_import_report(report, color));
    }
    if !result.records.is_empty() {
        out.push_str(&render_records(&result.records, color));
    }
    if !result.paths.is_empty() {
        out.push_str(&render_paths(&result.paths));
    }
    out.push_str(&render_messages_internal(&result.messages, color));
    out
}

fn paint(style: &Style, text: &str, color: bool) -> String {
    if color {
        style.clone().force_styling(true).apply_to(text).to_string()
    } else {
        text.to_string()
    }
}

fn render_database_list(databases: &[DatabaseListing], color: bool) -> String {
    let current = Style::new().green().bold();
    let dim = Style::new().dim();
    let mut out = String::new();
    for db in databases {
        let marker = if db.current { CURRENT_MARKER } else { " " };
        let name = format!("{:<width$}", db.name, width = NAME_WIDTH);
        let name = if db.current {
            paint(&current, &name, color)
        } else {
            name
        };
        let location = match (db.in_tiers, db.file.is_some()) {
            (true, true) => "store, file",
            (true, false) => "store",
            (false, true) => "file",
            (false, false) => "",
        };
        let records = if db.in_tiers {
            format!("{:>6} records", db.records)
        } else {
            format!("{:>14}", "")
        };
        out.push_str(&format!(
            "{} {} {}  {}\n",
            marker,
            name,
            records,
            paint(&dim, location, color)
        ));
    }
    out
}

fn render_summary(summary: &DatabaseSummary, color: bool) -> String {
    let title = Style::new().bold();
    let dim = Style::new().dim();
    let modified = summary
        .modified_at
        .map(|at| format_time_ago(at).trim().to_string())
        .unwrap_or_else(|| "never saved".to_string());

    let mut out = format!(
        "{}  {}\n",
        paint(&title, &summary.name, color),
        paint(&dim, &format!("v{} · {}", summary.version, modified), color)
    );
    let populated: Vec<_> = summary.counts.iter().filter(|(_, n)| **n > 0).collect();
    if populated.is_empty() {
        out.push_str(&format!("  {}\n", paint(&dim, "(empty)", color)));
    }
    for (collection, count) in populated {
        out.push_str(&format!("  {:<20} {:>6}\n", collection, count));
    }
    out
}

fn render_import_report(report: &ImportReport, color: bool) -> String {
    let dim = Style::new().dim();
    let mut out = String::new();
    for (collection, tally) in &report.collections {
        if tally.added == 0 && tally.skipped == 0 {
            continue;
        }
        let skipped = if tally.skipped > 0 {
            paint(&dim, &format!("{} skipped", tally.skipped), color)
        } else {
            String::new()
        };
        out.push_str(&format!(
            "  {:<20} {:>6} added  {}\n",
            collection, tally.added, skipped
        ));
    }
    out
}

fn render_records(records: &[Record], color: bool) -> String {
    let dim = Style::new().dim();
    let mut out = String::new();
    for record in records {
        let line = match record {
            Value::String(text) => text.clone(),
            _ => {
                let label = ["name", "title", "firstName"]
                    .iter()
                    .find_map(|field| field_str(record, field))
                    .unwrap_or("(untitled)");
                let mut details = Vec::new();
                if let Some(id) = record_id(record) {
                    details.push(id);
                }
                if let Some(color_value) = field_str(record, "color") {
                    details.push(color_value.to_string());
                }
                format!(
                    "{:<width$} {}",
                    label,
                    paint(&dim, &details.join("  "), color),
                    width = NAME_WIDTH
                )
            }
        };
        out.push_str(&format!("  {}\n", line.trim_end()));
    }
    out
}

fn render_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| format!("  {}\n", path.display()))
        .collect()
}

/// Renders command messages, one per line, styled by level.
pub fn render_messages(messages: &[CmdMessage]) -> String {
    render_messages_internal(messages, console::colors_enabled())
}

fn render_messages_internal(messages: &[CmdMessage], color: bool) -> String {
    messages
        .iter()
        .map(|msg| {
            let style = match msg.level {
                MessageLevel::Info => Style::new().dim(),
                MessageLevel::Success => Style::new().green(),
                MessageLevel::Warning => Style::new().yellow(),
                MessageLevel::Error => Style::new().red().bold(),
            };
            format!("{}\n", paint(&style, &msg.content, color))
        })
        .collect()
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let time_str = timeago::Formatter::new().convert(duration.to_std().unwrap_or_default());

    // Pad units to the width of "seconds" so columns line up.
    let time_str = time_str
        .replace("hours ago", "  hours ago")
        .replace("hour ago", "   hour ago")
        .replace("days ago", "   days ago")
        .replace("day ago", "    day ago")
        .replace("weeks ago", "  weeks ago")
        .replace("week ago", "   week ago")
        .replace("months ago", " months ago")
        .replace("month ago", "  month ago")
        .replace("years ago", "  years ago")
        .replace("year ago", "   year ago");

    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
