//! Output formatting and persistence for normalized data.
//!
//! Supports a plain text countdown view, JSON, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::eta::UnifiedEta;
use csv::WriterBuilder;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::Path;

/// One arrival as a CSV row.
#[derive(Debug, Serialize)]
pub struct ArrivalRow {
    pub fetched_at: DateTime<Utc>,
    pub line: String,
    pub direction: String,
    pub stop_tag: String,
    pub epoch_time: i64,
    pub seconds_away: i64,
    pub branch: String,
    pub vehicle_id: String,
}

/// Flattens groups into rows, keeping group order.
pub fn arrival_rows(groups: &[UnifiedEta], fetched_at: i64) -> Vec<ArrivalRow> {
    let timestamp = DateTime::from_timestamp(fetched_at, 0).unwrap_or_default();
    groups
        .iter()
        .flat_map(|g| {
            g.etas.iter().map(move |e| ArrivalRow {
                fetched_at: timestamp,
                line: g.line.clone(),
                direction: g.direction.clone(),
                stop_tag: g.stop_tag.clone(),
                epoch_time: e.epoch_time,
                seconds_away: e.seconds_until(fetched_at),
                branch: e.branch.clone(),
                vehicle_id: e.vehicle_id.clone(),
            })
        })
        .collect()
}

/// `"5 min"`, or `"due"` under a minute.
pub fn countdown(seconds: i64) -> String {
    if seconds < 60 {
        "due".to_string()
    } else {
        format!("{} min", seconds / 60)
    }
}

/// Renders one block per group: a heading line, then one line per arrival.
pub fn render_groups(groups: &[UnifiedEta], now: i64) -> String {
    let mut out = String::new();
    if groups.is_empty() {
        out.push_str("No predictions available\n");
        return out;
    }
    for g in groups {
        let _ = writeln!(out, "{} {} (stop {})", g.line, g.direction, g.stop_tag);
        if g.etas.is_empty() {
            out.push_str("  no arrivals\n");
        }
        for e in &g.etas {
            let _ = write!(out, "  {:>7}  {}", countdown(e.seconds_until(now)), e.branch);
            if !e.vehicle_id.is_empty() {
                let _ = write!(out, "  vehicle {}", e.vehicle_id);
            }
            out.push('\n');
        }
    }
    out
}

/// Prints any value as pretty JSON on stdout.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends serializable records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &str, records: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}
