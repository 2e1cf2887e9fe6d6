//! Response export helpers shared by reporting clients.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::view::ViewEntry;

const CSV_HEADER: &str = "timestamp,identifier,display_name,phone,answer1,answer2,origin";

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Render the merged view as pretty-printed JSON.
pub fn render_json_export(entries: &[ViewEntry]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(entries)
}

/// Render the merged view as CSV with every cell quoted.
#[must_use]
pub fn render_csv_export(entries: &[ViewEntry]) -> String {
    let mut output = String::from(CSV_HEADER);
    output.push('\n');

    for entry in entries {
        let timestamp = entry
            .timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();
        let cells = [
            timestamp.as_str(),
            entry.identifier.as_str(),
            entry.display_name.as_str(),
            entry.phone.as_str(),
            entry.answer1.as_str(),
            entry.answer2.as_str(),
            entry.origin.as_str(),
        ];

        for (index, cell) in cells.iter().enumerate() {
            if index > 0 {
                output.push(',');
            }
            let _ = write!(output, "\"{}\"", cell.replace('"', "\"\""));
        }
        output.push('\n');
    }

    output
}

/// Render the merged view in the selected format.
pub fn render_export(entries: &[ViewEntry], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Csv => Ok(render_csv_export(entries)),
        ExportFormat::Json => render_json_export(entries),
    }
}

/// Default export file name, e.g. `responses_2024-05-01-12-30-00.csv`.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "responses_{}.{}",
        now.format("%Y-%m-%d-%H-%M-%S"),
        format.extension()
    )
}
