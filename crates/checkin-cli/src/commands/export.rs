use std::path::{Path, PathBuf};

use checkin_core::export::{render_export, suggested_export_file_name};
use checkin_core::report::{load_report, DEFAULT_REPORT_LIMIT};
use chrono::Utc;

use crate::cli::ExportFormat;
use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_export(
    session: &Session,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let report = load_report(
        &session.store,
        session.remote.as_ref(),
        session.connectivity.is_online(),
        DEFAULT_REPORT_LIMIT,
    )
    .await?;
    let rendered = render_export(&report.entries, format.into())?;

    if let Some(path) = output_path {
        let path = resolve_export_path(path, format);
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        print!("{rendered}");
    }

    Ok(())
}

/// A directory target gets the timestamped default file name.
pub fn resolve_export_path(path: &Path, format: ExportFormat) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_export_file_name(format.into(), Utc::now()))
    } else {
        path.to_path_buf()
    }
}
