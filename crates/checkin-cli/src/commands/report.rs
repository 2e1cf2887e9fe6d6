use checkin_core::report::{load_report, AnswerBucket, Breakdown, Report};

use crate::commands::common::{format_timestamp, format_view_lines, Session};
use crate::error::CliError;

pub async fn run_report(session: &Session, limit: usize, as_json: bool) -> Result<(), CliError> {
    let online = session.connectivity.is_online();
    let report = load_report(&session.store, session.remote.as_ref(), online, limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !online {
        println!("Offline: showing locally queued responses only");
    }
    for line in format_report_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_report_lines(report: &Report) -> Vec<String> {
    let summary = &report.summary;
    let mut lines = vec![
        format!("Cached attendees:  {}", summary.cached_attendees),
        format!("Pending responses: {}", summary.pending_responses),
        format!("Responses:         {}", summary.merged_responses),
        format!("Last refresh:      {}", format_timestamp(summary.last_refresh)),
        String::new(),
    ];

    lines.extend(format_breakdown_lines("Interest", &report.stats.answer1));
    lines.extend(format_breakdown_lines("Development", &report.stats.answer2));

    if report.entries.is_empty() {
        lines.push("No responses recorded yet.".to_string());
    } else {
        lines.extend(format_view_lines(&report.entries));
    }
    lines
}

pub fn format_breakdown_lines(title: &str, breakdown: &Breakdown) -> Vec<String> {
    let mut lines = vec![format!("{title} ({} answers)", breakdown.total())];
    for bucket in AnswerBucket::ALL {
        lines.push(format!(
            "  {:<8} {:>4}  {:>3}%",
            bucket.label(),
            breakdown.count(bucket),
            breakdown.percent(bucket)
        ));
    }
    lines.push(String::new());
    lines
}
