use std::path::Path;

use checkin_core::LocalStore;

use crate::commands::common::{format_attendee_lines, open_store};
use crate::error::CliError;

pub async fn run_attendees(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let attendees = store.list_attendees().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&attendees)?);
        return Ok(());
    }

    if attendees.is_empty() {
        println!("No attendees cached. Run `checkin sync` while online.");
        return Ok(());
    }

    for line in format_attendee_lines(&attendees) {
        println!("{line}");
    }
    if let Some(refreshed) = store.last_attendee_refresh().await? {
        println!(
            "{} attendees, last refreshed {}",
            attendees.len(),
            refreshed.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
