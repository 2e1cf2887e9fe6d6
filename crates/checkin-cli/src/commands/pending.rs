use std::path::Path;

use checkin_core::LocalStore;
use chrono::Utc;

use crate::commands::common::{
    format_pending_lines, open_store, pending_to_list_item, PendingListItem,
};
use crate::error::CliError;

pub async fn run_pending(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let pending = store.list_pending_responses().await?;
    let now_ms = Utc::now().timestamp_millis();

    if as_json {
        let json_items = pending
            .iter()
            .map(|response| pending_to_list_item(response, now_ms))
            .collect::<Vec<PendingListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("No responses waiting to sync.");
        return Ok(());
    }

    for line in format_pending_lines(&pending, now_ms) {
        println!("{line}");
    }
    Ok(())
}
