use checkin_core::LocalStore;

use crate::commands::common::{describe_drain, describe_refresh, Session};
use crate::error::CliError;

pub async fn run_sync(session: &Session) -> Result<(), CliError> {
    if !session.remote.is_configured() {
        return Err(CliError::RemoteNotConfigured);
    }

    if !session.connectivity.is_online() {
        let queued = session.store.count_pending_responses().await?;
        println!("Offline: sync skipped, {queued} responses remain queued");
        return Ok(());
    }

    let summary = session.orchestrator().sync_now().await;
    println!("{}", describe_refresh(&summary.refresh));
    let report = summary.drain?;
    println!("{}", describe_drain(&report));

    if summary.refresh.is_ok() && report.retained == 0 {
        println!("Sync completed");
    } else {
        println!("Sync finished with errors; run `checkin sync` again later");
    }
    Ok(())
}
