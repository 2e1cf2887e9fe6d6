use std::io::{self, Write};
use std::sync::Arc;

use checkin_core::models::SurveyAnswers;
use checkin_core::resolution::SurveySubmission;
use checkin_core::sync::spawn_reconnect_sync;
use checkin_core::{InitialSyncSignal, ScanOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::time::Duration;

use crate::commands::common::{
    describe_not_found, describe_submit, format_form_lines, spawn_connectivity_probe,
    spawn_initial_refresh, Engine, Session,
};
use crate::error::CliError;

pub const PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Long-running scan loop fed by decoded payloads on stdin.
pub async fn run_kiosk(session: &Session) -> Result<(), CliError> {
    let orchestrator = session.orchestrator();
    let initial_sync = InitialSyncSignal::new();
    let initial_refresh = spawn_initial_refresh(Arc::clone(&orchestrator), initial_sync.clone());
    let reconnect = spawn_reconnect_sync(orchestrator);
    let probe = (!session.forced_offline && session.remote.is_configured()).then(|| {
        spawn_connectivity_probe(
            Arc::clone(&session.remote),
            session.connectivity.clone(),
            PROBE_INTERVAL,
        )
    });
    let engine = session.engine(initial_sync);

    println!("Kiosk ready. Scan a code, or type `quit` to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = kiosk_loop(&engine, &mut lines).await;

    if let Some(probe) = probe {
        probe.abort();
    }
    reconnect.abort();
    initial_refresh.abort();
    result
}

/// Process scans until `quit` or end of input.
pub async fn kiosk_loop<R>(engine: &Engine, lines: &mut Lines<R>) -> Result<(), CliError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(line) = prompt(lines, "scan> ").await? else {
            return Ok(());
        };
        let payload = line.trim();
        if payload.is_empty() {
            continue;
        }
        if matches!(payload, "quit" | "exit") {
            return Ok(());
        }

        match engine.scan(payload).await {
            ScanOutcome::Ignored => println!("Busy; scan ignored"),
            ScanOutcome::NotFound { identifier } => println!("{}", describe_not_found(&identifier)),
            ScanOutcome::Resolved { form, source } => {
                for line in format_form_lines(&form, source) {
                    println!("{line}");
                }
                let Some(answers) = prompt_answers(lines).await? else {
                    engine.cancel();
                    println!("Survey cancelled");
                    continue;
                };
                let outcome = engine
                    .submit(SurveySubmission::from_form(&form, answers))
                    .await?;
                println!("{}", describe_submit(&outcome));
            }
        }
    }
}

async fn prompt_answers<R>(lines: &mut Lines<R>) -> Result<Option<SurveyAnswers>, CliError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(answer1) = prompt(lines, "Interest: ").await? else {
        return Ok(None);
    };
    let Some(answer2) = prompt(lines, "Development: ").await? else {
        return Ok(None);
    };

    match SurveyAnswers::new(answer1, answer2) {
        Ok(answers) => Ok(Some(answers)),
        Err(error) => {
            println!("{error}");
            Ok(None)
        }
    }
}

async fn prompt<R>(lines: &mut Lines<R>, label: &str) -> Result<Option<String>, CliError>
where
    R: AsyncBufRead + Unpin,
{
    print!("{label}");
    io::stdout().flush()?;
    Ok(lines.next_line().await?)
}
