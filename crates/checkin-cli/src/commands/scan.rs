use checkin_core::models::SurveyAnswers;
use checkin_core::resolution::{SurveyForm, SurveySubmission};
use checkin_core::{InitialSyncSignal, ScanOutcome};

use crate::commands::common::{
    describe_not_found, describe_refresh, describe_submit, format_form_lines,
    spawn_initial_refresh, Engine, Session,
};
use crate::error::CliError;

pub struct ScanArgs {
    pub payload: String,
    pub answer1: Option<String>,
    pub answer2: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

pub async fn run_scan(session: &Session, args: ScanArgs) -> Result<(), CliError> {
    let initial_sync = InitialSyncSignal::new();
    let refresh = spawn_initial_refresh(session.orchestrator(), initial_sync.clone());
    let engine = session.engine(initial_sync);

    let outcome = engine.scan(&args.payload).await;
    let result = match outcome {
        ScanOutcome::Ignored => {
            println!("Scan ignored: another scan is in progress");
            Ok(())
        }
        ScanOutcome::NotFound { identifier } => {
            println!("{}", describe_not_found(&identifier));
            Ok(())
        }
        ScanOutcome::Resolved { form, source } => {
            for line in format_form_lines(&form, source) {
                println!("{line}");
            }
            record_survey(&engine, &form, args).await
        }
    };

    // Let the start-up refresh finish so the cache is warm for the next run.
    if let Ok(outcome) = refresh.await {
        tracing::debug!("{}", describe_refresh(&outcome));
    }
    result
}

async fn record_survey(engine: &Engine, form: &SurveyForm, args: ScanArgs) -> Result<(), CliError> {
    let (Some(answer1), Some(answer2)) = (args.answer1, args.answer2) else {
        engine.cancel();
        println!("Pass --answer1 and --answer2 to record the survey");
        return Ok(());
    };

    let answers = match SurveyAnswers::new(answer1, answer2) {
        Ok(answers) => answers,
        Err(error) => {
            engine.cancel();
            return Err(error.into());
        }
    };

    let submission = apply_overrides(SurveySubmission::from_form(form, answers), args.name, args.phone);
    let outcome = engine.submit(submission).await?;
    println!("{}", describe_submit(&outcome));
    Ok(())
}

/// Replace the pre-filled contact details with any non-blank overrides.
pub fn apply_overrides(
    mut submission: SurveySubmission,
    name: Option<String>,
    phone: Option<String>,
) -> SurveySubmission {
    if let Some(name) = name.filter(|value| !value.trim().is_empty()) {
        submission.display_name = name.trim().to_string();
    }
    if let Some(phone) = phone.filter(|value| !value.trim().is_empty()) {
        submission.phone = phone.trim().to_string();
    }
    submission
}
