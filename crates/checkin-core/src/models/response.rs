//! Survey response models

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Attendee, Identifier};
use crate::error::{Error, Result};

/// Highest millisecond value handed out to a submission id in this process.
static LAST_ISSUED_MILLIS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Locally generated, globally unique id of one survey submission.
///
/// Formatted as `<identifier>-<unix millis>`, which is also the natural key the
/// remote store enforces uniqueness on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    /// Generate a submission id for `identifier` at `now`.
    ///
    /// Two ids issued by the same process never share a millisecond: when the
    /// clock has not advanced since the previous id, the suffix is bumped past it.
    #[must_use]
    pub fn generate(identifier: &Identifier, now: DateTime<Utc>) -> Self {
        let millis = next_unique_millis(now.timestamp_millis());
        Self(format!("{identifier}-{millis}"))
    }

    /// Wrap an id that was generated elsewhere (stored rows, remote rows).
    pub fn from_existing(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("submission id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn next_unique_millis(candidate: i64) -> i64 {
    let bump = |last: i64| candidate.max(last.saturating_add(1));
    // The update never declines, so both arms carry the previous value.
    let previous = LAST_ISSUED_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(bump(last)))
        .unwrap_or_else(|last| last);
    bump(previous)
}

/// The two answers collected by the survey step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyAnswers {
    pub answer1: String,
    pub answer2: String,
}

impl SurveyAnswers {
    /// Build answers, rejecting a blank value for either question.
    pub fn new(answer1: impl Into<String>, answer2: impl Into<String>) -> Result<Self> {
        let answer1 = answer1.into().trim().to_string();
        let answer2 = answer2.into().trim().to_string();
        if answer1.is_empty() || answer2.is_empty() {
            return Err(Error::InvalidInput("both survey answers are required".into()));
        }
        Ok(Self { answer1, answer2 })
    }
}

/// A survey response accepted locally but not yet confirmed by the remote store.
///
/// Rows are append/delete only; nothing mutates a response after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResponse {
    pub submission_id: SubmissionId,
    pub identifier: Identifier,
    pub display_name: String,
    pub phone: String,
    pub answer1: String,
    pub answer2: String,
    pub submitted_at_local: DateTime<Utc>,
}

impl PendingResponse {
    /// Build a fresh response for `attendee` with a newly generated submission id.
    #[must_use]
    pub fn new(
        attendee: &Attendee,
        display_name: impl Into<String>,
        phone: impl Into<String>,
        answers: SurveyAnswers,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            submission_id: SubmissionId::generate(&attendee.identifier, now),
            identifier: attendee.identifier.clone(),
            display_name: display_name.into(),
            phone: phone.into(),
            answer1: answers.answer1,
            answer2: answers.answer2,
            submitted_at_local: now,
        }
    }
}

/// Read-only projection of a response row held by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub submission_id: Option<SubmissionId>,
    pub identifier: Identifier,
    pub display_name: String,
    pub phone: String,
    pub answer1: String,
    pub answer2: String,
    /// Timestamp assigned by the remote store, when present
    pub recorded_at: Option<DateTime<Utc>>,
}
