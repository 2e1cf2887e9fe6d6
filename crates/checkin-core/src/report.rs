//! Aggregate reporting over the merged response view.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::remote::RemoteClient;
use crate::services::LocalStore;
use crate::view::{build_view, ViewEntry};
use crate::Result;

/// Default number of remote responses pulled for a report.
pub const DEFAULT_REPORT_LIMIT: usize = 1_000;

const YES_KEYWORDS: &[&str] = &[
    "si", "sí", "sii", "si.", "si?", "yes", "👍", "🙂", "😀", "😊", "bueno",
];
const MAYBE_KEYWORDS: &[&str] = &[
    "mas o menos",
    "más o menos",
    "mas",
    "regular",
    "ni fu ni fa",
    "😐",
    "😶",
    "🤔",
];
const NO_KEYWORDS: &[&str] = &["no", "no.", "nope", "👎", "😞", "malo"];

/// Coarse sentiment of a free-form survey answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerBucket {
    Yes,
    Maybe,
    No,
    Unknown,
}

impl AnswerBucket {
    pub const ALL: [Self; 4] = [Self::Yes, Self::Maybe, Self::No, Self::Unknown];

    /// Classify an answer by keyword containment, checking yes, then maybe, then no.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let answer = raw.trim().to_lowercase();
        let contains_any = |keywords: &[&str]| keywords.iter().any(|k| answer.contains(k));

        if contains_any(YES_KEYWORDS) {
            Self::Yes
        } else if contains_any(MAYBE_KEYWORDS) {
            Self::Maybe
        } else if contains_any(NO_KEYWORDS) {
            Self::No
        } else if answer.contains("más") || answer.contains("ni") {
            Self::Maybe
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::Maybe => "Maybe",
            Self::No => "No",
            Self::Unknown => "Unknown",
        }
    }
}

/// Per-bucket counts for one survey question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub yes: usize,
    pub maybe: usize,
    pub no: usize,
    pub unknown: usize,
}

impl Breakdown {
    fn record(&mut self, bucket: AnswerBucket) {
        match bucket {
            AnswerBucket::Yes => self.yes += 1,
            AnswerBucket::Maybe => self.maybe += 1,
            AnswerBucket::No => self.no += 1,
            AnswerBucket::Unknown => self.unknown += 1,
        }
    }

    #[must_use]
    pub const fn count(&self, bucket: AnswerBucket) -> usize {
        match bucket {
            AnswerBucket::Yes => self.yes,
            AnswerBucket::Maybe => self.maybe,
            AnswerBucket::No => self.no,
            AnswerBucket::Unknown => self.unknown,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.yes + self.maybe + self.no + self.unknown
    }

    /// Share of `bucket` rounded to a whole percent; 0 when empty.
    #[must_use]
    pub const fn percent(&self, bucket: AnswerBucket) -> usize {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        (self.count(bucket) * 100 + total / 2) / total
    }
}

/// Breakdowns for both survey questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResponseStats {
    pub total: usize,
    pub answer1: Breakdown,
    pub answer2: Breakdown,
}

impl ResponseStats {
    #[must_use]
    pub fn from_view(entries: &[ViewEntry]) -> Self {
        let mut stats = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            stats.answer1.record(AnswerBucket::classify(&entry.answer1));
            stats.answer2.record(AnswerBucket::classify(&entry.answer2));
        }
        stats
    }
}

/// Headline numbers for a reporting surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub cached_attendees: usize,
    pub pending_responses: usize,
    pub merged_responses: usize,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Everything a reporting surface renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub summary: DashboardSummary,
    pub stats: ResponseStats,
    pub entries: Vec<ViewEntry>,
}

/// Build a report from local state plus, when online, recent remote responses.
///
/// Remote failures degrade to a local-only view; local storage failures are errors.
pub async fn load_report<S, R>(store: &S, remote: &R, online: bool, limit: usize) -> Result<Report>
where
    S: LocalStore,
    R: RemoteClient,
{
    let pending = store.list_pending_responses().await?;
    let remote_responses = if online {
        remote.fetch_recent_responses(limit).await
    } else {
        Vec::new()
    };

    let entries = build_view(&remote_responses, &pending);
    let summary = DashboardSummary {
        cached_attendees: store.count_attendees().await?,
        pending_responses: pending.len(),
        merged_responses: entries.len(),
        last_refresh: store.last_attendee_refresh().await?,
    };
    tracing::debug!(
        "Report built from {} remote and {} pending responses",
        remote_responses.len(),
        pending.len()
    );

    Ok(Report {
        summary,
        stats: ResponseStats::from_view(&entries),
        entries,
    })
}
