//! Unified, deduplicated picture of every response recorded so far.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Identifier, PendingResponse, RemoteResponse, SubmissionId};

/// Where a view entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Confirmed by the remote store
    Remote,
    /// Still queued locally
    Local,
}

impl Origin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

/// One row of the merged view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEntry {
    pub identifier: Identifier,
    pub submission_id: Option<SubmissionId>,
    pub display_name: String,
    pub phone: String,
    pub answer1: String,
    pub answer2: String,
    /// Remote-assigned timestamp, or local submission time for queued rows
    pub timestamp: Option<DateTime<Utc>>,
    pub origin: Origin,
}

impl From<&RemoteResponse> for ViewEntry {
    fn from(value: &RemoteResponse) -> Self {
        Self {
            identifier: value.identifier.clone(),
            submission_id: value.submission_id.clone(),
            display_name: value.display_name.clone(),
            phone: value.phone.clone(),
            answer1: value.answer1.clone(),
            answer2: value.answer2.clone(),
            timestamp: value.recorded_at,
            origin: Origin::Remote,
        }
    }
}

impl From<&PendingResponse> for ViewEntry {
    fn from(value: &PendingResponse) -> Self {
        Self {
            identifier: value.identifier.clone(),
            submission_id: Some(value.submission_id.clone()),
            display_name: value.display_name.clone(),
            phone: value.phone.clone(),
            answer1: value.answer1.clone(),
            answer2: value.answer2.clone(),
            timestamp: Some(value.submitted_at_local),
            origin: Origin::Local,
        }
    }
}

/// Merge remote and queued responses into one list, newest first.
///
/// Keyed by identifier: the first remote row for an identifier wins and a
/// queued row only appears when no remote row shares its identifier. Rows
/// without a timestamp sort last.
#[must_use]
pub fn build_view(remote: &[RemoteResponse], pending: &[PendingResponse]) -> Vec<ViewEntry> {
    let mut by_identifier: HashMap<&Identifier, ViewEntry> =
        HashMap::with_capacity(remote.len() + pending.len());

    for response in remote {
        by_identifier
            .entry(&response.identifier)
            .or_insert_with(|| ViewEntry::from(response));
    }
    for response in pending {
        by_identifier
            .entry(&response.identifier)
            .or_insert_with(|| ViewEntry::from(response));
    }

    let mut entries: Vec<ViewEntry> = by_identifier.into_values().collect();
    entries.sort_by(compare_newest_first);
    entries
}

fn compare_newest_first(a: &ViewEntry, b: &ViewEntry) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(a_ts), Some(b_ts)) => b_ts.cmp(&a_ts),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.identifier.cmp(&b.identifier))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{Attendee, SurveyAnswers};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn remote(id: &str, answer1: &str, recorded_at: Option<DateTime<Utc>>) -> RemoteResponse {
        RemoteResponse {
            submission_id: None,
            identifier: Identifier::parse(id).unwrap(),
            display_name: "Remote".into(),
            phone: "555-0100".into(),
            answer1: answer1.into(),
            answer2: "no".into(),
            recorded_at,
        }
    }

    fn pending(id: &str, answer1: &str, submitted: DateTime<Utc>) -> PendingResponse {
        let attendee = Attendee::new(Identifier::parse(id).unwrap(), "Local", "555-0101");
        PendingResponse::new(
            &attendee,
            "Local",
            "555-0101",
            SurveyAnswers::new(answer1, "no").unwrap(),
            submitted,
        )
    }

    fn ids(entries: &[ViewEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.identifier.as_str()).collect()
    }

    #[test]
    fn remote_shadows_local_with_same_identifier() {
        let view = build_view(
            &[remote("T0001", "si", Some(at(0)))],
            &[pending("t0001", "no", at(60))],
        );

        assert_eq!(view.len(), 1);
        assert_eq!(view[0].origin, Origin::Remote);
        assert_eq!(view[0].answer1, "si");
    }

    #[test]
    fn pending_only_entries_are_marked_local() {
        let view = build_view(&[], &[pending("T9999", "si", at(0))]);

        assert_eq!(view.len(), 1);
        assert_eq!(view[0].origin, Origin::Local);
        assert_eq!(view[0].timestamp, Some(at(0)));
    }

    #[test]
    fn entries_sort_newest_first_with_missing_timestamps_last() {
        let view = build_view(
            &[
                remote("T0001", "si", Some(at(10))),
                remote("T0002", "si", None),
                remote("T0003", "si", Some(at(30))),
            ],
            &[pending("T0004", "si", at(20))],
        );

        assert_eq!(ids(&view), vec!["T0003", "T0004", "T0001", "T0002"]);
    }

    #[test]
    fn first_remote_row_wins_for_repeated_identifier() {
        let view = build_view(
            &[
                remote("T0001", "si", Some(at(20))),
                remote("T0001", "no", Some(at(10))),
            ],
            &[],
        );

        assert_eq!(view.len(), 1);
        assert_eq!(view[0].answer1, "si");
    }

    #[test]
    fn empty_inputs_give_empty_view() {
        assert!(build_view(&[], &[]).is_empty());
    }

    #[test]
    fn origin_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Origin::Local).unwrap(), "\"local\"");
        assert_eq!(Origin::Remote.as_str(), "remote");
    }
}
