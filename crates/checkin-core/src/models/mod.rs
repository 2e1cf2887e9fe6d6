//! Data models for checkin

mod attendee;
mod response;

pub use attendee::{extract_scan_payload, normalize_identifier, Attendee, Identifier};
pub use response::{PendingResponse, RemoteResponse, SubmissionId, SurveyAnswers};
