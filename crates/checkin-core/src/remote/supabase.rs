//! Supabase PostgREST implementation of the remote client.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};

use super::{InsertOutcome, RemoteClient, RemoteError, RemoteResult};
use crate::config::RemoteConfig;
use crate::models::{Attendee, Identifier, PendingResponse, RemoteResponse, SubmissionId};
use crate::util::compact_text;

const PARTICIPANTS_TABLE: &str = "participants";
const RESPONSES_TABLE: &str = "responses";
const PARTICIPANT_COLUMNS: &str = "token,nombre,celular,email";
const RESPONSE_COLUMNS: &str = "offline_id,token,nombre,celular,interes,desarrollo,device_ts,created_at";
const UNIQUE_VIOLATION_CODE: &str = "23505";
const PAGE_SIZE: usize = 1_000;
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// PostgREST-backed client for the `participants` and `responses` tables.
#[derive(Clone)]
pub struct SupabaseRemoteClient {
    rest_url: String,
    anon_key: String,
    client: Client,
}

impl std::fmt::Debug for SupabaseRemoteClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseRemoteClient")
            .field("rest_url", &self.rest_url)
            .finish_non_exhaustive()
    }
}

impl SupabaseRemoteClient {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| RemoteError::InvalidConfiguration(error.to_string()))?;

        Ok(Self {
            rest_url: config.rest_url(),
            anon_key: config.anon_key.clone(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| RemoteError::Unavailable(error.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Unavailable(parse_api_error(status, &body)))
    }

    async fn fetch_attendee_page(&self, offset: usize) -> RemoteResult<Vec<Attendee>> {
        let request = self.client.get(self.table_url(PARTICIPANTS_TABLE)).query(&[
            ("select", PARTICIPANT_COLUMNS.to_string()),
            ("order", "token.asc".to_string()),
            ("limit", PAGE_SIZE.to_string()),
            ("offset", offset.to_string()),
        ]);
        let rows = self
            .send(request)
            .await?
            .json::<Vec<ParticipantRow>>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        Ok(into_attendees(rows))
    }
}

impl RemoteClient for SupabaseRemoteClient {
    async fn fetch_attendee(&self, identifier: &Identifier) -> RemoteResult<Option<Attendee>> {
        let request = self.client.get(self.table_url(PARTICIPANTS_TABLE)).query(&[
            ("select", PARTICIPANT_COLUMNS.to_string()),
            ("token", format!("eq.{identifier}")),
            ("limit", "1".to_string()),
        ]);
        let rows = self
            .send(request)
            .await?
            .json::<Vec<ParticipantRow>>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;

        Ok(into_attendees(rows).into_iter().next())
    }

    async fn fetch_all_attendees(&self) -> RemoteResult<Vec<Attendee>> {
        let mut attendees = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_attendee_page(offset).await?;
            let fetched = page.len();
            attendees.extend(page);
            if fetched < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        tracing::debug!("Fetched {} attendees from remote store", attendees.len());
        Ok(attendees)
    }

    async fn insert_response(&self, response: &PendingResponse) -> RemoteResult<InsertOutcome> {
        let request = self
            .authorized(self.client.post(self.table_url(RESPONSES_TABLE)))
            .header("Prefer", "return=minimal")
            .json(&[NewResponseRow::from(response)]);

        let reply = request
            .send()
            .await
            .map_err(|error| RemoteError::Unavailable(error.to_string()))?;

        if reply.status().is_success() {
            return Ok(InsertOutcome::Inserted);
        }

        let status = reply.status();
        let body = reply.text().await.unwrap_or_default();
        classify_insert_failure(status, &body)
    }

    async fn fetch_recent_responses(&self, limit: usize) -> Vec<RemoteResponse> {
        let request = self.client.get(self.table_url(RESPONSES_TABLE)).query(&[
            ("select", RESPONSE_COLUMNS.to_string()),
            ("order", "device_ts.desc".to_string()),
            ("limit", limit.to_string()),
        ]);

        let rows = match self.send(request).await {
            Ok(reply) => reply.json::<Vec<ResponseRow>>().await,
            Err(error) => {
                tracing::warn!("Failed to fetch recent responses: {}", error);
                return Vec::new();
            }
        };

        match rows {
            Ok(rows) => rows
                .into_iter()
                .filter_map(ResponseRow::into_remote_response)
                .collect(),
            Err(error) => {
                tracing::warn!("Recent responses payload was not readable: {}", error);
                Vec::new()
            }
        }
    }

    async fn is_reachable(&self) -> bool {
        let request = self
            .client
            .get(self.table_url(PARTICIPANTS_TABLE))
            .query(&[("select", "token"), ("limit", "1")]);
        self.send(request).await.is_ok()
    }
}

/// Map a rejected insert to `Conflict` when the row already exists remotely.
fn classify_insert_failure(
    status: StatusCode,
    body: &str,
) -> RemoteResult<InsertOutcome> {
    if status == StatusCode::CONFLICT {
        return Ok(InsertOutcome::Conflict);
    }

    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        let is_unique_violation = payload.code.as_deref() == Some(UNIQUE_VIOLATION_CODE);
        let mentions_duplicate = [payload.details.as_deref(), payload.message.as_deref()]
            .into_iter()
            .flatten()
            .any(|text| text.to_ascii_lowercase().contains("duplicate"));
        if is_unique_violation || mentions_duplicate {
            return Ok(InsertOutcome::Conflict);
        }
    }

    Err(RemoteError::Unavailable(parse_api_error(status, body)))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.details).or(payload.hint) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn into_attendees(rows: Vec<ParticipantRow>) -> Vec<Attendee> {
    rows.into_iter()
        .filter_map(ParticipantRow::into_attendee)
        .collect()
}

/// Parse a PostgREST timestamp, treating zone-less values as UTC.
fn parse_remote_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Accept text columns that some rows store as numbers (phone numbers mostly).
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct ParticipantRow {
    #[serde(default, deserialize_with = "text_or_number")]
    token: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    nombre: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    celular: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    email: Option<String>,
}

impl ParticipantRow {
    fn into_attendee(self) -> Option<Attendee> {
        let raw_token = self.token.unwrap_or_default();
        let Ok(identifier) = Identifier::parse(&raw_token) else {
            tracing::warn!("Skipping participant row without a token");
            return None;
        };

        let mut attendee = Attendee::new(
            identifier,
            self.nombre.unwrap_or_default().trim(),
            self.celular.unwrap_or_default().trim(),
        );
        attendee.email = crate::util::normalize_text_option(self.email);
        Some(attendee)
    }
}

#[derive(Debug, Deserialize)]
struct ResponseRow {
    #[serde(default)]
    offline_id: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    token: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    nombre: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    celular: Option<String>,
    #[serde(default)]
    interes: Option<String>,
    #[serde(default)]
    desarrollo: Option<String>,
    #[serde(default)]
    device_ts: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl ResponseRow {
    fn into_remote_response(self) -> Option<RemoteResponse> {
        let identifier = Identifier::parse(self.token.as_deref().unwrap_or_default()).ok()?;
        let recorded_at = self
            .device_ts
            .as_deref()
            .and_then(parse_remote_timestamp)
            .or_else(|| self.created_at.as_deref().and_then(parse_remote_timestamp));

        Some(RemoteResponse {
            submission_id: self
                .offline_id
                .and_then(|raw| SubmissionId::from_existing(raw).ok()),
            identifier,
            display_name: self.nombre.unwrap_or_default(),
            phone: self.celular.unwrap_or_default(),
            answer1: self.interes.unwrap_or_default(),
            answer2: self.desarrollo.unwrap_or_default(),
            recorded_at,
        })
    }
}

#[derive(Debug, Serialize)]
struct NewResponseRow<'a> {
    offline_id: &'a str,
    token: &'a str,
    nombre: &'a str,
    celular: &'a str,
    interes: &'a str,
    desarrollo: &'a str,
    device_ts: String,
}

impl<'a> From<&'a PendingResponse> for NewResponseRow<'a> {
    fn from(value: &'a PendingResponse) -> Self {
        Self {
            offline_id: value.submission_id.as_str(),
            token: value.identifier.as_str(),
            nombre: &value.display_name,
            celular: &value.phone,
            interes: &value.answer1,
            desarrollo: &value.answer2,
            device_ts: value
                .submitted_at_local
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    code: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    message: Option<String>,
}
