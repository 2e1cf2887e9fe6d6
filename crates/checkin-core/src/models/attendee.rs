//! Attendee model and identifier normalization

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Query parameter carrying the identifier when a badge encodes a URL.
const TOKEN_QUERY_PARAM: &str = "token";

/// The normalized natural key of an attendee.
///
/// Always trimmed and upper-cased, so `" t0001"` and `"T0001"` name the same
/// attendee at every boundary (scan decode, cache lookup, remote query).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Normalize raw text into an identifier, rejecting blank input.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_identifier(raw);
        if normalized.is_empty() {
            return Err(Error::InvalidInput("identifier must not be empty".into()));
        }
        Ok(Self(normalized))
    }

    /// Normalize the text produced by the code decoder.
    ///
    /// A payload that parses as a URL with a `token` query parameter yields
    /// that parameter; anything else is used verbatim.
    pub fn from_scan(decoded: &str) -> Result<Self> {
        Self::parse(&extract_scan_payload(decoded))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trim and upper-case an identifier candidate.
#[must_use]
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Pull the identifier text out of a decoded scan payload.
#[must_use]
pub fn extract_scan_payload(decoded: &str) -> Cow<'_, str> {
    if let Ok(url) = Url::parse(decoded) {
        let token = url
            .query_pairs()
            .find(|(key, value)| key == TOKEN_QUERY_PARAM && !value.is_empty())
            .map(|(_, value)| value.into_owned());
        if let Some(token) = token {
            return Cow::Owned(token);
        }
    }
    Cow::Borrowed(decoded)
}

/// An attendee record as cached locally and served by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Natural key
    pub identifier: Identifier,
    /// Name shown on the survey form
    pub display_name: String,
    /// Contact phone number
    pub phone: String,
    /// Optional contact email
    pub email: Option<String>,
}

impl Attendee {
    #[must_use]
    pub fn new(
        identifier: Identifier,
        display_name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            display_name: display_name.into(),
            phone: phone.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
