//! Runtime configuration for the check-in engine.
//!
//! Remote credentials come from the environment; resolution timings have
//! defaults that tests and clients may shrink.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::{normalize_base_url, normalize_text_option};

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";

const DEFAULT_INITIAL_SYNC_WAIT_MS: u64 = 3_000;
const DEFAULT_REARM_DELAY_MS: u64 = 1_200;
const DEFAULT_SUBMIT_REARM_DELAY_MS: u64 = 400;

/// Credentials for the authoritative remote store.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Project base URL, without trailing slash
    pub url: String,
    /// Public anon key sent as `apikey` and bearer token
    pub anon_key: String,
}

impl RemoteConfig {
    /// Build a validated config from explicit values.
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::InvalidInput(format!("{ENV_SUPABASE_URL} must not be empty")));
        }
        let url = normalize_base_url(&url).ok_or_else(|| {
            Error::InvalidInput(format!("{ENV_SUPABASE_URL} must include http:// or https://"))
        })?;
        let anon_key = normalize_text_option(Some(anon_key.into())).ok_or_else(|| {
            Error::InvalidInput(format!("{ENV_SUPABASE_ANON_KEY} must not be empty"))
        })?;

        Ok(Self { url, anon_key })
    }

    /// Load remote configuration from environment variables.
    ///
    /// Returns `Ok(None)` when neither variable is set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// PostgREST root for this project.
    #[must_use]
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<RemoteConfig>> {
    let url = normalize_text_option(lookup(ENV_SUPABASE_URL));
    let anon_key = normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY));

    match (url, anon_key) {
        (None, None) => Ok(None),
        (Some(url), Some(anon_key)) => RemoteConfig::new(url, anon_key).map(Some),
        (None, Some(_)) => Err(Error::InvalidInput(format!(
            "Remote configuration is incomplete. Missing: {ENV_SUPABASE_URL}"
        ))),
        (Some(_), None) => Err(Error::InvalidInput(format!(
            "Remote configuration is incomplete. Missing: {ENV_SUPABASE_ANON_KEY}"
        ))),
    }
}

/// Timings of one scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionConfig {
    /// Longest wait on the start-up attendee refresh after a cache miss
    pub initial_sync_wait: Duration,
    /// Pause after a not-found result before scanning re-arms
    pub rearm_delay: Duration,
    /// Pause after a submission before scanning re-arms
    pub submit_rearm_delay: Duration,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            initial_sync_wait: Duration::from_millis(DEFAULT_INITIAL_SYNC_WAIT_MS),
            rearm_delay: Duration::from_millis(DEFAULT_REARM_DELAY_MS),
            submit_rearm_delay: Duration::from_millis(DEFAULT_SUBMIT_REARM_DELAY_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<RemoteConfig>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn parse_config_none_returns_none() {
        let map = HashMap::new();
        assert!(parse_from_map(&map).unwrap().is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let mut map = HashMap::new();
        map.insert(ENV_SUPABASE_URL, "  ");
        map.insert(ENV_SUPABASE_ANON_KEY, "");
        assert!(parse_from_map(&map).unwrap().is_none());
    }

    #[test]
    fn parse_config_rejects_partial_values() {
        let mut map = HashMap::new();
        map.insert(ENV_SUPABASE_URL, "https://demo.supabase.co");

        match parse_from_map(&map).unwrap_err() {
            Error::InvalidInput(message) => assert!(message.contains(ENV_SUPABASE_ANON_KEY)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_config_normalizes_url() {
        let mut map = HashMap::new();
        map.insert(ENV_SUPABASE_URL, " https://demo.supabase.co/ ");
        map.insert(ENV_SUPABASE_ANON_KEY, "anon");

        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(config.url, "https://demo.supabase.co");
        assert_eq!(config.rest_url(), "https://demo.supabase.co/rest/v1");
    }

    #[test]
    fn parse_config_rejects_url_without_scheme() {
        let mut map = HashMap::new();
        map.insert(ENV_SUPABASE_URL, "demo.supabase.co");
        map.insert(ENV_SUPABASE_ANON_KEY, "anon");

        assert!(matches!(
            parse_from_map(&map),
            Err(Error::InvalidInput(message)) if message.contains("http")
        ));
    }

    #[test]
    fn debug_redacts_anon_key() {
        let config = RemoteConfig::new("https://demo.supabase.co", "secret-anon").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-anon"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn resolution_defaults_match_kiosk_timings() {
        let config = ResolutionConfig::default();
        assert_eq!(config.initial_sync_wait, Duration::from_millis(3_000));
        assert_eq!(config.rearm_delay, Duration::from_millis(1_200));
        assert_eq!(config.submit_rearm_delay, Duration::from_millis(400));
    }
}
