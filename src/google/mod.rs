//! Native Google API client: direct HTTP via reqwest.
//!
//! Token format is compatible with ~/.tasktriage/google/token.json as
//! written by Google's Python OAuth library, so an existing token can be
//! dropped in place.
//!
//! Modules:
//! - gmail: Gmail API v1 message search
//! - calendar: Google Calendar API v3 event listing
//! - tasks: Google Tasks API v1 list/insert

pub mod calendar;
pub mod gmail;
pub mod tasks;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::AgentError;
use crate::sources::{ContextSource, TaskBackend};
use crate::types::{CalendarEvent, ExistingTask, SourceRecord, TaskDraft};

/// OAuth2 scopes the triage run needs. Read-only except for Tasks.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/tasks",
];

// ============================================================================
// Token types — compatible with Python's google-auth token format
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleToken {
    /// The access token (Python writes this as "token").
    #[serde(alias = "access_token")]
    pub token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Token expiry time (ISO 8601).
    #[serde(default)]
    pub expiry: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

pub fn load_token(path: &PathBuf) -> Result<GoogleToken, AgentError> {
    if !path.exists() {
        return Err(AgentError::TokenNotFound(path.clone()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save_token(path: &PathBuf, token: &GoogleToken) -> Result<(), AgentError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(token)?;
    std::fs::write(path, json)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Expired if within 60 seconds of the recorded expiry, or if the expiry
/// is missing or unparseable.
pub fn is_token_expired(token: &GoogleToken) -> bool {
    match &token.expiry {
        None => true,
        Some(expiry_str) => {
            match chrono::DateTime::parse_from_rfc3339(&expiry_str.replace('Z', "+00:00"))
                .or_else(|_| chrono::DateTime::parse_from_rfc3339(expiry_str))
            {
                Ok(expiry) => expiry <= chrono::Utc::now() + chrono::Duration::seconds(60),
                Err(_) => true,
            }
        }
    }
}

async fn refresh_access_token(
    http: &reqwest::Client,
    path: &PathBuf,
    token: &GoogleToken,
) -> Result<GoogleToken, AgentError> {
    let refresh_token = token.refresh_token.as_ref().ok_or(AgentError::AuthExpired)?;

    let mut form = vec![
        ("client_id", token.client_id.as_str()),
        ("refresh_token", refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];
    if let Some(secret) = token.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }

    let resp = http.post(&token.token_uri).form(&form).send().await?;
    let status = resp.status();
    let body_text = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        let lowered = body_text.to_lowercase();
        if (status.as_u16() == 400 || status.as_u16() == 401)
            && (lowered.contains("invalid_grant") || lowered.contains("token has been expired"))
        {
            return Err(AgentError::AuthExpired);
        }
        return Err(AgentError::RefreshFailed(format!(
            "HTTP {}: {}",
            status, body_text
        )));
    }

    let body: serde_json::Value = serde_json::from_str(&body_text)?;
    let access_token = body["access_token"]
        .as_str()
        .ok_or_else(|| AgentError::RefreshFailed("no access_token in response".into()))?;
    let expires_in = body["expires_in"].as_u64().unwrap_or(3600);
    let expiry = chrono::Utc::now() + chrono::Duration::seconds(expires_in as i64);

    let mut new_token = token.clone();
    new_token.token = access_token.to_string();
    new_token.expiry = Some(expiry.to_rfc3339());

    save_token(path, &new_token)?;
    Ok(new_token)
}

// ============================================================================
// Retry policy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(value) = retry_after.and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Duration::from_secs(secs.min(30));
        }
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

/// Send a request, retrying transient failures (429/408/5xx and transport
/// errors) with exponential backoff. Honors Retry-After when present.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, AgentError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(AgentError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "google api retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                if (err.is_timeout() || err.is_connect()) && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "google api retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(AgentError::Http(err));
            }
        }
    }

    Err(AgentError::RateLimit)
}

/// Map a completed response to our error taxonomy: 401 means the token is
/// dead even after refresh, everything else non-success is an API error.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AgentError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(AgentError::AuthExpired);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(AgentError::RateLimit);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AgentError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp)
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated Google client backing both collaborator traits.
///
/// The access token is cached per-process and refreshed lazily; concurrent
/// refreshes are serialized by the token mutex.
pub struct GoogleClient {
    http: reqwest::Client,
    token_path: PathBuf,
    cached: Mutex<Option<GoogleToken>>,
    meeting_notes_sender: String,
}

impl GoogleClient {
    pub fn new(config: &Config, token_path: PathBuf) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_path,
            cached: Mutex::new(None),
            meeting_notes_sender: config.meeting_notes_sender.clone(),
        }
    }

    /// A valid access token, refreshing through the OAuth endpoint when the
    /// cached one is expired.
    pub async fn access_token(&self) -> Result<String, AgentError> {
        let mut cached = self.cached.lock().await;

        let token = match cached.take() {
            Some(t) => t,
            None => load_token(&self.token_path)?,
        };

        let token = if is_token_expired(&token) {
            refresh_access_token(&self.http, &self.token_path, &token).await?
        } else {
            token
        };

        let access = token.token.clone();
        *cached = Some(token);
        Ok(access)
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

#[async_trait]
impl ContextSource for GoogleClient {
    async fn fetch_inbox(&self, limit: u32) -> Result<Vec<SourceRecord>, AgentError> {
        let token = self.access_token().await?;
        gmail::search_messages(
            &self.http,
            &token,
            "in:inbox",
            limit,
            crate::types::RecordKind::Inbox,
        )
        .await
    }

    async fn fetch_starred(&self, limit: u32) -> Result<Vec<SourceRecord>, AgentError> {
        let token = self.access_token().await?;
        gmail::search_messages(
            &self.http,
            &token,
            "is:starred",
            limit,
            crate::types::RecordKind::Starred,
        )
        .await
    }

    async fn fetch_meeting_notes(&self, limit: u32) -> Result<Vec<SourceRecord>, AgentError> {
        let token = self.access_token().await?;
        let query = format!("from:{}", self.meeting_notes_sender);
        gmail::search_messages(
            &self.http,
            &token,
            &query,
            limit,
            crate::types::RecordKind::MeetingNote,
        )
        .await
    }

    async fn fetch_calendar_events(
        &self,
        calendar_id: &str,
        days_ahead: u32,
    ) -> Result<Vec<CalendarEvent>, AgentError> {
        let token = self.access_token().await?;
        calendar::fetch_events(&self.http, &token, calendar_id, days_ahead).await
    }
}

#[async_trait]
impl TaskBackend for GoogleClient {
    async fn list_open_tasks(&self, list_id: &str) -> Result<Vec<ExistingTask>, AgentError> {
        let token = self.access_token().await?;
        tasks::list_open_tasks(&self.http, &token, list_id).await
    }

    async fn create_task(
        &self,
        list_id: &str,
        draft: &TaskDraft,
    ) -> Result<String, AgentError> {
        let token = self.access_token().await?;
        tasks::create_task(&self.http, &token, list_id, draft).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_token_python_compat() {
        // Simulates the JSON format Python's google-auth writes
        let python_json = r#"{
            "token": "ya29.python-token",
            "refresh_token": "1//python-refresh",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "client.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/gmail.readonly"],
            "expiry": "2026-02-08T12:00:00.000000Z",
            "account": "user@company.com"
        }"#;

        let token: GoogleToken = serde_json::from_str(python_json).unwrap();
        assert_eq!(token.token, "ya29.python-token");
        assert_eq!(token.refresh_token.as_deref(), Some("1//python-refresh"));
        assert_eq!(token.scopes.len(), 1);
    }

    #[test]
    fn test_google_token_access_token_alias() {
        let json = r#"{
            "access_token": "ya29.alias-token",
            "refresh_token": "1//refresh",
            "client_id": "client"
        }"#;
        let token: GoogleToken = serde_json::from_str(json).unwrap();
        assert_eq!(token.token, "ya29.alias-token");
        assert_eq!(token.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_is_token_expired_no_expiry() {
        let token = GoogleToken {
            token: "t".into(),
            refresh_token: None,
            token_uri: default_token_uri(),
            client_id: "c".into(),
            client_secret: None,
            scopes: vec![],
            expiry: None,
        };
        assert!(is_token_expired(&token));
    }

    #[test]
    fn test_is_token_expired_future_and_past() {
        let mut token = GoogleToken {
            token: "t".into(),
            refresh_token: None,
            token_uri: default_token_uri(),
            client_id: "c".into(),
            client_secret: None,
            scopes: vec![],
            expiry: Some((chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339()),
        };
        assert!(!is_token_expired(&token));

        token.expiry = Some((chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339());
        assert!(is_token_expired(&token));
    }

    #[test]
    fn test_missing_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        assert!(matches!(
            load_token(&path),
            Err(AgentError::TokenNotFound(_))
        ));
    }

    #[test]
    fn test_token_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("google").join("token.json");

        let token = GoogleToken {
            token: "ya29.x".into(),
            refresh_token: Some("1//y".into()),
            token_uri: default_token_uri(),
            client_id: "c".into(),
            client_secret: None,
            scopes: vec![],
            expiry: Some("2026-02-08T12:00:00Z".into()),
        };
        save_token(&path, &token).unwrap();

        let loaded = load_token(&path).unwrap();
        assert_eq!(loaded.token, "ya29.x");
        assert_eq!(loaded.refresh_token.as_deref(), Some("1//y"));
    }
}
