//! Google Calendar API v3 — upcoming-event listing.
//!
//! Used for the primary calendar (correlation context) and any configured
//! secondary calendars (direct task candidates). Handles pagination and
//! filters cancelled events.

use chrono::Utc;
use serde::Deserialize;

use super::{check_status, send_with_retry, RetryPolicy};
use crate::error::AgentError;
use crate::types::CalendarEvent;

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<GoogleEventRaw>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventRaw {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    start: Option<EventDateTime>,
    organizer: Option<Organizer>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organizer {
    #[serde(default)]
    email: String,
}

// ============================================================================
// Calendar API
// ============================================================================

/// Fetch upcoming events for a calendar within the lookahead window.
pub async fn fetch_events(
    client: &reqwest::Client,
    access_token: &str,
    calendar_id: &str,
    days_ahead: u32,
) -> Result<Vec<CalendarEvent>, AgentError> {
    let now = Utc::now();
    let time_min = now.to_rfc3339();
    let time_max = (now + chrono::Duration::days(days_ahead as i64)).to_rfc3339();

    let url = format!(
        "https://www.googleapis.com/calendar/v3/calendars/{}/events",
        urlencode(calendar_id)
    );

    let mut all_events = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = client.get(&url).bearer_auth(access_token).query(&[
            ("timeMin", time_min.as_str()),
            ("timeMax", time_max.as_str()),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
            ("maxResults", "250"),
        ]);

        if let Some(ref token) = page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let resp = send_with_retry(request, &RetryPolicy::default()).await?;
        let resp = check_status(resp).await?;

        let body: EventListResponse = resp.json().await?;

        for item in body.items {
            if item.status.as_deref() == Some("cancelled") {
                continue;
            }
            let start = item
                .start
                .and_then(|s| s.date_time.or(s.date))
                .unwrap_or_default();
            all_events.push(CalendarEvent {
                id: item.id,
                summary: item.summary.unwrap_or_default(),
                start,
                organizer: item.organizer.map(|o| o.email).unwrap_or_default(),
                description: item.description.unwrap_or_default(),
            });
        }

        page_token = body.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    Ok(all_events)
}

/// Percent-encode a calendar id for use as a path segment. Calendar ids are
/// email-like; only '@' and a few separators need escaping.
fn urlencode(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
