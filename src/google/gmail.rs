//! Gmail API v1 — message search for the context collector.
//!
//! Lists message ids matching a query, then fetches metadata headers plus
//! the snippet for each. Individual message fetch failures are skipped so
//! one bad message never sinks the whole source.

use serde::Deserialize;

use super::{check_status, send_with_retry, RetryPolicy};
use crate::error::AgentError;
use crate::types::{RecordKind, SourceRecord};

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    #[serde(default)]
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

// ============================================================================
// Gmail API
// ============================================================================

/// Search for messages and return them as source records.
pub async fn search_messages(
    client: &reqwest::Client,
    access_token: &str,
    query: &str,
    max_results: u32,
    kind: RecordKind,
) -> Result<Vec<SourceRecord>, AgentError> {
    let resp = send_with_retry(
        client
            .get("https://gmail.googleapis.com/gmail/v1/users/me/messages")
            .bearer_auth(access_token)
            .query(&[("q", query), ("maxResults", &max_results.to_string())]),
        &RetryPolicy::default(),
    )
    .await?;
    let resp = check_status(resp).await?;

    let list: MessageListResponse = resp.json().await?;
    if list.messages.is_empty() {
        return Ok(Vec::new());
    }

    let mut records = Vec::with_capacity(list.messages.len());
    for stub in &list.messages {
        match fetch_message(client, access_token, &stub.id, kind).await {
            Ok(record) => records.push(record),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::debug!("Skipping message {}: {}", stub.id, e);
            }
        }
    }

    Ok(records)
}

/// Metadata headers plus snippet for a single message.
async fn fetch_message(
    client: &reqwest::Client,
    access_token: &str,
    message_id: &str,
    kind: RecordKind,
) -> Result<SourceRecord, AgentError> {
    let url = format!(
        "https://gmail.googleapis.com/gmail/v1/users/me/messages/{}",
        message_id
    );

    let resp = send_with_retry(
        client.get(&url).bearer_auth(access_token).query(&[
            ("format", "metadata"),
            ("metadataHeaders", "From"),
            ("metadataHeaders", "Subject"),
            ("metadataHeaders", "Date"),
        ]),
        &RetryPolicy::default(),
    )
    .await?;
    let resp = check_status(resp).await?;

    let detail: MessageDetail = resp.json().await?;

    let headers = detail
        .payload
        .as_ref()
        .map(|p| &p.headers[..])
        .unwrap_or(&[]);

    let get_header = |name: &str| -> String {
        headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    };

    Ok(SourceRecord {
        source_ref: detail.id,
        kind,
        sender: get_header("From"),
        subject: get_header("Subject"),
        received_at: get_header("Date"),
        body: detail.snippet,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_list_deserialization() {
        let json = r#"{
            "messages": [
                {"id": "msg1", "threadId": "thread1"},
                {"id": "msg2", "threadId": "thread2"}
            ],
            "nextPageToken": "token123"
        }"#;
        let resp: MessageListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.messages.len(), 2);
        assert_eq!(resp.messages[0].id, "msg1");
    }

    #[test]
    fn test_message_list_empty() {
        let json = r#"{"resultSizeEstimate": 0}"#;
        let resp: MessageListResponse = serde_json::from_str(json).unwrap();
        assert!(resp.messages.is_empty());
    }

    #[test]
    fn test_message_detail_deserialization() {
        let json = r#"{
            "id": "msg123",
            "threadId": "thread456",
            "snippet": "Can you review the attached budget...",
            "payload": {
                "headers": [
                    {"name": "From", "value": "Jane Doe <jane@corp.com>"},
                    {"name": "Subject", "value": "Q3 budget review"},
                    {"name": "Date", "value": "Sat, 8 Feb 2026 09:30:00 -0500"}
                ]
            }
        }"#;
        let detail: MessageDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.id, "msg123");
        let headers = detail.payload.unwrap().headers;
        let from = headers.iter().find(|h| h.name == "From").unwrap();
        assert_eq!(from.value, "Jane Doe <jane@corp.com>");
    }

    #[test]
    fn test_message_detail_no_payload() {
        let json = r#"{"id": "msg789", "snippet": ""}"#;
        let detail: MessageDetail = serde_json::from_str(json).unwrap();
        assert!(detail.payload.is_none());
    }
}
