//! Google Tasks API v1 — open-task listing and task creation.
//!
//! The only mutating surface of the whole pipeline. Listing is paginated
//! with completed tasks excluded; creation sends title, notes, and an
//! optional all-day due date.

use serde::Deserialize;

use super::{check_status, send_with_retry, RetryPolicy};
use crate::error::AgentError;
use crate::types::{ExistingTask, TaskDraft};

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskListResponse {
    #[serde(default)]
    items: Vec<TaskRaw>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRaw {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskListsResponse {
    #[serde(default)]
    items: Vec<TaskListEntry>,
}

#[derive(Debug, Deserialize)]
struct TaskListEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
}

// ============================================================================
// Tasks API
// ============================================================================

/// All open (needsAction) tasks in a list.
pub async fn list_open_tasks(
    client: &reqwest::Client,
    access_token: &str,
    list_id: &str,
) -> Result<Vec<ExistingTask>, AgentError> {
    let url = format!(
        "https://tasks.googleapis.com/tasks/v1/lists/{}/tasks",
        list_id
    );

    let mut tasks = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = client.get(&url).bearer_auth(access_token).query(&[
            ("showCompleted", "false"),
            ("showHidden", "false"),
            ("maxResults", "100"),
        ]);
        if let Some(ref token) = page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let resp = send_with_retry(request, &RetryPolicy::default()).await?;
        let resp = check_status(resp).await?;

        let body: TaskListResponse = resp.json().await?;
        for item in body.items {
            // showCompleted=false already excludes these; belt and braces
            // since the status field is authoritative.
            if item.status.as_deref() == Some("completed") {
                continue;
            }
            tasks.push(ExistingTask {
                id: item.id,
                title: item.title,
                notes: item.notes.unwrap_or_default(),
            });
        }

        page_token = body.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    Ok(tasks)
}

/// Create a task and return its id.
pub async fn create_task(
    client: &reqwest::Client,
    access_token: &str,
    list_id: &str,
    draft: &TaskDraft,
) -> Result<String, AgentError> {
    let url = format!(
        "https://tasks.googleapis.com/tasks/v1/lists/{}/tasks",
        list_id
    );

    let mut body = serde_json::json!({
        "title": draft.title,
        "notes": draft.notes,
    });
    if let Some(due) = draft.due {
        // Tasks only keeps the date portion; time is ignored by the API.
        body["due"] = serde_json::json!(format!("{}T00:00:00.000Z", due));
    }

    let resp = send_with_retry(
        client.post(&url).bearer_auth(access_token).json(&body),
        &RetryPolicy::default(),
    )
    .await?;
    let resp = check_status(resp).await?;

    let created: TaskRaw = resp.json().await?;
    Ok(created.id)
}

/// Resolve a task list id by display name. Used when the config names a
/// list but does not pin its id.
pub async fn resolve_list_id(
    client: &reqwest::Client,
    access_token: &str,
    list_name: &str,
) -> Result<String, AgentError> {
    let resp = send_with_retry(
        client
            .get("https://tasks.googleapis.com/tasks/v1/users/@me/lists")
            .bearer_auth(access_token)
            .query(&[("maxResults", "100")]),
        &RetryPolicy::default(),
    )
    .await?;
    let resp = check_status(resp).await?;

    let body: TaskListsResponse = resp.json().await?;
    body.items
        .into_iter()
        .find(|l| l.title == list_name)
        .map(|l| l.id)
        .ok_or_else(|| AgentError::Config(format!("task list \"{}\" not found", list_name)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_list_deserialization() {
        let json = r#"{
            "items": [
                {"id": "t1", "title": "Review budget", "notes": "Source: msg-42", "status": "needsAction"},
                {"id": "t2", "title": "Old task", "status": "completed"}
            ]
        }"#;
        let resp: TaskListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.items.len(), 2);
        assert_eq!(resp.items[0].notes.as_deref(), Some("Source: msg-42"));
        assert_eq!(resp.items[1].status.as_deref(), Some("completed"));
    }

    #[test]
    fn test_task_without_notes() {
        let json = r#"{"items": [{"id": "t3", "title": "Bare"}]}"#;
        let resp: TaskListResponse = serde_json::from_str(json).unwrap();
        assert!(resp.items[0].notes.is_none());
    }

    #[test]
    fn test_tasklists_deserialization() {
        let json = r#"{
            "items": [
                {"id": "list-1", "title": "My Tasks"},
                {"id": "list-2", "title": "Work Tasks"}
            ]
        }"#;
        let resp: TaskListsResponse = serde_json::from_str(json).unwrap();
        let found = resp.items.iter().find(|l| l.title == "Work Tasks").unwrap();
        assert_eq!(found.id, "list-2");
    }

    #[test]
    fn test_due_date_format() {
        let due = chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        assert_eq!(
            format!("{}T00:00:00.000Z", due),
            "2026-09-01T00:00:00.000Z"
        );
    }
}
