//! Abstract collaborator contracts consumed by the pipeline.
//!
//! The Google REST implementations live in `google`; tests drive the
//! pipeline through in-memory stubs of these traits.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::types::{CalendarEvent, ExistingTask, SourceRecord, TaskDraft};

/// Read-only message/event source (inbox, starred mail, meeting notes,
/// calendars). Every record carries a stable identifier.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn fetch_inbox(&self, limit: u32) -> Result<Vec<SourceRecord>, AgentError>;

    async fn fetch_starred(&self, limit: u32) -> Result<Vec<SourceRecord>, AgentError>;

    async fn fetch_meeting_notes(&self, limit: u32) -> Result<Vec<SourceRecord>, AgentError>;

    /// Upcoming events for `calendar_id` within the lookahead window.
    async fn fetch_calendar_events(
        &self,
        calendar_id: &str,
        days_ahead: u32,
    ) -> Result<Vec<CalendarEvent>, AgentError>;
}

/// Destination task list. Retried creation after an ambiguous failure may
/// produce a duplicate; the next run's reconciliation suppresses it.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn list_open_tasks(&self, list_id: &str) -> Result<Vec<ExistingTask>, AgentError>;

    /// Creates a task and returns its backend id.
    async fn create_task(
        &self,
        list_id: &str,
        draft: &TaskDraft,
    ) -> Result<String, AgentError>;
}
