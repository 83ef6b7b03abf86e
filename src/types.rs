//! Core data model for the triage pipeline.
//!
//! Everything here is run-scoped: collected source records, extracted action
//! items, reconciliation verdicts, and the run summary. The only cross-run
//! entity is `RunState` (see `state`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Collected context
// ============================================================================

/// Where a collected record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Inbox,
    Starred,
    MeetingNote,
    SecondaryCalendar,
}

/// A raw message or event gathered by the context collector.
///
/// `source_ref` is the stable backend identifier (Gmail message id or
/// calendar event id) and is what the processed-state and duplicate
/// detection key on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub source_ref: String,
    pub kind: RecordKind,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    /// RFC 2822 / RFC 3339 timestamp as reported by the backend.
    #[serde(default)]
    pub received_at: String,
    #[serde(default)]
    pub body: String,
}

/// An upcoming calendar event, used as correlation context for extraction
/// (meeting prep, deadlines) rather than as a candidate source — except for
/// secondary calendars, where events become first-class candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    /// Event start, RFC 3339 (or YYYY-MM-DD for all-day events).
    pub start: String,
    #[serde(default)]
    pub organizer: String,
    #[serde(default)]
    pub description: String,
}

// ============================================================================
// Extracted action items
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Short badge used in the action log and notifications.
    pub fn badge(&self) -> &'static str {
        match self {
            Priority::High => "[!]",
            Priority::Medium => "[~]",
            Priority::Low => "[.]",
        }
    }
}

/// Category tag assigned during extraction. Drives the creation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Ordinary inbox mail with an action.
    Email,
    /// Mail from a configured escalation sender (HR, legal, finance, ...).
    EscalationSender,
    /// Carries an explicit deadline.
    Deadline,
    /// User-starred mail — always actionable.
    Starred,
    /// Assigned to the user in AI meeting notes.
    MeetingNote,
    /// Preparation for an upcoming calendar event.
    CalendarPrep,
    /// Expense requiring the user's approval.
    ExpenseApproval,
    /// Event from a secondary calendar configured for direct task creation.
    SecondaryCalendar,
}

impl Category {
    pub fn badge(&self) -> &'static str {
        match self {
            Category::MeetingNote => "[notes]",
            Category::CalendarPrep | Category::SecondaryCalendar => "[cal]",
            Category::Starred => "[star]",
            _ => "[mail]",
        }
    }
}

/// A candidate actionable item produced by the extraction session.
///
/// Invariant: `source_ref` is non-empty — validation drops engine output
/// without one, since duplicate detection depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub source_ref: String,
    pub title: String,
    #[serde(default)]
    pub detail: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    pub category: Category,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    /// Title of the correlated calendar event, when the item relates to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_event: Option<String>,
}

// ============================================================================
// Existing tasks + reconciliation verdicts
// ============================================================================

/// Snapshot of an open task already present in the destination list.
/// Read-only within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingTask {
    pub id: String,
    pub title: String,
    /// Free-text notes; may embed a `Source: <ref>` line from a prior run.
    #[serde(default)]
    pub notes: String,
}

/// Fields for a task creation call.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub notes: String,
    pub due: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Create,
    SkipDuplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    /// An existing task's notes contain the candidate's source reference.
    SourceRef,
    /// Normalized titles overlap beyond the similarity threshold.
    TitleOverlap,
}

/// Per-candidate reconciliation outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub item: ActionItem,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<MatchReason>,
}

// ============================================================================
// Run summary
// ============================================================================

/// Outcome of one dispatched (or skipped) item, for the log and notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub title: String,
    pub reason: String,
    pub item: ActionItem,
}

/// Counts and per-item detail for a single run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub dry_run: bool,
    pub scanned: usize,
    pub extracted: usize,
    pub created: Vec<ItemOutcome>,
    pub duplicates: Vec<ItemOutcome>,
    pub failed: Vec<ItemOutcome>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            dry_run,
            scanned: 0,
            extracted: 0,
            created: Vec::new(),
            duplicates: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
