//! Effect dispatcher: turns CREATE verdicts into task-creation calls.
//!
//! Each creation is independent — a failure is caught, logged, and recorded
//! in the summary without blocking the remaining candidates. Dry-run
//! computes the same summary without touching the backend.

use crate::sources::TaskBackend;
use crate::types::{
    ActionItem, Category, Decision, ItemOutcome, Priority, RunSummary, TaskDraft, Verdict,
};

/// Whether a CREATE verdict meets the creation policy. Any one criterion
/// qualifies.
pub fn qualifies(item: &ActionItem) -> bool {
    item.priority == Priority::High
        || item.due.is_some()
        || matches!(
            item.category,
            Category::EscalationSender
                | Category::Deadline
                | Category::Starred
                | Category::MeetingNote
                | Category::CalendarPrep
                | Category::ExpenseApproval
                | Category::SecondaryCalendar
        )
}

/// Task notes embed the source reference so the next run's reconciliation
/// can match on it even after the title is edited.
pub fn format_task_notes(item: &ActionItem) -> String {
    let mut notes = format!("Source: {}", item.source_ref);
    if !item.subject.is_empty() {
        notes.push_str(&format!("\nSubject: {}", item.subject));
    }
    notes.push_str(&format!(
        "\nPriority: {}",
        serde_json::to_value(item.priority)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    ));
    if let Some(ref event) = item.related_event {
        notes.push_str(&format!("\nMeeting: {}", event));
    }
    if !item.detail.is_empty() {
        notes.push_str(&format!("\n\n{}", item.detail));
    }
    if item.category != Category::SecondaryCalendar {
        notes.push_str(&format!(
            "\n\nOpen email: https://mail.google.com/mail/u/0/#all/{}",
            item.source_ref
        ));
    }
    notes
}

/// Dispatch all verdicts, filling in the given summary.
pub async fn dispatch(
    backend: &dyn TaskBackend,
    list_id: &str,
    verdicts: &[Verdict],
    dry_run: bool,
    summary: &mut RunSummary,
) {
    for verdict in verdicts {
        let item = &verdict.item;

        match verdict.decision {
            Decision::SkipDuplicate => {
                let reason = match verdict.matched_task_id.as_deref() {
                    Some(id) => format!("duplicate of task {}", id),
                    None => "duplicate".to_string(),
                };
                log::info!("Skipping \"{}\": {}", item.title, reason);
                summary.duplicates.push(ItemOutcome {
                    title: item.title.clone(),
                    reason,
                    item: item.clone(),
                });
            }
            Decision::Create => {
                if !qualifies(item) {
                    log::debug!(
                        "\"{}\" does not meet the creation policy; not filing",
                        item.title
                    );
                    continue;
                }

                if dry_run {
                    log::info!("DRY RUN: would create \"{}\"", item.title);
                    summary.created.push(ItemOutcome {
                        title: item.title.clone(),
                        reason: "would create (dry run)".to_string(),
                        item: item.clone(),
                    });
                    continue;
                }

                let draft = TaskDraft {
                    title: item.title.clone(),
                    notes: format_task_notes(item),
                    due: item.due,
                };

                match backend.create_task(list_id, &draft).await {
                    Ok(task_id) => {
                        log::info!("Created task {} for \"{}\"", task_id, item.title);
                        summary.created.push(ItemOutcome {
                            title: item.title.clone(),
                            reason: format!("created as {}", task_id),
                            item: item.clone(),
                        });
                    }
                    Err(e) => {
                        log::error!("Failed to create task for \"{}\": {}", item.title, e);
                        summary.failed.push(ItemOutcome {
                            title: item.title.clone(),
                            reason: e.to_string(),
                            item: item.clone(),
                        });
                    }
                }
            }
        }
    }
}
