//! Run reporting: append-only activity log plus a desktop notification.
//!
//! Both outputs are best-effort. A failed log write or notification is
//! logged and swallowed; reporting never affects pipeline state or the
//! run's exit status.

use std::io::Write;
use std::path::Path;

use chrono::Local;

use crate::types::RunSummary;
use crate::util::{sender_display, truncate_chars};

const LOG_HEADER: &str = "# Action Items\n\nAutomatically captured from inbox, starred mail, meeting notes, and\nsecondary calendars. Newest runs at the bottom.\n";

/// Append this run's outcome to the activity log. Creates the file with a
/// header on first use.
pub fn append_action_log(path: &Path, summary: &RunSummary) -> std::io::Result<()> {
    if summary.created.is_empty() && summary.duplicates.is_empty() && summary.failed.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let is_new = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    if is_new {
        file.write_all(LOG_HEADER.as_bytes())?;
    }

    let mut section = format!("\n## {}\n\n", Local::now().format("%Y-%m-%d %H:%M"));

    for outcome in &summary.created {
        let item = &outcome.item;
        section.push_str(&format!(
            "- {}{} **{}**\n",
            item.priority.badge(),
            item.category.badge(),
            item.title
        ));
        if !item.sender.is_empty() {
            section.push_str(&format!("  - From: {}\n", sender_display(&item.sender)));
        }
        if !item.subject.is_empty() {
            section.push_str(&format!("  - Subject: {}\n", item.subject));
        }
        if let Some(ref event) = item.related_event {
            section.push_str(&format!("  - Meeting: {}\n", event));
        }
        if let Some(due) = item.due {
            section.push_str(&format!("  - Due: {}\n", due));
        }
        section.push_str(&format!("  - `{}`\n", item.source_ref));
    }

    if !summary.duplicates.is_empty() {
        section.push_str(&format!(
            "\nSkipped {} duplicate(s).\n",
            summary.duplicate_count()
        ));
    }
    for outcome in &summary.failed {
        section.push_str(&format!(
            "- FAILED **{}**: {}\n",
            outcome.title, outcome.reason
        ));
    }

    file.write_all(section.as_bytes())?;
    Ok(())
}

/// Pop a desktop notification summarizing what was filed.
pub fn notify_summary(summary: &RunSummary) {
    if summary.created.is_empty() && summary.failed.is_empty() {
        return;
    }

    let title = if summary.failed.is_empty() {
        format!("{} new task(s) filed", summary.created_count())
    } else {
        format!(
            "{} task(s) filed, {} failed",
            summary.created_count(),
            summary.failed_count()
        )
    };

    let mut lines: Vec<String> = summary
        .created
        .iter()
        .take(5)
        .map(|o| format!("• {}", truncate_chars(&o.title, 60)))
        .collect();
    if summary.created.len() > 5 {
        lines.push(format!("… and {} more", summary.created.len() - 5));
    }

    if let Err(e) = notify_rust::Notification::new()
        .summary(&title)
        .body(&lines.join("\n"))
        .appname("tasktriage")
        .show()
    {
        log::warn!("Desktop notification failed: {}", e);
    }
}

/// Run all reporting for a completed run. Never fails.
pub fn report(log_path: &Path, summary: &RunSummary) {
    if let Err(e) = append_action_log(log_path, summary) {
        log::error!("Could not append to action log {:?}: {}", log_path, e);
    }
    notify_summary(summary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionItem, Category, ItemOutcome, Priority};

    fn summary_with(created: Vec<&str>) -> RunSummary {
        let mut summary = RunSummary::new(false);
        for title in created {
            summary.created.push(ItemOutcome {
                title: title.to_string(),
                reason: "created".into(),
                item: ActionItem {
                    source_ref: format!("ref-{}", title),
                    title: title.to_string(),
                    detail: String::new(),
                    priority: Priority::High,
                    due: None,
                    category: Category::Email,
                    sender: "boss@acme.com".into(),
                    subject: "please do".into(),
                    related_event: None,
                },
            });
        }
        summary
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("action-items.md");

        append_action_log(&path, &summary_with(vec!["First"])).unwrap();
        append_action_log(&path, &summary_with(vec!["Second"])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("# Action Items").count(), 1);
        assert!(content.contains("First"));
        assert!(content.contains("Second"));
        assert_eq!(content.matches("## ").count(), 2);
    }

    #[test]
    fn test_entries_carry_badges_and_refs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("action-items.md");

        append_action_log(&path, &summary_with(vec!["Review budget"])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[!]"));
        assert!(content.contains("**Review budget**"));
        assert!(content.contains("From: boss@acme.com"));
        assert!(content.contains("`ref-Review budget`"));
    }

    #[test]
    fn test_empty_summary_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("action-items.md");

        append_action_log(&path, &RunSummary::new(false)).unwrap();
        assert!(!path.exists());
    }
}
