//! Duplicate reconciliation against the live task list.
//!
//! Pure function: fixed candidates + fixed open-task snapshot → fixed
//! verdicts. A candidate is a duplicate when an existing task's notes embed
//! its source reference, or when the normalized titles are close enough.
//! First matching task wins; many-to-one collapse is acceptable — duplicates
//! are suppressed, not merged.

use std::collections::HashSet;

use crate::types::{ActionItem, Decision, ExistingTask, MatchReason, Verdict};

/// Minimum token-set overlap ratio for a title-based duplicate.
pub const TITLE_OVERLAP_THRESHOLD: f64 = 0.6;

/// Whole-title similarity floor for short titles where token overlap is
/// too coarse (jaro_winkler over the normalized strings).
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.92;

/// Classify every candidate against the open-task snapshot.
pub fn reconcile(candidates: &[ActionItem], existing: &[ExistingTask]) -> Vec<Verdict> {
    candidates
        .iter()
        .map(|item| classify(item, existing))
        .collect()
}

fn classify(item: &ActionItem, existing: &[ExistingTask]) -> Verdict {
    // Source-reference match is authoritative: the task was created from
    // this exact message/event, whatever its title says now.
    for task in existing {
        if !item.source_ref.is_empty() && task.notes.contains(&item.source_ref) {
            return Verdict {
                item: item.clone(),
                decision: Decision::SkipDuplicate,
                matched_task_id: Some(task.id.clone()),
                reason: Some(MatchReason::SourceRef),
            };
        }
    }

    for task in existing {
        if titles_overlap(&item.title, &task.title) {
            return Verdict {
                item: item.clone(),
                decision: Decision::SkipDuplicate,
                matched_task_id: Some(task.id.clone()),
                reason: Some(MatchReason::TitleOverlap),
            };
        }
    }

    Verdict {
        item: item.clone(),
        decision: Decision::Create,
        matched_task_id: None,
        reason: None,
    }
}

/// Whether two titles are similar enough to be the same task.
pub fn titles_overlap(a: &str, b: &str) -> bool {
    let na = normalize_title(a);
    let nb = normalize_title(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }

    if token_overlap_ratio(&na, &nb) >= TITLE_OVERLAP_THRESHOLD {
        return true;
    }

    // One- or two-token titles can miss on token overlap while being
    // near-identical strings ("Q3 forecast" vs "Q3 forecasts").
    strsim::jaro_winkler(&na, &nb) >= TITLE_SIMILARITY_THRESHOLD
}

/// Lowercase, punctuation to spaces, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shared-token ratio relative to the smaller token set.
pub fn token_overlap_ratio(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    shared as f64 / ta.len().min(tb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Priority};

    fn item(source_ref: &str, title: &str) -> ActionItem {
        ActionItem {
            source_ref: source_ref.to_string(),
            title: title.to_string(),
            detail: String::new(),
            priority: Priority::Medium,
            due: None,
            category: Category::Email,
            sender: String::new(),
            subject: String::new(),
            related_event: None,
        }
    }

    fn task(id: &str, title: &str, notes: &str) -> ExistingTask {
        ExistingTask {
            id: id.to_string(),
            title: title.to_string(),
            notes: notes.to_string(),
        }
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("Review: Q3 Budget!!  (Finance)"),
            "review q3 budget finance"
        );
    }

    #[test]
    fn test_source_ref_match_beats_unrelated_title() {
        let candidates = vec![item("msg-42", "Completely unrelated title")];
        let existing = vec![task("t1", "Old task", "Source: msg-42\nPriority: HIGH")];

        let verdicts = reconcile(&candidates, &existing);
        assert_eq!(verdicts[0].decision, Decision::SkipDuplicate);
        assert_eq!(verdicts[0].matched_task_id.as_deref(), Some("t1"));
        assert_eq!(verdicts[0].reason, Some(MatchReason::SourceRef));
    }

    #[test]
    fn test_title_overlap_duplicate() {
        let candidates = vec![item("msg-1", "Review Q3 budget from Finance")];
        let existing = vec![task("t1", "Review Q3 budget", "")];

        let verdicts = reconcile(&candidates, &existing);
        assert_eq!(verdicts[0].decision, Decision::SkipDuplicate);
        assert_eq!(verdicts[0].reason, Some(MatchReason::TitleOverlap));
    }

    #[test]
    fn test_unrelated_titles_create() {
        let candidates = vec![item("msg-1", "Schedule dentist")];
        let existing = vec![task("t1", "Review Q3 budget", "")];

        let verdicts = reconcile(&candidates, &existing);
        assert_eq!(verdicts[0].decision, Decision::Create);
        assert!(verdicts[0].matched_task_id.is_none());
    }

    #[test]
    fn test_near_identical_short_titles() {
        assert!(titles_overlap("Q3 forecast", "Q3 forecasts"));
        assert!(!titles_overlap("Q3 forecast", "Hiring plan"));
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let candidates = vec![item("msg-1", "REVIEW Q3 BUDGET!")];
        let existing = vec![task("t1", "review q3 budget", "")];
        assert_eq!(
            reconcile(&candidates, &existing)[0].decision,
            Decision::SkipDuplicate
        );
    }

    #[test]
    fn test_first_match_wins() {
        let candidates = vec![item("msg-1", "Review Q3 budget")];
        let existing = vec![
            task("t1", "Review Q3 budget", ""),
            task("t2", "Review Q3 budget numbers", ""),
        ];
        assert_eq!(
            reconcile(&candidates, &existing)[0]
                .matched_task_id
                .as_deref(),
            Some("t1")
        );
    }

    #[test]
    fn test_many_to_one_collapse() {
        // Two candidates matching the same task both get suppressed.
        let candidates = vec![
            item("msg-1", "Review Q3 budget"),
            item("msg-2", "Review the Q3 budget"),
        ];
        let existing = vec![task("t1", "Review Q3 budget", "")];
        let verdicts = reconcile(&candidates, &existing);
        assert!(verdicts
            .iter()
            .all(|v| v.decision == Decision::SkipDuplicate));
    }

    #[test]
    fn test_empty_existing_all_create() {
        let candidates = vec![item("msg-1", "Anything"), item("msg-2", "Else")];
        let verdicts = reconcile(&candidates, &[]);
        assert!(verdicts.iter().all(|v| v.decision == Decision::Create));
    }

    #[test]
    fn test_empty_source_ref_never_matches_notes() {
        // Guards against "".contains("") tripping the source-ref branch.
        let candidates = vec![item("", "Schedule dentist")];
        let existing = vec![task("t1", "Review Q3 budget", "Source: msg-9")];
        assert_eq!(
            reconcile(&candidates, &existing)[0].decision,
            Decision::Create
        );
    }
}
