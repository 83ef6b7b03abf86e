//! Classification rule set for the extraction session.
//!
//! A fixed, deterministic block of policy text: the reasoning engine is the
//! classifier, this module is the policy. Context selection and seen-state
//! filtering happen natively in the collector — the rules only describe how
//! to classify the records it hands over.

use chrono::NaiveDate;

use crate::config::Config;
use crate::util::user_name_variants;

/// Build the system prompt (classification policy) for one run.
pub fn build_rules(config: &Config, today: NaiveDate) -> String {
    let user_names = user_name_variants(&config.user_email);
    let user_names_str = if user_names.is_empty() {
        "unknown".to_string()
    } else {
        user_names.join(", ")
    };
    let high_priority_str = config.high_priority_senders.join(", ");

    format!(
        r#"You are an email and calendar triage classifier. You will receive a JSON
payload of new inbox messages, starred messages, meeting-note messages,
secondary-calendar events, and upcoming calendar events (context only).
Identify action items requiring the recipient's attention.

TODAY'S DATE: {today}

STARRED MESSAGES (kind = "starred"):
- The user explicitly starred these; they always need action.
- Category "starred". If the action isn't clear, use "Follow up on: [subject]".

MEETING NOTES (kind = "meeting_note"):
- AI-generated meeting summaries from {notes_sender}.
- Extract ONLY items assigned to the recipient from the suggested next steps.
- Recipient name variations: {user_names}
- Category "meeting-note"; set relatedEvent to the meeting name.

SECONDARY CALENDAR EVENTS (kind = "secondary_calendar"):
- Each event is itself an action item: title from the event summary, due on
  the event start date, category "secondary-calendar", priority MEDIUM.

CALENDAR CORRELATION:
- The upcoming-events list is context, not a candidate source.
- If a message discusses preparation, materials, or deadlines for an
  upcoming event, use category "calendar-prep" and set relatedEvent.

For each action item produce:
- sourceRef: the id of the message/event it came from (REQUIRED)
- title: clear, concise task — "[Verb] [specific deliverable]", under 60 chars
- detail: one sentence of supporting context
- priority: HIGH / MEDIUM / LOW
- due: YYYY-MM-DD or omit. Infer from phrasing:
  "tomorrow" = tomorrow's date; "by Friday" / "end of week" = this Friday;
  "next week" = next Monday; "before [meeting]" = the day before it;
  preparation for an upcoming event = the day before the event.
- category: one of "email", "escalation-sender", "deadline", "starred",
  "meeting-note", "calendar-prep", "expense-approval", "secondary-calendar"
- sender, subject: copied from the source record
- relatedEvent: meeting name when applicable, else omit

Use category "escalation-sender" when the sender matches any of:
{high_priority}
Use category "expense-approval" only for expenses requiring the recipient's
approval, never for generic alerts ("report approved", "payment processed").

Do NOT produce action items for:
- Newsletters or promotional mail
- FYI notifications with no action needed
- Meeting-note items assigned to other people
- Already-completed items

Return ONLY a JSON object, no other text:
{{
  "actionItems": [
    {{
      "sourceRef": "…",
      "title": "…",
      "detail": "…",
      "priority": "HIGH",
      "due": "2026-02-15",
      "category": "email",
      "sender": "…",
      "subject": "…",
      "relatedEvent": null
    }}
  ]
}}"#,
        today = today,
        notes_sender = config.meeting_notes_sender,
        user_names = user_names_str,
        high_priority = high_priority_str,
    )
}

/// Nudge appended for the single bounded retry after malformed output.
pub const RETRY_NUDGE: &str =
    "Your previous reply was not valid JSON. Return ONLY the JSON object described above, with no surrounding text or code fences.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_embed_config() {
        let mut config = Config::default();
        config.user_email = "sarah.chen@acme.com".into();
        let rules = build_rules(&config, NaiveDate::from_ymd_opt(2026, 8, 28).unwrap());

        assert!(rules.contains("2026-08-28"));
        assert!(rules.contains("sarah chen"));
        assert!(rules.contains("gemini-notes@google.com"));
        assert!(rules.contains("legal@"));
    }

    #[test]
    fn test_rules_are_deterministic() {
        let config = Config::default();
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(build_rules(&config, today), build_rules(&config, today));
    }
}
