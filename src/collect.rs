//! Context collection: bounded fetch windows + incremental filtering.
//!
//! Read-only. Gathers inbox, starred, and meeting-note messages plus
//! calendar context, then filters out references already in `RunState`
//! unless `force` is set. Per-source failures are transient (source skipped,
//! run continues); when every candidate source fails the run is fatal.

use crate::config::Config;
use crate::error::AgentError;
use crate::sources::ContextSource;
use crate::state::RunState;
use crate::types::{CalendarEvent, RecordKind, SourceRecord};

/// Everything a single extraction session works from.
#[derive(Debug, Default)]
pub struct ContextBundle {
    /// Candidate records (inbox, starred, meeting notes), new-only unless
    /// force-rescanning.
    pub candidates: Vec<SourceRecord>,
    /// Primary-calendar events — correlation input only, never candidates.
    pub calendar: Vec<CalendarEvent>,
    /// Secondary-calendar events promoted to first-class candidates.
    pub secondary_events: Vec<CalendarEvent>,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.secondary_events.is_empty()
    }

    /// Every source reference this bundle covers, for processed-state marking.
    pub fn all_refs(&self) -> Vec<String> {
        self.candidates
            .iter()
            .map(|r| r.source_ref.clone())
            .chain(self.secondary_events.iter().map(|e| e.id.clone()))
            .collect()
    }
}

/// Gather and filter context for one run.
pub async fn collect_context(
    source: &dyn ContextSource,
    config: &Config,
    state: &RunState,
    force: bool,
) -> Result<ContextBundle, AgentError> {
    let mut bundle = ContextBundle::default();
    let mut sources_attempted = 0u32;
    let mut sources_failed = 0u32;
    let mut last_err: Option<AgentError> = None;

    let keep = |r: &SourceRecord| force || !state.is_processed(&r.source_ref);

    // Inbox
    sources_attempted += 1;
    match source.fetch_inbox(config.max_inbox).await {
        Ok(records) => {
            let fetched = records.len();
            bundle
                .candidates
                .extend(records.into_iter().filter(|r| keep(r)));
            log::info!("Inbox: {} fetched", fetched);
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            log::warn!("Inbox fetch failed, skipping source: {}", e);
            sources_failed += 1;
            last_err = Some(e);
        }
    }

    // Starred
    sources_attempted += 1;
    match source.fetch_starred(config.max_starred).await {
        Ok(records) => {
            bundle
                .candidates
                .extend(records.into_iter().filter(|r| keep(r)));
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            log::warn!("Starred fetch failed, skipping source: {}", e);
            sources_failed += 1;
            last_err = Some(e);
        }
    }

    // Meeting notes
    sources_attempted += 1;
    match source.fetch_meeting_notes(config.max_notes).await {
        Ok(records) => {
            bundle
                .candidates
                .extend(records.into_iter().filter(|r| keep(r)));
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            log::warn!("Meeting-notes fetch failed, skipping source: {}", e);
            sources_failed += 1;
            last_err = Some(e);
        }
    }

    // Primary calendar — context only, so a failure never counts against
    // the all-sources-down check.
    if config.calendar_enabled {
        match source
            .fetch_calendar_events("primary", config.calendar_lookahead_days)
            .await
        {
            Ok(events) => bundle.calendar = events,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => log::warn!("Calendar fetch failed, continuing without context: {}", e),
        }
    }

    // Secondary calendars: events become candidates directly.
    for cal_id in &config.secondary_calendar_ids {
        sources_attempted += 1;
        match source
            .fetch_calendar_events(cal_id, config.calendar_lookahead_days)
            .await
        {
            Ok(events) => {
                bundle.secondary_events.extend(
                    events
                        .into_iter()
                        .filter(|e| !is_time_off(&e.summary))
                        .filter(|e| force || !state.is_processed(&e.id)),
                );
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::warn!("Secondary calendar {} fetch failed: {}", cal_id, e);
                sources_failed += 1;
                last_err = Some(e);
            }
        }
    }

    if sources_failed == sources_attempted {
        // Cannot reach any source at all — configuration/auth class failure.
        return Err(last_err.unwrap_or(AgentError::Config(
            "no context sources configured".into(),
        )));
    }

    log::info!(
        "Collected {} candidate records, {} calendar events, {} secondary events",
        bundle.candidates.len(),
        bundle.calendar.len(),
        bundle.secondary_events.len()
    );

    Ok(bundle)
}

/// PTO / vacation / out-of-office events are never actionable.
///
/// Markers must match whole words: "Laptop handover" contains "pto" as a
/// fragment but is a real event.
pub fn is_time_off(summary: &str) -> bool {
    let tokens: Vec<String> = summary
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();

    if tokens
        .iter()
        .any(|t| t == "pto" || t == "ooo" || t == "vacation")
    {
        return true;
    }

    tokens
        .windows(3)
        .any(|w| w[0] == "out" && w[1] == "of" && w[2] == "office")
}

/// Build a synthetic candidate record for a secondary-calendar event so it
/// flows through extraction like any other source.
pub fn event_to_record(event: &CalendarEvent) -> SourceRecord {
    SourceRecord {
        source_ref: event.id.clone(),
        kind: RecordKind::SecondaryCalendar,
        sender: event.organizer.clone(),
        subject: event.summary.clone(),
        received_at: event.start.clone(),
        body: event.description.clone(),
    }
}
