//! Pipeline orchestration: one full triage run.
//!
//! Stage order is fixed: load state, collect context, extract, reconcile,
//! dispatch, commit state, report. State is committed only after dispatch
//! so a crash mid-run re-presents the same batch next time; dry-run skips
//! both the commit and the reporting side effects.

use chrono::Utc;

use crate::collect::collect_context;
use crate::config::Config;
use crate::dispatch::dispatch;
use crate::error::AgentError;
use crate::reconcile::reconcile;
use crate::rules::build_rules;
use crate::session::{extract_action_items, ReasoningEngine};
use crate::sources::{ContextSource, TaskBackend};
use crate::state::StateStore;
use crate::types::RunSummary;

/// Everything a run needs, abstracted for testing.
pub struct Collaborators<'a> {
    pub source: &'a dyn ContextSource,
    pub backend: &'a dyn TaskBackend,
    pub engine: &'a dyn ReasoningEngine,
    pub store: &'a dyn StateStore,
}

pub struct RunOptions {
    pub dry_run: bool,
    pub force: bool,
}

/// Execute one triage run end to end.
pub async fn run_once(
    config: &Config,
    collab: &Collaborators<'_>,
    options: &RunOptions,
) -> Result<RunSummary, AgentError> {
    let mut summary = RunSummary::new(options.dry_run);
    let mut state = collab.store.load();

    log::info!(
        "Run {} starting (dry_run={}, force={})",
        summary.run_id,
        options.dry_run,
        options.force
    );

    // Collect
    let bundle = collect_context(collab.source, config, &state, options.force).await?;
    summary.scanned = bundle.candidates.len() + bundle.secondary_events.len();

    if bundle.is_empty() {
        log::info!("Nothing new to triage");
        return Ok(summary);
    }

    // Extract. Secondary-calendar events ride along inside the serialized
    // bundle; the session promotes them to candidates itself.
    let rules = build_rules(config, Utc::now().date_naive());
    let outcome = extract_action_items(collab.engine, &rules, &bundle).await?;
    summary.extracted = outcome.items.len();

    // Reconcile against the destination list. A failure here is fatal for
    // the run: without the open-task snapshot, creation cannot be deduped.
    if config.task_list_id.is_empty() {
        return Err(AgentError::Config(
            "taskListId is not set and could not be resolved by name".into(),
        ));
    }
    let list_id = config.task_list_id.clone();
    let existing = collab.backend.list_open_tasks(&list_id).await?;
    let verdicts = reconcile(&outcome.items, &existing);

    // Dispatch
    dispatch(collab.backend, &list_id, &verdicts, options.dry_run, &mut summary).await;

    // Commit. A deferred batch stays unmarked so the next run retries it,
    // as do records whose task creation failed.
    if outcome.deferred {
        log::warn!("Extraction deferred; batch will be retried next run");
    } else {
        let failed_refs: std::collections::HashSet<&str> = summary
            .failed
            .iter()
            .map(|o| o.item.source_ref.as_str())
            .collect();
        let now = Utc::now();
        for source_ref in bundle.all_refs() {
            if failed_refs.contains(source_ref.as_str()) {
                continue;
            }
            state.mark_processed(&source_ref, now);
        }
        state.evict(config.retention_days, now);
        state.last_run = Some(now);
    }

    if options.dry_run {
        log::info!("DRY RUN: state not committed");
    } else if let Err(e) = collab.store.commit(&state) {
        // The worst case of a lost commit is re-triaging a batch, which
        // reconciliation absorbs. Not worth failing the run over.
        log::error!("State commit failed: {}", e);
    }

    log::info!(
        "Run {} done: {} scanned, {} extracted, {} created, {} duplicates, {} failed",
        summary.run_id,
        summary.scanned,
        summary.extracted,
        summary.created_count(),
        summary.duplicate_count(),
        summary.failed_count()
    );

    Ok(summary)
}
