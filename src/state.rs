//! Cross-run state: processed source references + last successful run.
//!
//! `RunState` is an explicitly loaded/committed value passed through the
//! run, not a process-wide singleton. The `StateStore` trait keeps the
//! pipeline testable without filesystem coupling: `FileStateStore` persists
//! atomically (temp write + rename), `MemoryStateStore` backs the tests.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MAX_PROCESSED_REFS;
use crate::error::AgentError;

/// Persisted state. Created on first run; mutated only after a run
/// completes (and never under dry-run).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Processed source reference → when it was first seen.
    #[serde(default)]
    pub processed: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn is_processed(&self, source_ref: &str) -> bool {
        self.processed.contains_key(source_ref)
    }

    /// Record a reference as processed. The first-seen timestamp is kept on
    /// repeat sightings so age-based eviction stays stable.
    pub fn mark_processed(&mut self, source_ref: &str, now: DateTime<Utc>) {
        self.processed
            .entry(source_ref.to_string())
            .or_insert(now);
    }

    /// Drop references older than `retention_days`, then enforce the hard
    /// cap keeping the newest entries. Bounds state growth across runs.
    pub fn evict(&mut self, retention_days: i64, now: DateTime<Utc>) {
        let cutoff = now - Duration::days(retention_days);
        self.processed.retain(|_, first_seen| *first_seen >= cutoff);

        if self.processed.len() > MAX_PROCESSED_REFS {
            let mut by_age: Vec<(String, DateTime<Utc>)> = self
                .processed
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            by_age.sort_by_key(|(_, seen)| std::cmp::Reverse(*seen));
            by_age.truncate(MAX_PROCESSED_REFS);
            self.processed = by_age.into_iter().collect();
        }
    }
}

/// Load/commit contract for run state.
///
/// `load` never fails the run: missing or corrupt state yields the default.
/// `commit` must be atomic — the new state becomes entirely visible or the
/// old state remains, even under process termination mid-write.
pub trait StateStore: Send + Sync {
    fn load(&self) -> RunState;
    fn commit(&self, state: &RunState) -> Result<(), AgentError>;
}

// ============================================================================
// Durable implementation
// ============================================================================

pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> RunState {
        if !self.path.exists() {
            return RunState::default();
        }
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("State file unreadable ({}); starting fresh", e);
                    RunState::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read state file ({}); starting fresh", e);
                RunState::default()
            }
        }
    }

    fn commit(&self, state: &RunState) -> Result<(), AgentError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| AgentError::StateCommit("state path has no parent".into()))?;
        fs::create_dir_all(parent)
            .map_err(|e| AgentError::StateCommit(format!("create {}: {}", parent.display(), e)))?;

        // State embeds mail metadata — restrict to the owner.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
        }

        let content = serde_json::to_string_pretty(state)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| AgentError::StateCommit(format!("temp file: {}", e)))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| AgentError::StateCommit(format!("temp write: {}", e)))?;
        tmp.flush()
            .map_err(|e| AgentError::StateCommit(format!("temp flush: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600));
        }

        tmp.persist(&self.path)
            .map_err(|e| AgentError::StateCommit(format!("rename into place: {}", e)))?;
        Ok(())
    }
}

// ============================================================================
// In-memory implementation (tests, dry experiments)
// ============================================================================

#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<RunState>,
    commits: Mutex<u32>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: RunState) -> Self {
        Self {
            inner: Mutex::new(state),
            commits: Mutex::new(0),
        }
    }

    /// Number of commits observed — lets tests assert dry-run purity.
    pub fn commit_count(&self) -> u32 {
        *self.commits.lock().unwrap()
    }

    pub fn snapshot(&self) -> RunState {
        self.inner.lock().unwrap().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> RunState {
        self.inner.lock().unwrap().clone()
    }

    fn commit(&self, state: &RunState) -> Result<(), AgentError> {
        *self.inner.lock().unwrap() = state.clone();
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }
}
