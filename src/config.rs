//! Configuration loading (~/.tasktriage/config.json).
//!
//! All fields carry serde defaults so a missing config file yields a
//! working first-run setup; a file that exists but fails to parse is a
//! fatal configuration error.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Hard cap on processed source references kept in state.
pub const MAX_PROCESSED_REFS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Google Tasks list id. When empty, `task_list_name` is resolved by name.
    #[serde(default)]
    pub task_list_id: String,
    #[serde(default = "default_task_list_name")]
    pub task_list_name: String,

    #[serde(default = "default_max_inbox")]
    pub max_inbox: u32,
    #[serde(default = "default_max_starred")]
    pub max_starred: u32,
    #[serde(default = "default_max_notes")]
    pub max_notes: u32,

    #[serde(default = "default_lookahead")]
    pub calendar_lookahead_days: u32,
    #[serde(default = "default_true")]
    pub calendar_enabled: bool,
    /// Calendars whose events become tasks directly (not just context).
    #[serde(default)]
    pub secondary_calendar_ids: Vec<String>,

    /// The user's own address, for matching assignments in meeting notes.
    #[serde(default)]
    pub user_email: String,
    /// Sender of AI-generated meeting summaries.
    #[serde(default = "default_notes_sender")]
    pub meeting_notes_sender: String,
    /// Sender substrings that force task creation (case-insensitive).
    #[serde(default = "default_high_priority_senders")]
    pub high_priority_senders: Vec<String>,

    /// Processed references older than this are evicted at commit.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_engine_command")]
    pub engine_command: String,
    #[serde(default = "default_engine_timeout")]
    pub engine_timeout_secs: u64,
}

fn default_task_list_name() -> String {
    "Work Tasks".to_string()
}
fn default_max_inbox() -> u32 {
    20
}
fn default_max_starred() -> u32 {
    20
}
fn default_max_notes() -> u32 {
    10
}
fn default_lookahead() -> u32 {
    28
}
fn default_true() -> bool {
    true
}
fn default_notes_sender() -> String {
    "gemini-notes@google.com".to_string()
}
fn default_retention_days() -> i64 {
    90
}
fn default_engine_command() -> String {
    "claude".to_string()
}
fn default_engine_timeout() -> u64 {
    300
}

fn default_high_priority_senders() -> Vec<String> {
    [
        "hr@",
        "human.resources@",
        "humanresources@",
        "people@",
        "peopleops@",
        "legal@",
        "compliance@",
        "ethics@",
        "finance@",
        "accounting@",
        "payroll@",
        "expenses@",
        "security@",
        "it-security@",
        "infosec@",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        // Round-trip through serde so defaults live in one place.
        serde_json::from_str("{}").expect("empty config deserializes")
    }
}

/// Base state directory (~/.tasktriage).
pub fn config_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".tasktriage")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

pub fn state_path() -> PathBuf {
    config_dir().join("state.json")
}

pub fn action_log_path() -> PathBuf {
    config_dir().join("action-items.md")
}

pub fn lock_path() -> PathBuf {
    config_dir().join("run.lock")
}

pub fn google_token_path() -> PathBuf {
    config_dir().join("google").join("token.json")
}

/// Load configuration, falling back to defaults when no file exists.
pub fn load_config() -> Result<Config, AgentError> {
    let path = config_path();
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| AgentError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AgentError::Config(format!("failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.max_inbox, 20);
        assert_eq!(cfg.calendar_lookahead_days, 28);
        assert_eq!(cfg.task_list_name, "Work Tasks");
        assert_eq!(cfg.meeting_notes_sender, "gemini-notes@google.com");
        assert!(cfg.calendar_enabled);
        assert!(cfg.secondary_calendar_ids.is_empty());
        assert!(cfg
            .high_priority_senders
            .contains(&"legal@".to_string()));
    }

    #[test]
    fn test_partial_config_parses() {
        let cfg: Config = serde_json::from_str(
            r#"{ "maxInbox": 5, "userEmail": "me@corp.com", "taskListId": "abc" }"#,
        )
        .unwrap();
        assert_eq!(cfg.max_inbox, 5);
        assert_eq!(cfg.user_email, "me@corp.com");
        assert_eq!(cfg.task_list_id, "abc");
        // Untouched fields keep defaults
        assert_eq!(cfg.max_starred, 20);
    }
}
