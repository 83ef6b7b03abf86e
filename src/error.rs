//! Error types for the triage run.
//!
//! Errors are classified by recoverability:
//! - Transient: network issues, timeouts, rate limits — the affected call is
//!   skipped and the run continues.
//! - Fatal: configuration/auth failures — the run exits non-zero without
//!   mutating state.
//!
//! Malformed engine output is handled inline by the extraction session
//! (bounded retry, then the batch is dropped) and only surfaces here when
//! the retry is also unusable.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    // Transient
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("API rate limit exceeded")]
    RateLimit,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    // Fatal
    #[error("Google token expired or revoked — re-authenticate")]
    AuthExpired,

    #[error("Google token not found at {0}")]
    TokenNotFound(PathBuf),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Another run is already active (lock held at {0})")]
    LockHeld(PathBuf),

    #[error("Reasoning engine not found: {0}")]
    EngineNotFound(String),

    #[error("Reasoning engine failed: {0}")]
    EngineFailed(String),

    #[error("Engine output could not be parsed: {0}")]
    MalformedOutput(String),

    #[error("State commit failed: {0}")]
    StateCommit(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// True when the failed call can be skipped without aborting the run.
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Timeout(_) | AgentError::RateLimit => true,
            AgentError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // 5xx after retries: the backend is unhealthy but may recover
            // before the next scheduled run.
            AgentError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// True when the whole run must stop: nothing downstream can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::AuthExpired
                | AgentError::TokenNotFound(_)
                | AgentError::RefreshFailed(_)
                | AgentError::Config(_)
                | AgentError::LockHeld(_)
                | AgentError::EngineNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AgentError::Timeout(30).is_transient());
        assert!(AgentError::RateLimit.is_transient());
        assert!(AgentError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!AgentError::Api {
            status: 404,
            message: "not found".into()
        }
        .is_transient());
        assert!(!AgentError::AuthExpired.is_transient());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(AgentError::AuthExpired.is_fatal());
        assert!(AgentError::Config("bad".into()).is_fatal());
        assert!(AgentError::LockHeld(PathBuf::from("/tmp/x.lock")).is_fatal());
        assert!(!AgentError::Timeout(10).is_fatal());
        assert!(!AgentError::MalformedOutput("junk".into()).is_fatal());
    }
}
