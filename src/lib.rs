//! tasktriage: inbox and calendar triage into Google Tasks.
//!
//! One run: collect new messages and events, extract action items through
//! a reasoning engine, reconcile against the destination task list, create
//! what qualifies, and record the batch as processed. Designed to be run
//! repeatedly (cron or manual) with idempotent results.

pub mod collect;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod google;
pub mod lock;
pub mod reconcile;
pub mod report;
pub mod rules;
pub mod run;
pub mod session;
pub mod sources;
pub mod state;
pub mod types;
pub mod util;

pub use error::AgentError;
pub use run::{run_once, Collaborators, RunOptions};
pub use types::RunSummary;
