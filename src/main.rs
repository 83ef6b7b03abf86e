//! CLI entry point.
//!
//! Flags:
//!   --dry-run   compute and print the plan without creating tasks,
//!               touching state, or reporting
//!   --force     re-present already-processed records to extraction
//!               (reconciliation still suppresses duplicates)

use std::process::ExitCode;

use tasktriage::config::{self, load_config};
use tasktriage::google::{tasks, GoogleClient};
use tasktriage::lock::RunLock;
use tasktriage::report;
use tasktriage::session::CliEngine;
use tasktriage::state::FileStateStore;
use tasktriage::{run_once, AgentError, Collaborators, RunOptions};

fn print_usage() {
    eprintln!("Usage: tasktriage [--dry-run] [--force]");
    eprintln!();
    eprintln!("  --dry-run   show what would be created without side effects");
    eprintln!("  --force     rescan records already marked processed");
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut dry_run = false;
    let mut force = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" | "-n" => dry_run = true,
            "--force" | "-f" => force = true,
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                return ExitCode::FAILURE;
            }
        }
    }

    match run(dry_run, force).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Run failed: {}", e);
            if let AgentError::TokenNotFound(path) = &e {
                eprintln!(
                    "No Google token at {}. Authorize with Google's OAuth tooling and \
                     place the token there.",
                    path.display()
                );
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(dry_run: bool, force: bool) -> Result<(), AgentError> {
    let mut config = load_config()?;

    // Single-run lock; held until exit.
    let _lock = RunLock::acquire(config::lock_path())?;

    let client = GoogleClient::new(&config, config::google_token_path());

    if config.task_list_id.is_empty() {
        let token = client.access_token().await?;
        let id = tasks::resolve_list_id(client.http(), &token, &config.task_list_name).await?;
        log::info!("Resolved task list \"{}\" to {}", config.task_list_name, id);
        config.task_list_id = id;
    }

    let engine = CliEngine::new(config.engine_command.clone(), config.engine_timeout_secs);
    let store = FileStateStore::new(config::state_path());

    let collab = Collaborators {
        source: &client,
        backend: &client,
        engine: &engine,
        store: &store,
    };
    let options = RunOptions { dry_run, force };

    let summary = run_once(&config, &collab, &options).await?;

    if dry_run {
        println!("DRY RUN — no tasks created, no state written");
        for outcome in &summary.created {
            println!("  would create: {}", outcome.title);
        }
        for outcome in &summary.duplicates {
            println!("  duplicate:    {} ({})", outcome.title, outcome.reason);
        }
    } else {
        report::report(&config::action_log_path(), &summary);
        println!(
            "{} created, {} duplicates skipped, {} failed ({} scanned)",
            summary.created_count(),
            summary.duplicate_count(),
            summary.failed_count(),
            summary.scanned
        );
    }

    if summary.failed_count() > 0 {
        // Partial failures still exit zero: the run itself completed and
        // the failed items will resurface as unprocessed next run.
        log::warn!("{} item(s) failed to create", summary.failed_count());
    }

    Ok(())
}
