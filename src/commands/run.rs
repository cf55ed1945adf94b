//! `opengine run`: drive one firing of a scheduled operation.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use opengine::OperationEngine;
use opengine::config::Config;
use opengine::operation::{RunOutcome, RunParameters, RunType};

/// Per-firing arguments from the command line.
#[derive(Debug)]
pub struct RunArgs {
    pub operation_id: String,
    pub run_type: RunType,
    pub expect_start_time: Option<DateTime<Utc>>,
    pub window: u64,
    pub user_id: String,
    pub project_id: String,
    pub trigger_id: Option<String>,
}

pub async fn run(config_path: &str, definition_path: &Path, args: RunArgs) -> Result<()> {
    let config = Config::load(config_path)
        .await
        .with_context(|| format!("failed to load config '{config_path}'"))?;
    let definition = super::load_definition(definition_path).await?;
    let engine = OperationEngine::from_config(&config, Path::new(config_path))?;

    let now = Utc::now();
    let mut params = RunParameters::new(
        args.operation_id,
        args.run_type,
        args.expect_start_time.unwrap_or(now),
        args.window,
    )
    .with_triggered_time(now)
    .with_identity(args.user_id, args.project_id);
    if let Some(trigger_id) = args.trigger_id {
        params = params.with_trigger(trigger_id);
    }

    let outcome = engine.run(&definition, &params).await?;
    println!("{}", describe(&outcome));
    Ok(())
}

fn describe(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Executed { log_id, state } => match log_id {
            Some(id) => format!("executed: {state} (log {id})"),
            None => format!("executed: {state} (no log entry)"),
        },
        RunOutcome::Resumed { log_id, state } => format!("resumed: {state} (log {log_id})"),
        RunOutcome::Dropped { log_id } => match log_id {
            Some(id) => format!("dropped: out of window (log {id})"),
            None => "dropped: out of window".to_string(),
        },
        RunOutcome::Skipped(reason) => format!("skipped: {reason:?}"),
    }
}
