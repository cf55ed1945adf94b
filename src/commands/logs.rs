//! `opengine logs`: print the execution log of an operation.

use std::path::Path;

use anyhow::Result;

use opengine::OperationEngine;
use opengine::config::Config;
use opengine::operation::OperationExecutionLog;

use crate::OutputFormat;

pub async fn run(
    config_path: &str,
    operation_id: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let config = Config::load(config_path).await?;
    let engine = OperationEngine::from_config(&config, Path::new(config_path))?;
    let entries = engine.logs(operation_id, limit).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => render_text(operation_id, &entries),
    }
    Ok(())
}

fn render_text(operation_id: &str, entries: &[OperationExecutionLog]) {
    if entries.is_empty() {
        println!("No log entries for operation '{operation_id}'");
        return;
    }

    println!(
        "{:<34} {:<22} {:<25} {:<25}",
        "ID", "STATE", "STARTED", "ENDED"
    );
    for entry in entries {
        let ended = entry
            .end_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<34} {:<22} {:<25} {:<25}",
            entry.id,
            entry.state,
            entry.actual_start_time.to_rfc3339(),
            ended
        );
        if let Some(error) = &entry.error {
            println!("    error: {error}");
        }
    }
}
