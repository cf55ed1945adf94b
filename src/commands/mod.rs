//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

use opengine::operation::OperationDefinition;

pub mod logs;
pub mod run;
pub mod validate;

/// Read an operation definition from a YAML or JSON file.
pub async fn load_definition(path: &Path) -> Result<OperationDefinition> {
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read definition '{}'", path.display()))?;
    serde_saphyr::from_str(&contents)
        .with_context(|| format!("failed to parse definition '{}'", path.display()))
}
