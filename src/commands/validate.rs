//! `opengine validate`: check a definition against its kind.

use std::path::Path;

use anyhow::Result;

use opengine::operation::OperationRegistry;

pub async fn run(definition_path: &Path) -> Result<()> {
    let definition = super::load_definition(definition_path).await?;
    let registry = OperationRegistry::with_defaults();

    registry
        .resolve(&definition.kind)?
        .validate_definition(&definition)?;

    println!(
        "Definition '{}' is a valid '{}' operation",
        definition_path.display(),
        definition.kind
    );
    Ok(())
}
