//! Library entry point tying the registry, the context and the driver together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::client::{HttpBackupClientFactory, StaticCredentialResolver};
use crate::config::{self, Config};
use crate::operation::{
    self, ClientProvider, OperationContext, OperationDefinition, OperationExecutionLog,
    OperationRegistry, Result, RunOutcome, RunParameters,
};
use crate::store::{FileOperationLogStore, OperationLogStore, StorageResult};

/// Runs scheduled operations by kind.
#[derive(Clone)]
pub struct OperationEngine {
    registry: OperationRegistry,
    ctx: OperationContext,
}

impl OperationEngine {
    pub fn new(registry: OperationRegistry, ctx: OperationContext) -> Self {
        Self { registry, ctx }
    }

    /// Engine backed by the file store and the HTTP backup client.
    ///
    /// `config_path` anchors relative paths in `config`.
    pub fn from_config(config: &Config, config_path: &Path) -> Result<Self> {
        let log_dir = config::resolve_path(config_path, &config.operation_log.path);
        let store: Arc<dyn OperationLogStore> =
            Arc::new(FileOperationLogStore::new(log_dir.clone()));

        let mut credentials = StaticCredentialResolver::new(config.identity.token.clone());
        for (project_id, token) in &config.identity.project_tokens {
            credentials = credentials.with_project_token(project_id.clone(), token.clone());
        }

        let factory = HttpBackupClientFactory::new(Duration::from_secs(
            config.backup.request_timeout_seconds,
        ))?;

        let clients = ClientProvider::new(
            Arc::new(credentials),
            Arc::new(factory),
            config.backup.endpoint.clone(),
        )
        .with_credential_timeout(Duration::from_secs(config.identity.timeout_seconds));

        let ctx = OperationContext::new(store, clients)
            .with_retained_log_count(config.operation_log.retained_count);

        info!(
            log_dir = %log_dir.display(),
            endpoint = config.backup.endpoint.as_str(),
            retained_count = config.operation_log.retained_count,
            "Operation engine configured"
        );
        Ok(Self::new(OperationRegistry::with_defaults(), ctx))
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn context(&self) -> &OperationContext {
        &self.ctx
    }

    /// Validate `definition` against its kind. No side effects.
    pub fn validate(&self, definition: &OperationDefinition) -> Result<()> {
        self.registry
            .resolve(&definition.kind)?
            .validate_definition(definition)
    }

    /// Run one firing of `definition`.
    pub async fn run(
        &self,
        definition: &OperationDefinition,
        params: &RunParameters,
    ) -> Result<RunOutcome> {
        let op = self.registry.resolve(&definition.kind)?;
        operation::run(op.as_ref(), &self.ctx, definition, params).await
    }

    /// The newest `limit` log entries of `operation_id`, oldest first.
    pub async fn logs(
        &self,
        operation_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<OperationExecutionLog>> {
        self.ctx.logs().history(operation_id, limit).await
    }
}
