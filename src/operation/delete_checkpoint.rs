//! `delete_checkpoint`: remove an existing checkpoint.

use async_trait::async_trait;
use tracing::info;

use crate::client::{BackupClient, CheckpointStatus};

use super::context::OperationContext;
use super::definition::{OperationDefinition, RunParameters};
use super::error::Result;
use super::lifecycle::Progress;
use super::log::OperationExecutionLog;
use super::protect::CHECKPOINT_ID_KEY;
use super::{Completion, Operation};

/// Deletes `checkpoint_id` on `provider_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteCheckpointOperation;

impl DeleteCheckpointOperation {
    pub const KIND: &'static str = "delete_checkpoint";

    async fn delete(
        &self,
        client: &dyn BackupClient,
        provider_id: &str,
        checkpoint_id: &str,
        params: &RunParameters,
    ) -> Result<Completion> {
        client.delete_checkpoint(provider_id, checkpoint_id).await?;
        info!(
            operation_id = %params.operation_id,
            checkpoint_id,
            "Checkpoint deletion requested"
        );
        Ok(Completion::success().with_field(CHECKPOINT_ID_KEY, checkpoint_id))
    }
}

#[async_trait]
impl Operation for DeleteCheckpointOperation {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn validate_definition(&self, definition: &OperationDefinition) -> Result<()> {
        definition.require_uuid("provider_id")?;
        definition.require_uuid("checkpoint_id")?;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &OperationContext,
        definition: &OperationDefinition,
        params: &RunParameters,
        progress: &mut Progress<'_>,
    ) -> Result<Completion> {
        let provider_id = definition.require_uuid("provider_id")?;
        let checkpoint_id = definition.require_uuid("checkpoint_id")?;
        progress.record(CHECKPOINT_ID_KEY, checkpoint_id).await;

        let client = ctx
            .clients()
            .client_for(&params.user_id, &params.project_id)
            .await?;
        self.delete(client.as_ref(), provider_id, checkpoint_id, params)
            .await
    }

    async fn resume(
        &self,
        ctx: &OperationContext,
        definition: &OperationDefinition,
        params: &RunParameters,
        _entry: &OperationExecutionLog,
        _progress: &mut Progress<'_>,
    ) -> Result<Completion> {
        let provider_id = definition.require_uuid("provider_id")?;
        let checkpoint_id = definition.require_uuid("checkpoint_id")?;
        let client = ctx
            .clients()
            .client_for(&params.user_id, &params.project_id)
            .await?;

        match client.get_checkpoint(provider_id, checkpoint_id).await? {
            None => {
                info!(
                    operation_id = %params.operation_id,
                    checkpoint_id,
                    "Checkpoint already gone"
                );
                Ok(Completion::success().with_field(CHECKPOINT_ID_KEY, checkpoint_id))
            }
            Some(checkpoint)
                if matches!(
                    checkpoint.status,
                    CheckpointStatus::Deleting | CheckpointStatus::Deleted
                ) =>
            {
                info!(
                    operation_id = %params.operation_id,
                    checkpoint_id,
                    status = %checkpoint.status,
                    "Delete already accepted"
                );
                Ok(Completion::success().with_field(CHECKPOINT_ID_KEY, checkpoint_id))
            }
            Some(_) => {
                self.delete(client.as_ref(), provider_id, checkpoint_id, params)
                    .await
            }
        }
    }
}
