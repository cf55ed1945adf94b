//! `protect`: take a checkpoint of a protection plan.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::client::{BackupClient, CheckpointStatus};

use super::context::OperationContext;
use super::definition::{OperationDefinition, RunParameters};
use super::error::Result;
use super::lifecycle::Progress;
use super::log::OperationExecutionLog;
use super::{Completion, Operation};

/// `extend_info` key holding the checkpoint created by an attempt.
pub const CHECKPOINT_ID_KEY: &str = "checkpoint_id";

/// Value of `created_by` on checkpoints the engine creates.
const CREATED_BY: &str = "operation-engine";

/// Creates a checkpoint of `plan_id` on `provider_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectOperation;

impl ProtectOperation {
    pub const KIND: &'static str = "protect";

    async fn create(
        &self,
        client: &dyn BackupClient,
        definition: &OperationDefinition,
        params: &RunParameters,
        progress: &mut Progress<'_>,
    ) -> Result<Completion> {
        let provider_id = definition.require_uuid("provider_id")?;
        let plan_id = definition.require_uuid("plan_id")?;

        let checkpoint = client
            .create_checkpoint(provider_id, plan_id, &checkpoint_extra_info(params))
            .await?;
        info!(
            operation_id = %params.operation_id,
            plan_id,
            checkpoint_id = %checkpoint.id,
            status = %checkpoint.status,
            "Checkpoint created"
        );

        progress.record(CHECKPOINT_ID_KEY, checkpoint.id.clone()).await;
        Ok(Completion::success().with_field(CHECKPOINT_ID_KEY, checkpoint.id))
    }
}

#[async_trait]
impl Operation for ProtectOperation {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn validate_definition(&self, definition: &OperationDefinition) -> Result<()> {
        definition.require_uuid("provider_id")?;
        definition.require_uuid("plan_id")?;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &OperationContext,
        definition: &OperationDefinition,
        params: &RunParameters,
        progress: &mut Progress<'_>,
    ) -> Result<Completion> {
        self.validate_definition(definition)?;
        let client = ctx
            .clients()
            .client_for(&params.user_id, &params.project_id)
            .await?;
        self.create(client.as_ref(), definition, params, progress)
            .await
    }

    async fn resume(
        &self,
        ctx: &OperationContext,
        definition: &OperationDefinition,
        params: &RunParameters,
        entry: &OperationExecutionLog,
        progress: &mut Progress<'_>,
    ) -> Result<Completion> {
        self.validate_definition(definition)?;
        let provider_id = definition.require_uuid("provider_id")?;
        let client = ctx
            .clients()
            .client_for(&params.user_id, &params.project_id)
            .await?;

        let Some(checkpoint_id) = entry.extend_str(CHECKPOINT_ID_KEY) else {
            info!(
                operation_id = %params.operation_id,
                log_id = %entry.id,
                "No checkpoint recorded for interrupted attempt, creating one"
            );
            return self
                .create(client.as_ref(), definition, params, progress)
                .await;
        };

        let Some(checkpoint) = client.get_checkpoint(provider_id, checkpoint_id).await? else {
            warn!(
                operation_id = %params.operation_id,
                checkpoint_id,
                "Recorded checkpoint no longer exists, creating a new one"
            );
            return self
                .create(client.as_ref(), definition, params, progress)
                .await;
        };

        let completion = match checkpoint.status {
            CheckpointStatus::Available
            | CheckpointStatus::Protecting
            | CheckpointStatus::Unknown => Completion::success(),
            status @ (CheckpointStatus::Error
            | CheckpointStatus::Deleting
            | CheckpointStatus::Deleted
            | CheckpointStatus::ErrorDeleting) => {
                Completion::failed(format!("checkpoint {checkpoint_id} is {status}"))
            }
        };
        info!(
            operation_id = %params.operation_id,
            checkpoint_id,
            status = %checkpoint.status,
            state = %completion.state,
            "Reconciled interrupted checkpoint"
        );
        Ok(completion.with_field(CHECKPOINT_ID_KEY, checkpoint_id))
    }
}

/// `extra_info` attached to checkpoints the engine creates.
fn checkpoint_extra_info(params: &RunParameters) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert("created_by".into(), CREATED_BY.into());
    if let Some(trigger_id) = &params.trigger_id {
        extra.insert("trigger_id".into(), trigger_id.clone().into());
    }
    extra.insert(
        "scheduled_operation_id".into(),
        params.operation_id.clone().into(),
    );
    extra
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::operation::RunType;

    #[test]
    fn validate_requires_uuids() {
        let op = ProtectOperation;
        let valid = OperationDefinition::new("protect")
            .with_provider("cf56bd3e-97a7-4078-b6d5-f36246333fd9")
            .with_plan("3523a271-68aa-42f5-b9ba-56e5200a2ebb");
        assert!(op.validate_definition(&valid).is_ok());

        let missing_plan = OperationDefinition::new("protect")
            .with_provider("cf56bd3e-97a7-4078-b6d5-f36246333fd9");
        assert!(op.validate_definition(&missing_plan).unwrap_err().is_validation());
    }

    #[test]
    fn extra_info_tags_engine_checkpoints() {
        let params =
            RunParameters::new("op-1", RunType::New, Utc::now(), 60).with_trigger("trig-1");
        assert_eq!(
            Value::Object(checkpoint_extra_info(&params)),
            json!({
                "created_by": "operation-engine",
                "trigger_id": "trig-1",
                "scheduled_operation_id": "op-1",
            })
        );
    }

    #[test]
    fn extra_info_omits_missing_trigger() {
        let params = RunParameters::new("op-1", RunType::New, Utc::now(), 60);
        assert!(!checkpoint_extra_info(&params).contains_key("trigger_id"));
    }
}
