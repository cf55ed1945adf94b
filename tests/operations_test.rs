mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use serde_json::json;

use common::{
    CHECKPOINT_ID, FakeBackupClient, PLAN_ID, PROVIDER_ID, fake_clients, in_progress_entry,
    protect_definition,
};
use opengine::client::CheckpointStatus;
use opengine::operation::{
    DeleteCheckpointOperation, ExecutionState, OperationContext, OperationDefinition,
    OperationError, OperationExecutionLog, ProtectOperation, RunOutcome, RunParameters, RunType,
    run,
};
use opengine::store::{InMemoryOperationLogStore, OperationLogStore};

const OP: &str = "op-protect";

struct Harness {
    store: InMemoryOperationLogStore,
    api: Arc<FakeBackupClient>,
    ctx: OperationContext,
}

fn harness() -> Harness {
    let store = InMemoryOperationLogStore::new();
    let api = Arc::new(FakeBackupClient::default());
    let ctx = OperationContext::new(Arc::new(store.clone()), fake_clients(api.clone()));
    Harness { store, api, ctx }
}

fn params(run_type: RunType) -> RunParameters {
    RunParameters::new(OP, run_type, Utc::now(), 300)
        .with_identity("user-1", "project-1")
        .with_trigger("trigger-1")
}

async fn seed_in_progress(
    store: &InMemoryOperationLogStore,
    checkpoint_id: Option<&str>,
) -> OperationExecutionLog {
    let mut entry = in_progress_entry(OP, Utc::now());
    if let Some(id) = checkpoint_id {
        entry.extend_info.insert("checkpoint_id".into(), json!(id));
    }
    store.create(&entry).await.unwrap();
    entry
}

// ============================================================================
// protect
// ============================================================================

#[tokio::test]
async fn protect_creates_checkpoint_and_records_id() {
    let h = harness();

    let outcome = run(&ProtectOperation, &h.ctx, &protect_definition(), &params(RunType::New))
        .await
        .unwrap();

    assert_eq!(outcome.state(), Some(ExecutionState::Success));
    let created = h.api.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    let (provider, plan, extra) = &created[0];
    assert_eq!(provider, PROVIDER_ID);
    assert_eq!(plan, PLAN_ID);
    assert_eq!(
        serde_json::Value::Object(extra.clone()),
        json!({
            "created_by": "operation-engine",
            "trigger_id": "trigger-1",
            "scheduled_operation_id": OP,
        })
    );

    let entry = h.store.all().await.remove(0);
    assert_eq!(entry.state, ExecutionState::Success);
    assert_eq!(entry.extend_str("checkpoint_id"), Some("cp-1"));
}

#[tokio::test]
async fn protect_api_failure_propagates_and_fails_entry() {
    let h = harness();
    h.api.fail_create.store(true, Ordering::SeqCst);

    let err = run(&ProtectOperation, &h.ctx, &protect_definition(), &params(RunType::New))
        .await
        .unwrap_err();

    assert!(matches!(err, OperationError::Client(_)));
    let entry = h.store.all().await.remove(0);
    assert_eq!(entry.state, ExecutionState::Failed);
    assert!(entry.error.unwrap().contains("provider unavailable"));
}

#[tokio::test]
async fn protect_invalid_definition_fails_entry_without_remote_call() {
    let h = harness();
    let definition = OperationDefinition::new("protect").with_provider(PROVIDER_ID);

    let err = run(&ProtectOperation, &h.ctx, &definition, &params(RunType::New))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(h.api.create_count(), 0);
    assert_eq!(h.store.all().await[0].state, ExecutionState::Failed);
}

#[tokio::test]
async fn protect_resume_available_checkpoint_succeeds() {
    let h = harness();
    h.api.insert("cp-existing", CheckpointStatus::Available);
    let pending = seed_in_progress(&h.store, Some("cp-existing")).await;

    let outcome = run(&ProtectOperation, &h.ctx, &protect_definition(), &params(RunType::Resume))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Resumed {
            log_id: pending.id,
            state: ExecutionState::Success,
        }
    );
    assert_eq!(h.api.create_count(), 0);
}

#[tokio::test]
async fn protect_resume_protecting_checkpoint_succeeds() {
    let h = harness();
    h.api.insert("cp-running", CheckpointStatus::Protecting);
    seed_in_progress(&h.store, Some("cp-running")).await;

    let outcome = run(&ProtectOperation, &h.ctx, &protect_definition(), &params(RunType::Resume))
        .await
        .unwrap();

    assert_eq!(outcome.state(), Some(ExecutionState::Success));
    assert_eq!(h.api.create_count(), 0);
}

#[tokio::test]
async fn protect_resume_errored_checkpoint_fails() {
    let h = harness();
    h.api.insert("cp-bad", CheckpointStatus::Error);
    seed_in_progress(&h.store, Some("cp-bad")).await;

    let outcome = run(&ProtectOperation, &h.ctx, &protect_definition(), &params(RunType::Resume))
        .await
        .unwrap();

    assert_eq!(outcome.state(), Some(ExecutionState::Failed));
    let entry = h.store.all().await.remove(0);
    assert_eq!(entry.error.as_deref(), Some("checkpoint cp-bad is error"));
    assert_eq!(entry.extend_str("checkpoint_id"), Some("cp-bad"));
}

#[tokio::test]
async fn protect_resume_without_recorded_checkpoint_redrives() {
    let h = harness();
    seed_in_progress(&h.store, None).await;

    let outcome = run(&ProtectOperation, &h.ctx, &protect_definition(), &params(RunType::Resume))
        .await
        .unwrap();

    assert_eq!(outcome.state(), Some(ExecutionState::Success));
    assert_eq!(h.api.create_count(), 1);
    assert_eq!(
        h.store.all().await[0].extend_str("checkpoint_id"),
        Some("cp-1")
    );
}

#[tokio::test]
async fn protect_resume_missing_checkpoint_redrives() {
    let h = harness();
    seed_in_progress(&h.store, Some("cp-vanished")).await;

    run(&ProtectOperation, &h.ctx, &protect_definition(), &params(RunType::Resume))
        .await
        .unwrap();

    assert_eq!(h.api.create_count(), 1);
    assert_eq!(
        h.store.all().await[0].extend_str("checkpoint_id"),
        Some("cp-1")
    );
}

// ============================================================================
// delete_checkpoint
// ============================================================================

fn delete_definition() -> OperationDefinition {
    OperationDefinition::new("delete_checkpoint")
        .with_provider(PROVIDER_ID)
        .with_checkpoint(CHECKPOINT_ID)
}

#[tokio::test]
async fn delete_removes_checkpoint() {
    let h = harness();
    h.api.insert(CHECKPOINT_ID, CheckpointStatus::Available);

    let outcome = run(
        &DeleteCheckpointOperation,
        &h.ctx,
        &delete_definition(),
        &params(RunType::New),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state(), Some(ExecutionState::Success));
    assert_eq!(h.api.deleted.lock().unwrap().as_slice(), &[CHECKPOINT_ID.to_string()]);
    assert!(h.api.checkpoints.lock().unwrap().is_empty());
}

#[tokio::test]
async fn delete_resume_of_gone_checkpoint_succeeds_without_call() {
    let h = harness();
    seed_in_progress(&h.store, Some(CHECKPOINT_ID)).await;

    let outcome = run(
        &DeleteCheckpointOperation,
        &h.ctx,
        &delete_definition(),
        &params(RunType::Resume),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state(), Some(ExecutionState::Success));
    assert!(h.api.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn delete_resume_of_existing_checkpoint_redrives() {
    let h = harness();
    h.api.insert(CHECKPOINT_ID, CheckpointStatus::Available);
    seed_in_progress(&h.store, Some(CHECKPOINT_ID)).await;

    run(
        &DeleteCheckpointOperation,
        &h.ctx,
        &delete_definition(),
        &params(RunType::Resume),
    )
    .await
    .unwrap();

    assert_eq!(h.api.deleted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_resume_of_checkpoint_being_deleted_succeeds_without_call() {
    let h = harness();
    h.api.insert(CHECKPOINT_ID, CheckpointStatus::Deleting);
    seed_in_progress(&h.store, Some(CHECKPOINT_ID)).await;

    let outcome = run(
        &DeleteCheckpointOperation,
        &h.ctx,
        &delete_definition(),
        &params(RunType::Resume),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state(), Some(ExecutionState::Success));
    assert!(h.api.deleted.lock().unwrap().is_empty());
}
