//! Common test utilities.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};

use opengine::client::{
    self, AuthContext, BackupClient, BackupClientFactory, Checkpoint, CheckpointStatus,
    ClientError, EndpointTemplate, StaticCredentialResolver,
};
use opengine::operation::{
    ClientProvider, Completion, ExecutionState, LogFilter, Operation, OperationContext,
    OperationDefinition, OperationError, OperationExecutionLog, Progress, RunParameters,
};
use opengine::store::{
    InMemoryOperationLogStore, OperationLogStore, StorageError, StorageResult,
};

pub const PROVIDER_ID: &str = "cf56bd3e-97a7-4078-b6d5-f36246333fd9";
pub const PLAN_ID: &str = "3523a271-68aa-42f5-b9ba-56e5200a2ebb";
pub const CHECKPOINT_ID: &str = "b1d3c4a0-4d9a-4c39-a8d0-2a0d1c5e9f11";

// ============================================================================
// Fake operation
// ============================================================================

/// What the fake operation returns from `execute`/`resume`.
#[derive(Clone)]
pub enum Behaviour {
    Succeed,
    Fail(String),
    Error(String),
}

/// Operation that records how the driver called it.
pub struct RecordingOperation {
    behaviour: Behaviour,
    pub executions: Mutex<usize>,
    pub resumed: Mutex<Vec<OperationExecutionLog>>,
    pub progress_log_ids: Mutex<Vec<Option<String>>>,
}

impl RecordingOperation {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            executions: Mutex::new(0),
            resumed: Mutex::new(Vec::new()),
            progress_log_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Behaviour::Succeed)
    }

    pub fn execute_count(&self) -> usize {
        *self.executions.lock().unwrap()
    }

    pub fn resume_count(&self) -> usize {
        self.resumed.lock().unwrap().len()
    }

    fn outcome(&self) -> opengine::operation::Result<Completion> {
        match &self.behaviour {
            Behaviour::Succeed => Ok(Completion::success().with_field("fake", true)),
            Behaviour::Fail(message) => Ok(Completion::failed(message.clone())),
            Behaviour::Error(message) => {
                Err(OperationError::Timeout(message.clone()))
            }
        }
    }
}

#[async_trait]
impl Operation for RecordingOperation {
    fn kind(&self) -> &'static str {
        "recording"
    }

    fn validate_definition(
        &self,
        _definition: &OperationDefinition,
    ) -> opengine::operation::Result<()> {
        Ok(())
    }

    async fn execute(
        &self,
        _ctx: &OperationContext,
        _definition: &OperationDefinition,
        _params: &RunParameters,
        progress: &mut Progress<'_>,
    ) -> opengine::operation::Result<Completion> {
        *self.executions.lock().unwrap() += 1;
        self.progress_log_ids
            .lock()
            .unwrap()
            .push(progress.log_id().map(str::to_string));
        progress.record("step", "started").await;
        self.outcome()
    }

    async fn resume(
        &self,
        _ctx: &OperationContext,
        _definition: &OperationDefinition,
        _params: &RunParameters,
        entry: &OperationExecutionLog,
        _progress: &mut Progress<'_>,
    ) -> opengine::operation::Result<Completion> {
        self.resumed.lock().unwrap().push(entry.clone());
        self.outcome()
    }
}

// ============================================================================
// Failing store
// ============================================================================

/// In-memory store whose operations can be made to fail.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: InMemoryOperationLogStore,
    pub fail_create: Arc<AtomicBool>,
    pub fail_save: Arc<AtomicBool>,
    pub fail_query: Arc<AtomicBool>,
    pub fail_delete: Arc<AtomicBool>,
    /// When set, in-progress queries return these entries instead.
    pub forced_in_progress: Arc<Mutex<Option<Vec<OperationExecutionLog>>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_in_progress(&self, entries: Vec<OperationExecutionLog>) {
        *self.forced_in_progress.lock().unwrap() = Some(entries);
    }

    fn check(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::backend(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OperationLogStore for FlakyStore {
    async fn create(&self, entry: &OperationExecutionLog) -> StorageResult<()> {
        Self::check(&self.fail_create, "create")?;
        self.inner.create(entry).await
    }

    async fn save(&self, entry: &OperationExecutionLog) -> StorageResult<()> {
        Self::check(&self.fail_save, "save")?;
        self.inner.save(entry).await
    }

    async fn query(
        &self,
        filter: &LogFilter,
        limit: usize,
    ) -> StorageResult<Vec<OperationExecutionLog>> {
        Self::check(&self.fail_query, "query")?;
        if filter.state == Some(ExecutionState::InProgress) {
            let forced = self.forced_in_progress.lock().unwrap().clone();
            if let Some(entries) = forced {
                return Ok(entries.into_iter().take(limit).collect());
            }
        }
        self.inner.query(filter, limit).await
    }

    async fn delete_oldest(&self, operation_id: &str, keep: usize) -> StorageResult<usize> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete_oldest(operation_id, keep).await
    }
}

// ============================================================================
// Fake backup API
// ============================================================================

/// In-memory backup API recording every call.
#[derive(Default)]
pub struct FakeBackupClient {
    pub checkpoints: Mutex<HashMap<String, Checkpoint>>,
    pub created: Mutex<Vec<(String, String, Map<String, Value>)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_create: AtomicBool,
    next_id: Mutex<u32>,
}

impl FakeBackupClient {
    pub fn insert(&self, id: &str, status: CheckpointStatus) {
        self.checkpoints.lock().unwrap().insert(
            id.to_string(),
            Checkpoint {
                id: id.to_string(),
                status,
                extra_info: Map::new(),
            },
        );
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl BackupClient for FakeBackupClient {
    async fn create_checkpoint(
        &self,
        provider_id: &str,
        plan_id: &str,
        extra_info: &Map<String, Value>,
    ) -> client::Result<Checkpoint> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 503,
                message: "provider unavailable".into(),
            });
        }
        self.created.lock().unwrap().push((
            provider_id.to_string(),
            plan_id.to_string(),
            extra_info.clone(),
        ));

        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("cp-{}", *next)
        };
        let checkpoint = Checkpoint {
            id: id.clone(),
            status: CheckpointStatus::Protecting,
            extra_info: extra_info.clone(),
        };
        self.checkpoints
            .lock()
            .unwrap()
            .insert(id, checkpoint.clone());
        Ok(checkpoint)
    }

    async fn get_checkpoint(
        &self,
        _provider_id: &str,
        checkpoint_id: &str,
    ) -> client::Result<Option<Checkpoint>> {
        Ok(self.checkpoints.lock().unwrap().get(checkpoint_id).cloned())
    }

    async fn delete_checkpoint(
        &self,
        _provider_id: &str,
        checkpoint_id: &str,
    ) -> client::Result<()> {
        self.deleted.lock().unwrap().push(checkpoint_id.to_string());
        match self.checkpoints.lock().unwrap().remove(checkpoint_id) {
            Some(_) => Ok(()),
            None => Err(ClientError::Api {
                status: 404,
                message: format!("checkpoint {checkpoint_id} not found"),
            }),
        }
    }
}

/// Factory handing out one shared fake client.
pub struct FakeClientFactory {
    pub client: Arc<FakeBackupClient>,
    pub auths: Mutex<Vec<(AuthContext, String)>>,
}

impl FakeClientFactory {
    pub fn new(client: Arc<FakeBackupClient>) -> Self {
        Self {
            client,
            auths: Mutex::new(Vec::new()),
        }
    }
}

impl BackupClientFactory for FakeClientFactory {
    fn create(&self, auth: &AuthContext, endpoint: &str) -> client::Result<Arc<dyn BackupClient>> {
        self.auths
            .lock()
            .unwrap()
            .push((auth.clone(), endpoint.to_string()));
        let client: Arc<dyn BackupClient> = self.client.clone();
        Ok(client)
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Client provider backed by a fake API and a static token.
pub fn fake_clients(client: Arc<FakeBackupClient>) -> ClientProvider {
    ClientProvider::new(
        Arc::new(StaticCredentialResolver::new(Some("test-token".into()))),
        Arc::new(FakeClientFactory::new(client)),
        EndpointTemplate::new("http://backup.test/v1/$(tenant_id)s"),
    )
}

/// Context over `store` with retention `keep` and a fake backup API.
pub fn context(store: Arc<dyn OperationLogStore>, keep: usize) -> OperationContext {
    OperationContext::new(store, fake_clients(Arc::new(FakeBackupClient::default())))
        .with_retained_log_count(keep)
}

/// A terminal entry for `operation_id`, started `age_minutes` ago.
pub fn finished_entry(operation_id: &str, age_minutes: i64) -> OperationExecutionLog {
    let started = Utc::now() - TimeDelta::minutes(age_minutes);
    OperationExecutionLog {
        id: OperationExecutionLog::generate_id(),
        operation_id: operation_id.to_string(),
        expect_start_time: started,
        triggered_time: started,
        actual_start_time: started,
        end_time: Some(started + TimeDelta::seconds(30)),
        state: ExecutionState::Success,
        extend_info: Map::new(),
        error: None,
    }
}

/// An in-progress entry for `operation_id` started at `started`.
pub fn in_progress_entry(operation_id: &str, started: DateTime<Utc>) -> OperationExecutionLog {
    OperationExecutionLog {
        id: OperationExecutionLog::generate_id(),
        operation_id: operation_id.to_string(),
        expect_start_time: started,
        triggered_time: started,
        actual_start_time: started,
        end_time: None,
        state: ExecutionState::InProgress,
        extend_info: Map::new(),
        error: None,
    }
}

pub fn protect_definition() -> OperationDefinition {
    OperationDefinition::new("protect")
        .with_provider(PROVIDER_ID)
        .with_plan(PLAN_ID)
}
