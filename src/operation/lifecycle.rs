//! Log lifecycle helpers.
//!
//! Every helper returns a [`StorageResult`]. The driver decides, at each call
//! site, to log and drop the error: losing a log write must never block the
//! backup action itself.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::{OperationLogStore, StorageResult};

use super::definition::RunParameters;
use super::log::{ExecutionState, LogFilter, LogUpdates, OperationExecutionLog};

/// Number of in-progress entries fetched when looking for one to resume.
///
/// Two is enough to tell "exactly one" from "more than one".
const IN_PROGRESS_PROBE_LIMIT: usize = 2;

/// Thin wrapper around the log store implementing the entry lifecycle.
#[derive(Clone)]
pub struct LogBook {
    store: Arc<dyn OperationLogStore>,
}

impl LogBook {
    pub fn new(store: Arc<dyn OperationLogStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn OperationLogStore> {
        &self.store
    }

    /// Build and persist a new entry for this firing.
    ///
    /// The entry starts `in_progress` with `actual_start_time = now`; `overrides`
    /// may replace the state and set any other field.
    pub async fn create_log(
        &self,
        params: &RunParameters,
        overrides: LogUpdates,
    ) -> StorageResult<OperationExecutionLog> {
        let mut entry = OperationExecutionLog {
            id: OperationExecutionLog::generate_id(),
            operation_id: params.operation_id.clone(),
            expect_start_time: params.expect_start_time,
            triggered_time: params.triggered_time,
            actual_start_time: Utc::now(),
            end_time: None,
            state: ExecutionState::InProgress,
            extend_info: Default::default(),
            error: None,
        };
        overrides.apply_to(&mut entry);

        self.store.create(&entry).await?;
        debug!(
            operation_id = %entry.operation_id,
            log_id = %entry.id,
            state = %entry.state,
            "Created operation log"
        );
        Ok(entry)
    }

    /// Apply `updates` to `entry` and persist it. No-op if `entry` is absent.
    pub async fn update_log(
        &self,
        entry: &mut Option<OperationExecutionLog>,
        updates: LogUpdates,
    ) -> StorageResult<()> {
        let Some(entry) = entry.as_mut() else {
            return Ok(());
        };
        if updates.is_empty() {
            return Ok(());
        }
        updates.apply_to(entry);
        self.store.save(entry).await
    }

    /// Move `entry` to `state`, stamping `end_time = now` unless `extra` sets it.
    pub async fn finish_log(
        &self,
        entry: &mut Option<OperationExecutionLog>,
        state: ExecutionState,
        extra: LogUpdates,
    ) -> StorageResult<()> {
        let mut updates = extra.state(state);
        if updates.end_time.is_none() {
            updates = updates.end_time(Utc::now());
        }
        self.update_log(entry, updates).await
    }

    /// Delete the oldest entries of `operation_id` beyond `keep`.
    pub async fn prune_logs(&self, operation_id: &str, keep: usize) -> StorageResult<usize> {
        let deleted = self.store.delete_oldest(operation_id, keep).await?;
        if deleted > 0 {
            debug!(operation_id, deleted, keep, "Pruned operation logs");
        }
        Ok(deleted)
    }

    /// Fetch up to two `in_progress` entries of `operation_id`.
    pub async fn in_progress(
        &self,
        operation_id: &str,
    ) -> StorageResult<Vec<OperationExecutionLog>> {
        let filter = LogFilter::new()
            .operation(operation_id)
            .state(ExecutionState::InProgress);
        self.store.query(&filter, IN_PROGRESS_PROBE_LIMIT).await
    }

    /// The newest `limit` entries of `operation_id`, oldest first.
    pub async fn history(
        &self,
        operation_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<OperationExecutionLog>> {
        let filter = LogFilter::new().operation(operation_id);
        let mut entries = self.store.query(&filter, usize::MAX).await?;
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
        Ok(entries)
    }
}

/// Handle through which a running operation records intermediate progress on
/// its log entry (e.g. the id of a checkpoint it just created).
///
/// Writes are best-effort like every other log write: failures are logged and
/// the operation carries on.
pub struct Progress<'a> {
    logs: &'a LogBook,
    entry: &'a mut Option<OperationExecutionLog>,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(logs: &'a LogBook, entry: &'a mut Option<OperationExecutionLog>) -> Self {
        Self { logs, entry }
    }

    /// Id of the log entry, if one could be created.
    pub fn log_id(&self) -> Option<&str> {
        self.entry.as_ref().map(|entry| entry.id.as_str())
    }

    /// Persist `key = value` in the entry's `extend_info`.
    pub async fn record(&mut self, key: &str, value: impl Into<Value> + Send) {
        let updates = LogUpdates::new().field(key, value);
        if let Err(e) = self.logs.update_log(&mut *self.entry, updates).await {
            warn!(
                log_id = self.log_id().unwrap_or_default(),
                key,
                error = %e,
                "Failed to record operation progress"
            );
        }
    }
}
