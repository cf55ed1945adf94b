//! In-memory operation log store.
//!
//! Used for embedding the engine without durable storage and as the
//! reference backend in tests. Entries live in insertion order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::operation::{LogFilter, OperationExecutionLog};

use super::error::{StorageError, StorageResult};
use super::operation_log::{OperationLogStore, prune_plan};

/// In-memory implementation of `OperationLogStore`.
#[derive(Clone, Default)]
pub struct InMemoryOperationLogStore {
    entries: Arc<RwLock<Vec<OperationExecutionLog>>>,
}

impl InMemoryOperationLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored entry, oldest first.
    pub async fn all(&self) -> Vec<OperationExecutionLog> {
        self.entries.read().await.clone()
    }

    /// Number of entries stored for `operation_id`.
    pub async fn count(&self, operation_id: &str) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.operation_id == operation_id)
            .count()
    }
}

#[async_trait]
impl OperationLogStore for InMemoryOperationLogStore {
    async fn create(&self, entry: &OperationExecutionLog) -> StorageResult<()> {
        let mut entries = self.entries.write().await;

        if entries.iter().any(|e| e.id == entry.id) {
            return Err(StorageError::conflict(&entry.id, "log entry already exists"));
        }
        if entry.is_in_progress()
            && entries
                .iter()
                .any(|e| e.operation_id == entry.operation_id && e.is_in_progress())
        {
            return Err(StorageError::conflict(
                &entry.operation_id,
                "an in-progress log already exists",
            ));
        }

        entries.push(entry.clone());
        Ok(())
    }

    async fn save(&self, entry: &OperationExecutionLog) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        let slot = entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| StorageError::not_found("operation log", &entry.id))?;
        *slot = entry.clone();
        Ok(())
    }

    async fn query(
        &self,
        filter: &LogFilter,
        limit: usize,
    ) -> StorageResult<Vec<OperationExecutionLog>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_oldest(&self, operation_id: &str, keep: usize) -> StorageResult<usize> {
        let mut entries = self.entries.write().await;

        let owned: Vec<OperationExecutionLog> = entries
            .iter()
            .filter(|e| e.operation_id == operation_id)
            .cloned()
            .collect();
        let doomed: Vec<String> = prune_plan(&owned, keep)
            .into_iter()
            .map(|index| owned[index].id.clone())
            .collect();

        entries.retain(|e| !doomed.contains(&e.id));
        Ok(doomed.len())
    }
}
