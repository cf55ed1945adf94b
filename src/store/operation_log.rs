//! Operation log storage trait.
//!
//! Defines the interface for persisting execution attempts of scheduled
//! operations.

use async_trait::async_trait;

use crate::operation::{LogFilter, OperationExecutionLog};

use super::error::StorageResult;

/// Storage interface for operation execution logs.
///
/// The engine consumes exactly these four operations. Implementations must give
/// read-your-writes consistency per operation id.
#[async_trait]
pub trait OperationLogStore: Send + Sync {
    /// Persist a new entry.
    ///
    /// An `in_progress` entry must be refused with [`StorageError::Conflict`]
    /// when another `in_progress` entry already exists for the same operation
    /// id, and the check must be atomic with the insert.
    ///
    /// [`StorageError::Conflict`]: super::StorageError::Conflict
    async fn create(&self, entry: &OperationExecutionLog) -> StorageResult<()>;

    /// Overwrite an existing entry, matched by `entry.id`.
    ///
    /// Returns `NotFound` if the entry doesn't exist (e.g. it was pruned).
    async fn save(&self, entry: &OperationExecutionLog) -> StorageResult<()>;

    /// Return at most `limit` entries matching `filter`, oldest first.
    async fn query(
        &self,
        filter: &LogFilter,
        limit: usize,
    ) -> StorageResult<Vec<OperationExecutionLog>>;

    /// Delete the oldest entries of `operation_id` so that at most `keep`
    /// remain. `in_progress` entries are never deleted; the oldest finished
    /// entries go in their place.
    ///
    /// Returns the number of deleted entries.
    async fn delete_oldest(&self, operation_id: &str, keep: usize) -> StorageResult<usize>;
}

/// Pick the entries `delete_oldest` should remove from an oldest-first list.
///
/// Shared by the backends so they agree on retention semantics. In-progress
/// entries count towards `keep` but are skipped, so the count only exceeds
/// `keep` when more than `keep` entries are in progress.
pub(crate) fn prune_plan(entries: &[OperationExecutionLog], keep: usize) -> Vec<usize> {
    let excess = entries.len().saturating_sub(keep);
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.is_in_progress())
        .take(excess)
        .map(|(index, _)| index)
        .collect()
}
