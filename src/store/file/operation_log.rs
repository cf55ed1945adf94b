//! File-based operation log storage implementation.
//!
//! Stores each operation's history as a JSONL file at
//! `{logs_dir}/{operation_id}.jsonl`, oldest entry first.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::operation::{LogFilter, OperationExecutionLog};
use crate::store::error::{StorageError, StorageResult};
use crate::store::operation_log::{OperationLogStore, prune_plan};
use crate::sync::{DEFAULT_MAX_IDLE_AGE, KeyedLocks};

/// File-based implementation of `OperationLogStore`.
///
/// Appends are plain JSONL appends. Saves and prunes rewrite the whole file
/// atomically, which is cheap because retention keeps files short.
#[derive(Clone)]
pub struct FileOperationLogStore {
    logs_dir: PathBuf,
    /// Per-operation locks to serialize operations.
    locks: KeyedLocks,
}

impl FileOperationLogStore {
    /// Create a new file operation log store.
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            locks: KeyedLocks::new(),
        }
    }

    /// Directory holding the log files.
    pub fn path(&self) -> &Path {
        &self.logs_dir
    }

    /// Get the log file path for an operation.
    fn log_path(&self, operation_id: &str) -> StorageResult<PathBuf> {
        if operation_id.is_empty()
            || operation_id == "."
            || operation_id == ".."
            || operation_id.contains(['/', '\\'])
        {
            return Err(StorageError::backend(format!(
                "operation id '{operation_id}' cannot be used as a file name"
            )));
        }
        Ok(self.logs_dir.join(format!("{}.jsonl", operation_id)))
    }

    /// Ensure the logs directory exists.
    async fn ensure_dir(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.logs_dir)
            .await
            .map_err(|e| StorageError::file_io(&self.logs_dir, e))
    }

    /// Read every entry of one log file. A missing file is an empty log.
    ///
    /// Corrupt lines are skipped with a warning and dropped on the next
    /// rewrite, so one bad line never blocks the operation's log.
    async fn read_entries(path: &Path) -> StorageResult<Vec<OperationExecutionLog>> {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::file_io(path, e)),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping corrupt operation log line"
                    );
                }
            }
        }
        Ok(entries)
    }

    /// Replace the file's content with `entries`.
    async fn write_entries(path: &Path, entries: &[OperationExecutionLog]) -> StorageResult<()> {
        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }

        let temp_path = path.with_extension("jsonl.tmp");
        super::atomic_write_file(&temp_path, path, content.as_bytes()).await
    }

    /// List the log files in the logs directory.
    async fn log_files(&self) -> StorageResult<Vec<PathBuf>> {
        let mut dir = match fs::read_dir(&self.logs_dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::file_io(&self.logs_dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::file_io(&self.logs_dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl OperationLogStore for FileOperationLogStore {
    async fn create(&self, entry: &OperationExecutionLog) -> StorageResult<()> {
        let path = self.log_path(&entry.operation_id)?;
        let lock = self.locks.get(&entry.operation_id);
        let _guard = lock.lock().await;

        self.ensure_dir().await?;

        if entry.is_in_progress() {
            let existing = Self::read_entries(&path).await?;
            if existing.iter().any(OperationExecutionLog::is_in_progress) {
                return Err(StorageError::conflict(
                    &entry.operation_id,
                    "an in-progress log already exists",
                ));
            }
        }

        let mut line =
            serde_json::to_string(entry).map_err(|e| StorageError::serialization(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;

        file.sync_data()
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;

        debug!(
            operation_id = %entry.operation_id,
            log_id = %entry.id,
            state = %entry.state,
            "Operation log created"
        );
        Ok(())
    }

    async fn save(&self, entry: &OperationExecutionLog) -> StorageResult<()> {
        let path = self.log_path(&entry.operation_id)?;
        let lock = self.locks.get(&entry.operation_id);
        let _guard = lock.lock().await;

        let mut entries = Self::read_entries(&path).await?;
        let slot = entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| StorageError::not_found("operation log", &entry.id))?;
        *slot = entry.clone();

        Self::write_entries(&path, &entries).await
    }

    async fn query(
        &self,
        filter: &LogFilter,
        limit: usize,
    ) -> StorageResult<Vec<OperationExecutionLog>> {
        if let Some(operation_id) = &filter.operation_id {
            let path = self.log_path(operation_id)?;
            let lock = self.locks.get(operation_id);
            let _guard = lock.lock().await;

            let entries = Self::read_entries(&path).await?;
            return Ok(entries
                .into_iter()
                .filter(|e| filter.matches(e))
                .take(limit)
                .collect());
        }

        let mut matched = Vec::new();
        for path in self.log_files().await? {
            matched.extend(
                Self::read_entries(&path)
                    .await?
                    .into_iter()
                    .filter(|e| filter.matches(e)),
            );
        }
        matched.sort_by_key(|e| e.actual_start_time);
        matched.truncate(limit);
        Ok(matched)
    }

    async fn delete_oldest(&self, operation_id: &str, keep: usize) -> StorageResult<usize> {
        let path = self.log_path(operation_id)?;
        let lock = self.locks.get(operation_id);
        let _guard = lock.lock().await;

        let entries = Self::read_entries(&path).await?;
        let doomed = prune_plan(&entries, keep);
        if !doomed.is_empty() {
            let kept: Vec<OperationExecutionLog> = entries
                .iter()
                .enumerate()
                .filter(|(index, _)| !doomed.contains(index))
                .map(|(_, e)| e.clone())
                .collect();
            Self::write_entries(&path, &kept).await?;

            debug!(
                operation_id = %operation_id,
                before = entries.len(),
                after = kept.len(),
                "Pruned operation log"
            );
        }

        self.locks.cleanup_stale(DEFAULT_MAX_IDLE_AGE);
        Ok(doomed.len())
    }
}
