//! File-based storage implementations.
//!
//! Operation logs are stored as JSONL, one file per operation id. Rewrites
//! go through a temp file plus rename so a crash never leaves a torn file.

mod operation_log;

pub use operation_log::FileOperationLogStore;

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::{StorageError, StorageResult};

/// Write `content` to `temp_path`, fsync it, then rename it over `path`.
pub(crate) async fn atomic_write_file(
    temp_path: &Path,
    path: &Path,
    content: &[u8],
) -> StorageResult<()> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| StorageError::file_io(temp_path, e))?;
    file.write_all(content)
        .await
        .map_err(|e| StorageError::file_io(temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::file_io(temp_path, e))?;
    drop(file);

    fs::rename(temp_path, path)
        .await
        .map_err(|e| StorageError::file_io(path, e))
}
