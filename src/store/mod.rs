//! Storage abstraction layer.
//!
//! The engine only talks to the [`OperationLogStore`] trait. Two backends ship
//! with the crate:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        operation::driver / lifecycle         │
//! └──────────────────────┬───────────────────────┘
//!                        │ uses trait
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │             OperationLogStore                │
//! └──────────┬────────────────────────┬──────────┘
//!            ▼                        ▼
//!   FileOperationLogStore    InMemoryOperationLogStore
//!   (store/file, JSONL)      (store/memory)
//! ```
//!
//! # Naming Conventions
//!
//! - `create` - insert a new entry (conditional for in-progress entries)
//! - `save` - overwrite an existing entry
//! - `query` - filtered, limited read, oldest first
//! - `delete_oldest` - retention pruning

pub mod error;
pub mod file;
pub mod memory;

mod operation_log;

pub use error::{StorageError, StorageResult};
pub use file::FileOperationLogStore;
pub use memory::InMemoryOperationLogStore;
pub use operation_log::OperationLogStore;
