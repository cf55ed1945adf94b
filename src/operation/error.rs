//! Operation error types.

use thiserror::Error;

use crate::client::ClientError;
use crate::store::StorageError;

/// Result type for operation and engine calls.
pub type Result<T> = std::result::Result<T, OperationError>;

/// Errors surfaced by operations, the driver and the engine.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The definition is structurally or semantically invalid for its kind.
    #[error("invalid operation definition: {0}")]
    InvalidDefinition(String),

    /// No operation is registered for the definition's kind.
    #[error("unknown operation kind: {0}")]
    UnknownKind(String),

    /// No token could be obtained for the identity.
    #[error("no credentials available for user '{user_id}' in project '{project_id}'")]
    CredentialUnavailable { user_id: String, project_id: String },

    /// A remote call exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl OperationError {
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition(message.into())
    }

    /// Returns true for errors raised before any remote call.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidDefinition(_) | Self::UnknownKind(_))
    }
}
