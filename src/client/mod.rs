//! Backup API client layer.
//!
//! Operations never build HTTP requests themselves. They ask a
//! [`BackupClientFactory`] for a [`BackupClient`] bound to one tenant's
//! endpoint and token, then call the checkpoint operations on it.

mod credentials;
mod endpoint;
mod error;
mod http;

pub use credentials::{CredentialResolver, StaticCredentialResolver};
pub use endpoint::{EndpointTemplate, TENANT_PLACEHOLDER};
pub use error::{ClientError, Result};
pub use http::{HttpBackupClient, HttpBackupClientFactory};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of a checkpoint on the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointStatus {
    Protecting,
    Available,
    Error,
    Deleting,
    Deleted,
    ErrorDeleting,
    #[default]
    #[serde(other)]
    Unknown,
}

impl CheckpointStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protecting => "protecting",
            Self::Available => "available",
            Self::Error => "error",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::ErrorDeleting => "error-deleting",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checkpoint as reported by the backup API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    #[serde(default)]
    pub status: CheckpointStatus,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_info: Map<String, Value>,
}

/// Identity a client acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub token: String,
    pub user_id: String,
    pub project_id: String,
}

/// Remote checkpoint operations for one tenant.
#[async_trait]
pub trait BackupClient: Send + Sync {
    /// Start a checkpoint of `plan_id`. The returned checkpoint is usually
    /// still `protecting`.
    async fn create_checkpoint(
        &self,
        provider_id: &str,
        plan_id: &str,
        extra_info: &Map<String, Value>,
    ) -> Result<Checkpoint>;

    /// Look a checkpoint up. `Ok(None)` means it doesn't exist.
    async fn get_checkpoint(
        &self,
        provider_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<Checkpoint>>;

    async fn delete_checkpoint(&self, provider_id: &str, checkpoint_id: &str) -> Result<()>;
}

/// Builds clients for a rendered endpoint and resolved identity.
pub trait BackupClientFactory: Send + Sync {
    fn create(&self, auth: &AuthContext, endpoint: &str) -> Result<Arc<dyn BackupClient>>;
}
