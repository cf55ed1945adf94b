//! Shared context handed to the driver and every operation.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::client::{
    AuthContext, BackupClient, BackupClientFactory, CredentialResolver, EndpointTemplate,
};
use crate::store::OperationLogStore;

use super::error::{OperationError, Result};
use super::lifecycle::LogBook;

/// Default number of log entries kept per operation id.
pub const DEFAULT_RETAINED_LOG_COUNT: usize = 5;

/// Default deadline for resolving a token.
pub const DEFAULT_CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-wide configuration built once at startup and passed by reference.
#[derive(Clone)]
pub struct OperationContext {
    logs: LogBook,
    clients: ClientProvider,
    retained_log_count: usize,
}

impl OperationContext {
    pub fn new(store: Arc<dyn OperationLogStore>, clients: ClientProvider) -> Self {
        Self {
            logs: LogBook::new(store),
            clients,
            retained_log_count: DEFAULT_RETAINED_LOG_COUNT,
        }
    }

    pub fn with_retained_log_count(mut self, count: usize) -> Self {
        self.retained_log_count = count;
        self
    }

    pub fn logs(&self) -> &LogBook {
        &self.logs
    }

    pub fn clients(&self) -> &ClientProvider {
        &self.clients
    }

    pub fn retained_log_count(&self) -> usize {
        self.retained_log_count
    }
}

/// Builds authenticated backup clients on demand.
///
/// Credentials are resolved lazily, per call, under a deadline. The endpoint
/// template is fixed at construction and rendered for the caller's project.
#[derive(Clone)]
pub struct ClientProvider {
    credentials: Arc<dyn CredentialResolver>,
    factory: Arc<dyn BackupClientFactory>,
    endpoint: EndpointTemplate,
    credential_timeout: Duration,
}

impl ClientProvider {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        factory: Arc<dyn BackupClientFactory>,
        endpoint: EndpointTemplate,
    ) -> Self {
        Self {
            credentials,
            factory,
            endpoint,
            credential_timeout: DEFAULT_CREDENTIAL_TIMEOUT,
        }
    }

    pub fn with_credential_timeout(mut self, timeout: Duration) -> Self {
        self.credential_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &EndpointTemplate {
        &self.endpoint
    }

    /// Client acting as `user_id` within `project_id`.
    pub async fn client_for(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<Arc<dyn BackupClient>> {
        let token = tokio::time::timeout(
            self.credential_timeout,
            self.credentials.get_token(user_id, project_id),
        )
        .await
        .map_err(|_| {
            OperationError::Timeout(format!(
                "resolving credentials for project '{project_id}' after {:?}",
                self.credential_timeout
            ))
        })?
        .ok_or_else(|| OperationError::CredentialUnavailable {
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
        })?;

        let endpoint = self.endpoint.render(project_id);
        debug!(project_id, endpoint = %endpoint, "Building backup client");

        let auth = AuthContext {
            token,
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
        };
        Ok(self.factory.create(&auth, &endpoint)?)
    }
}
