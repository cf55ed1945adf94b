//! HTTP implementation of the backup client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ClientError, Result};
use super::{AuthContext, BackupClient, BackupClientFactory, Checkpoint};

/// Header carrying the access token.
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// HTTP client for the checkpoint API of one tenant.
#[derive(Debug, Clone)]
pub struct HttpBackupClient {
    base_url: String,
    token: String,
    http: Client,
}

impl HttpBackupClient {
    /// Create a client for `base_url` (already rendered for the tenant).
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(crate::build_info::user_agent())
            .build()?;
        Ok(Self::with_http(base_url, token, http))
    }

    /// Create a client reusing an existing connection pool.
    pub fn with_http(base_url: &str, token: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn checkpoints_url(&self, provider_id: &str) -> String {
        format!("{}/providers/{}/checkpoints", self.base_url, provider_id)
    }

    /// Turn an error response into `ClientError::Api`.
    async fn parse_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();

        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| error_message(&body))
            .unwrap_or_else(|| format!("HTTP {}", status));

        ClientError::Api { status, message }
    }

    /// Parse a successful JSON response or convert error response.
    async fn json_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.parse_error(response).await)
        }
    }
}

#[async_trait]
impl BackupClient for HttpBackupClient {
    async fn create_checkpoint(
        &self,
        provider_id: &str,
        plan_id: &str,
        extra_info: &Map<String, Value>,
    ) -> Result<Checkpoint> {
        let body = CreateCheckpointRequest {
            checkpoint: CreateCheckpointBody {
                plan_id,
                extra_info,
            },
        };

        let response = self
            .http
            .post(self.checkpoints_url(provider_id))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .json(&body)
            .send()
            .await?;

        let envelope: CheckpointEnvelope = self.json_response(response).await?;
        if envelope.checkpoint.id.is_empty() {
            return Err(ClientError::UnexpectedResponse(
                "created checkpoint has no id".to_string(),
            ));
        }
        Ok(envelope.checkpoint)
    }

    async fn get_checkpoint(
        &self,
        provider_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<Checkpoint>> {
        let url = format!("{}/{}", self.checkpoints_url(provider_id), checkpoint_id);
        let response = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: CheckpointEnvelope = self.json_response(response).await?;
        Ok(Some(envelope.checkpoint))
    }

    async fn delete_checkpoint(&self, provider_id: &str, checkpoint_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.checkpoints_url(provider_id), checkpoint_id);
        let response = self
            .http
            .delete(&url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.parse_error(response).await)
        }
    }
}

/// Builds [`HttpBackupClient`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpBackupClientFactory {
    http: Client,
}

impl HttpBackupClientFactory {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(crate::build_info::user_agent())
            .build()?;
        Ok(Self { http })
    }
}

impl BackupClientFactory for HttpBackupClientFactory {
    fn create(&self, auth: &AuthContext, endpoint: &str) -> Result<Arc<dyn BackupClient>> {
        Ok(Arc::new(HttpBackupClient::with_http(
            endpoint,
            auth.token.clone(),
            self.http.clone(),
        )))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct CreateCheckpointRequest<'a> {
    checkpoint: CreateCheckpointBody<'a>,
}

#[derive(Serialize)]
struct CreateCheckpointBody<'a> {
    plan_id: &'a str,
    extra_info: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct CheckpointEnvelope {
    checkpoint: Checkpoint,
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": ...}`, `{"detail": ...}` and the wrapped form
/// `{"itemNotFound": {"message": ...}}`.
fn error_message(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    for key in ["message", "detail", "title"] {
        if let Some(message) = object.get(key).and_then(Value::as_str) {
            return Some(message.to_string());
        }
    }
    object.values().find_map(|nested| {
        nested
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}
