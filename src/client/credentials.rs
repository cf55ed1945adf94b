//! Credential resolution for backup API calls.

use std::collections::HashMap;

use async_trait::async_trait;

/// Exchanges a user/project identity for a short-lived access token.
///
/// Returns `None` when no token can be issued; callers treat that as
/// "cannot reach the backup API for this tenant".
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn get_token(&self, user_id: &str, project_id: &str) -> Option<String>;
}

/// Resolver backed by tokens known at startup.
///
/// A per-project token wins over the default token. Empty tokens count as
/// absent so that `token: "${VAR:-}"` in config behaves as "unset".
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    default_token: Option<String>,
    project_tokens: HashMap<String, String>,
}

impl StaticCredentialResolver {
    pub fn new(default_token: Option<String>) -> Self {
        Self {
            default_token: default_token.filter(|t| !t.is_empty()),
            project_tokens: HashMap::new(),
        }
    }

    pub fn with_project_token(
        mut self,
        project_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let token = token.into();
        if !token.is_empty() {
            self.project_tokens.insert(project_id.into(), token);
        }
        self
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn get_token(&self, _user_id: &str, project_id: &str) -> Option<String> {
        self.project_tokens
            .get(project_id)
            .or(self.default_token.as_ref())
            .cloned()
    }
}
