//! Per-tenant endpoint templating.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the project id when rendering an endpoint.
pub const TENANT_PLACEHOLDER: &str = "$(tenant_id)s";

/// Backup API endpoint with an optional tenant placeholder.
///
/// Built once from configuration and rendered per call, e.g.
/// `http://backup-api:8799/v1/$(tenant_id)s` → `http://backup-api:8799/v1/<project>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointTemplate(String);

impl EndpointTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Returns true if rendering substitutes a tenant.
    pub fn is_per_tenant(&self) -> bool {
        self.0.contains(TENANT_PLACEHOLDER)
    }

    /// Substitute `project_id` for every placeholder and drop trailing slashes.
    pub fn render(&self, project_id: &str) -> String {
        self.0
            .replace(TENANT_PLACEHOLDER, project_id)
            .trim_end_matches('/')
            .to_string()
    }
}

impl Default for EndpointTemplate {
    fn default() -> Self {
        Self::new(format!("http://127.0.0.1:8799/v1/{TENANT_PLACEHOLDER}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_tenant() {
        let template = EndpointTemplate::new("http://backup-api:8799/v1/$(tenant_id)s/");
        assert!(template.is_per_tenant());
        assert_eq!(template.render("abc"), "http://backup-api:8799/v1/abc");
    }

    #[test]
    fn render_without_placeholder_is_fixed() {
        let template = EndpointTemplate::new("http://backup.local/api");
        assert!(!template.is_per_tenant());
        assert_eq!(template.render("abc"), "http://backup.local/api");
    }

    #[test]
    fn default_is_per_tenant() {
        assert!(EndpointTemplate::default().is_per_tenant());
        assert!(!EndpointTemplate::default().is_empty());
    }
}
