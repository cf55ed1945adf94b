use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

use crate::client::EndpointTemplate;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub operation_log: OperationLogConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Self::parse(&contents)
    }

    /// Parse YAML after environment variable expansion.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        Ok(serde_saphyr::from_str(&expanded)?)
    }
}

/// Resolve a path relative to the config file directory.
///
/// If the path is absolute, it is returned as-is.
/// If the path is relative, it is joined with the config file's parent directory.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config_dir.join(path)
}

// ============================================================================
// Default Paths
// ============================================================================

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "opengine.yaml";
/// Default operation log directory (relative to config file).
pub const DEFAULT_OPERATION_LOG_DIR: &str = ".opengine/operation_logs";

// ============================================================================
// OperationLogConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OperationLogConfig {
    #[serde(default = "default_operation_log_path")]
    pub path: PathBuf,
    /// Entries kept per operation id.
    #[serde(default = "default_retained_count")]
    pub retained_count: usize,
}

impl Default for OperationLogConfig {
    fn default() -> Self {
        Self {
            path: default_operation_log_path(),
            retained_count: default_retained_count(),
        }
    }
}

// ============================================================================
// BackupConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BackupConfig {
    /// Backup API endpoint; `$(tenant_id)s` is replaced by the project id.
    #[serde(default)]
    pub endpoint: EndpointTemplate,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointTemplate::default(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

// ============================================================================
// IdentityConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IdentityConfig {
    /// Token used for every project without its own entry.
    #[serde(default)]
    pub token: Option<String>,
    /// Per-project tokens.
    #[serde(default)]
    pub project_tokens: HashMap<String, String>,
    #[serde(default = "default_identity_timeout")]
    pub timeout_seconds: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            token: None,
            project_tokens: HashMap::new(),
            timeout_seconds: default_identity_timeout(),
        }
    }
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_operation_log_path() -> PathBuf {
    PathBuf::from(DEFAULT_OPERATION_LOG_DIR)
}

fn default_retained_count() -> usize {
    crate::operation::DEFAULT_RETAINED_LOG_COUNT
}

fn default_request_timeout() -> u64 {
    30
}

fn default_identity_timeout() -> u64 {
    10
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports the following syntax (shell-compatible):
/// - `${VAR}` - Required variable, errors if not set
/// - `${VAR:-default}` - Optional variable with default value
/// - `${VAR:-}` - Optional variable, empty string if not set
/// - `$$` - Escaped `$`
///
/// The endpoint placeholder `$(tenant_id)s` passes through untouched since
/// only `${` starts a reference.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                result.push_str(&parse_var_reference(&mut chars)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Parse a variable reference after seeing `${`.
fn parse_var_reference(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut var_name = String::new();
    let mut default_value: Option<String> = None;
    let mut closed = false;

    while let Some(c) = chars.next() {
        if c == '}' {
            closed = true;
            break;
        }
        if c == ':' && default_value.is_none() && chars.peek() == Some(&'-') {
            chars.next();
            default_value = Some(String::new());
            continue;
        }
        match default_value.as_mut() {
            Some(default) => default.push(c),
            None => var_name.push(c),
        }
    }

    if !closed {
        return Err(ConfigError::UnclosedVarReference);
    }

    match std::env::var(&var_name) {
        Ok(value) => Ok(value),
        Err(_) => default_value.ok_or(ConfigError::MissingEnvVar(var_name)),
    }
}

// ============================================================================
// Tests
// ============================================================================
