//! Operation definitions and per-firing run parameters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::OperationError;

// ============================================================================
// OperationDefinition
// ============================================================================

/// Immutable description of what an operation does.
///
/// The engine never mutates a definition. Fields a kind doesn't use stay unset;
/// anything not modelled here lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationDefinition {
    /// Operation kind tag (e.g. `protect`).
    pub kind: String,
    /// Backup provider the operation targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Protection plan to checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// Existing checkpoint to act on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OperationDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn with_checkpoint(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    /// String value of a named field, typed or from `extra`.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "kind" => Some(self.kind.as_str()),
            "provider_id" => self.provider_id.as_deref(),
            "plan_id" => self.plan_id.as_deref(),
            "checkpoint_id" => self.checkpoint_id.as_deref(),
            other => self.extra.get(other).and_then(Value::as_str),
        }
    }

    /// The named field, which must be present and a UUID.
    pub fn require_uuid(&self, name: &str) -> Result<&str, OperationError> {
        let value = self
            .field(name)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| OperationError::invalid_definition(format!("{name} is required")))?;
        Uuid::parse_str(value).map_err(|_| {
            OperationError::invalid_definition(format!("{name} '{value}' is not a valid UUID"))
        })?;
        Ok(value)
    }
}

// ============================================================================
// RunType
// ============================================================================

/// Why the scheduler fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    /// A regular firing.
    #[default]
    New,
    /// A retry after the scheduler itself restarted.
    Resume,
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Resume => f.write_str("resume"),
        }
    }
}

impl FromStr for RunType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "resume" => Ok(Self::Resume),
            other => Err(format!("unknown run type '{other}' (expected new or resume)")),
        }
    }
}

// ============================================================================
// RunParameters
// ============================================================================

/// Input for exactly one invocation of the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Stable identity of the scheduled operation (not of this run).
    pub operation_id: String,
    pub run_type: RunType,
    /// When the scheduler meant to fire.
    pub expect_start_time: DateTime<Utc>,
    /// When the scheduler actually fired.
    pub triggered_time: DateTime<Utc>,
    /// Allowed delay, in seconds, after `expect_start_time`.
    pub window_time: u64,
    /// Owner of the operation, used for credential resolution.
    #[serde(default)]
    pub user_id: String,
    /// Tenant the operation runs in.
    #[serde(default)]
    pub project_id: String,
    /// Trigger that fired, recorded on created checkpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
    /// Kind-specific fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl RunParameters {
    /// Parameters for a firing expected at `expect_start_time` and triggered at
    /// the same instant.
    pub fn new(
        operation_id: impl Into<String>,
        run_type: RunType,
        expect_start_time: DateTime<Utc>,
        window_time: u64,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            run_type,
            expect_start_time,
            triggered_time: expect_start_time,
            window_time,
            user_id: String::new(),
            project_id: String::new(),
            trigger_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_triggered_time(mut self, triggered_time: DateTime<Utc>) -> Self {
        self.triggered_time = triggered_time;
        self
    }

    pub fn with_identity(
        mut self,
        user_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        self.user_id = user_id.into();
        self.project_id = project_id.into();
        self
    }

    pub fn with_trigger(mut self, trigger_id: impl Into<String>) -> Self {
        self.trigger_id = Some(trigger_id.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Last instant at which this firing may still run.
    ///
    /// Saturates at the maximum representable time for absurd windows.
    pub fn window_end(&self) -> DateTime<Utc> {
        i64::try_from(self.window_time)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|window| self.expect_start_time.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns true if `now` is strictly past the window end.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.window_end()
    }
}
