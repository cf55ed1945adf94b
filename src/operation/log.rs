//! Operation execution log records.
//!
//! One [`OperationExecutionLog`] is the durable witness of a single execution
//! attempt of a scheduled operation. The driver creates it, variants may attach
//! progress to it, and retention eventually prunes it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// ExecutionState
// ============================================================================

/// State of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// The attempt started and has not reached a terminal state.
    InProgress,
    /// The remote action completed.
    Success,
    /// The remote action failed.
    Failed,
    /// The firing came too late to run.
    DroppedOutOfWindow,
}

impl ExecutionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::DroppedOutOfWindow => "dropped_out_of_window",
        }
    }

    /// Returns true for every state except [`ExecutionState::InProgress`].
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ============================================================================
// OperationExecutionLog
// ============================================================================

/// Unique identifier for a log entry.
pub type LogId = String;

/// Durable record of one execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationExecutionLog {
    /// Unique identifier of this entry.
    pub id: LogId,
    /// Scheduled operation this attempt belongs to.
    pub operation_id: String,
    /// When the scheduler meant to fire.
    pub expect_start_time: DateTime<Utc>,
    /// When the scheduler actually fired.
    pub triggered_time: DateTime<Utc>,
    /// When the engine started handling the firing.
    pub actual_start_time: DateTime<Utc>,
    /// When the attempt reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub state: ExecutionState,
    /// Kind-specific fields (e.g. the remote checkpoint id).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extend_info: Map<String, Value>,
    /// Error message of a failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationExecutionLog {
    /// Generate a new log entry ID.
    pub fn generate_id() -> LogId {
        format!("oplog_{}", ulid::Ulid::new())
    }

    pub fn is_in_progress(&self) -> bool {
        self.state == ExecutionState::InProgress
    }

    /// Look up a string field in `extend_info`.
    pub fn extend_str(&self, key: &str) -> Option<&str> {
        self.extend_info.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// LogFilter
// ============================================================================

/// Query filter for log entries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub operation_id: Option<String>,
    pub state: Option<ExecutionState>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn state(mut self, state: ExecutionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn matches(&self, entry: &OperationExecutionLog) -> bool {
        self.operation_id
            .as_deref()
            .is_none_or(|id| id == entry.operation_id)
            && self.state.is_none_or(|state| state == entry.state)
    }
}

// ============================================================================
// LogUpdates
// ============================================================================

/// A set of field changes applied to a log entry.
///
/// Used both as overrides when creating an entry and as the patch for
/// updating or finishing one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogUpdates {
    pub state: Option<ExecutionState>,
    pub end_time: Option<DateTime<Utc>>,
    pub extend_info: Map<String, Value>,
    pub error: Option<String>,
}

impl LogUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: ExecutionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extend_info.insert(key.into(), value.into());
        self
    }

    pub fn fields(mut self, fields: Map<String, Value>) -> Self {
        self.extend_info.extend(fields);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.end_time.is_none()
            && self.extend_info.is_empty()
            && self.error.is_none()
    }

    /// Apply the changes to `entry`. Unset fields leave the entry untouched.
    pub fn apply_to(&self, entry: &mut OperationExecutionLog) {
        if let Some(state) = self.state {
            entry.state = state;
        }
        if let Some(end_time) = self.end_time {
            entry.end_time = Some(end_time);
        }
        for (key, value) in &self.extend_info {
            entry.extend_info.insert(key.clone(), value.clone());
        }
        if let Some(error) = &self.error {
            entry.error = Some(error.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(operation_id: &str, state: ExecutionState) -> OperationExecutionLog {
        let now = Utc::now();
        OperationExecutionLog {
            id: OperationExecutionLog::generate_id(),
            operation_id: operation_id.to_string(),
            expect_start_time: now,
            triggered_time: now,
            actual_start_time: now,
            end_time: None,
            state,
            extend_info: Map::new(),
            error: None,
        }
    }

    #[test]
    fn log_id_is_unique() {
        let id1 = OperationExecutionLog::generate_id();
        let id2 = OperationExecutionLog::generate_id();
        assert_ne!(id1, id2);
        assert!(id1.starts_with("oplog_"));
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&ExecutionState::DroppedOutOfWindow).unwrap();
        assert_eq!(json, "\"dropped_out_of_window\"");
        assert_eq!(ExecutionState::InProgress.to_string(), "in_progress");
        assert!(!ExecutionState::InProgress.is_terminal());
        assert!(ExecutionState::Failed.is_terminal());
    }

    #[test]
    fn filter_matches_operation_and_state() {
        let filter = LogFilter::new()
            .operation("op-1")
            .state(ExecutionState::InProgress);

        assert!(filter.matches(&entry("op-1", ExecutionState::InProgress)));
        assert!(!filter.matches(&entry("op-1", ExecutionState::Success)));
        assert!(!filter.matches(&entry("op-2", ExecutionState::InProgress)));
        assert!(LogFilter::new().matches(&entry("op-2", ExecutionState::Failed)));
    }

    #[test]
    fn updates_apply_only_set_fields() {
        let mut log = entry("op-1", ExecutionState::InProgress);
        log.extend_info
            .insert("checkpoint_id".into(), Value::from("cp-1"));

        let end = Utc::now();
        LogUpdates::new()
            .state(ExecutionState::Success)
            .end_time(end)
            .field("plan_id", "plan-1")
            .apply_to(&mut log);

        assert_eq!(log.state, ExecutionState::Success);
        assert_eq!(log.end_time, Some(end));
        assert_eq!(log.extend_str("checkpoint_id"), Some("cp-1"));
        assert_eq!(log.extend_str("plan_id"), Some("plan-1"));
        assert!(log.error.is_none());
    }

    #[test]
    fn empty_extend_info_is_omitted_from_json() {
        let log = entry("op-1", ExecutionState::InProgress);
        let json = serde_json::to_value(&log).unwrap();
        assert!(json.get("extend_info").is_none());
        assert!(json.get("end_time").is_none());
        assert_eq!(json["state"], "in_progress");
    }
}
