//! Scheduled operations and the execution driver.
//!
//! An [`Operation`] knows how to validate, execute and resume one kind of
//! work. The shared [`driver::run`] algorithm decides, from the run parameters
//! and the operation log, which of those to call, and owns every log state
//! transition.

mod context;
mod definition;
mod delete_checkpoint;
pub mod driver;
mod error;
mod lifecycle;
mod log;
mod protect;
mod registry;

pub use context::{
    ClientProvider, DEFAULT_CREDENTIAL_TIMEOUT, DEFAULT_RETAINED_LOG_COUNT, OperationContext,
};
pub use definition::{OperationDefinition, RunParameters, RunType};
pub use delete_checkpoint::DeleteCheckpointOperation;
pub use driver::{RunOutcome, SkipReason, run};
pub use error::{OperationError, Result};
pub use lifecycle::{LogBook, Progress};
pub use log::{ExecutionState, LogFilter, LogId, LogUpdates, OperationExecutionLog};
pub use protect::ProtectOperation;
pub use registry::OperationRegistry;

use async_trait::async_trait;
use serde_json::{Map, Value};

// ============================================================================
// Operation
// ============================================================================

/// One kind of schedulable work.
///
/// Implementations only supply the kind-specific hooks; they never write the
/// final log state themselves. They report it as a [`Completion`].
#[async_trait]
pub trait Operation: Send + Sync {
    /// Kind tag matched against [`OperationDefinition::kind`].
    fn kind(&self) -> &'static str;

    /// Check the definition without side effects.
    fn validate_definition(&self, definition: &OperationDefinition) -> Result<()>;

    /// Perform the action for a fresh firing.
    ///
    /// Only called when no other attempt is in flight for the operation id.
    async fn execute(
        &self,
        ctx: &OperationContext,
        definition: &OperationDefinition,
        params: &RunParameters,
        progress: &mut Progress<'_>,
    ) -> Result<Completion>;

    /// Reconcile an attempt left `in_progress` by a previous process.
    ///
    /// Query the remote side and report the outcome, or re-drive the action
    /// when that is safe.
    async fn resume(
        &self,
        ctx: &OperationContext,
        definition: &OperationDefinition,
        params: &RunParameters,
        entry: &OperationExecutionLog,
        progress: &mut Progress<'_>,
    ) -> Result<Completion>;
}

// ============================================================================
// Completion
// ============================================================================

/// Outcome an operation reports back to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub state: ExecutionState,
    pub extend_info: Map<String, Value>,
    pub error: Option<String>,
}

impl Completion {
    pub fn success() -> Self {
        Self {
            state: ExecutionState::Success,
            extend_info: Map::new(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: ExecutionState::Failed,
            extend_info: Map::new(),
            error: Some(message.into()),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extend_info.insert(key.into(), value.into());
        self
    }

    /// Log changes carrying everything but the state.
    pub(crate) fn into_updates(self) -> LogUpdates {
        let updates = LogUpdates::new().fields(self.extend_info);
        match self.error {
            Some(error) => updates.error(error),
            None => updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_into_updates() {
        let updates = Completion::failed("remote error")
            .with_field("checkpoint_id", "cp-1")
            .into_updates();

        assert_eq!(updates.state, None);
        assert_eq!(updates.error.as_deref(), Some("remote error"));
        assert_eq!(
            updates.extend_info.get("checkpoint_id"),
            Some(&Value::from("cp-1"))
        );
    }
}
