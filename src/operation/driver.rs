//! The execution driver shared by every operation kind.
//!
//! ```text
//!                 run(op, ctx, definition, params)
//!                              │
//!              ┌───────────────┴────────────────┐
//!         run_type = new                 run_type = resume
//!              │                                │
//!     expired? ├─ yes: create DROPPED   query ≤2 in_progress entries
//!              │                                │
//!              └─ no: create IN_PROGRESS  0 or >1: skip (no prune)
//!                     execute()           exactly 1: expired? ─ yes: DROPPED
//!                     finish log                             └─ no: resume()
//!              │                                │
//!              └──────────── prune to retention ┘
//! ```
//!
//! Log writes never abort the run. A failed create leaves the attempt without
//! an entry, a failed update leaves the entry as it was.
//!
//! A `Conflict` on create means an in-progress entry already holds the
//! operation id. If every such entry belongs to an earlier firing it was left
//! behind by a crashed or unfinished attempt: it is finished as `failed` and
//! the create is retried. Only an attempt of the same (or a later) firing
//! stops the run.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::context::OperationContext;
use super::definition::{OperationDefinition, RunParameters, RunType};
use super::error::Result;
use super::lifecycle::Progress;
use super::log::{ExecutionState, LogId, LogUpdates, OperationExecutionLog};
use super::{Completion, Operation};

// ============================================================================
// RunOutcome
// ============================================================================

/// What a call to [`run`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A fresh firing ran `execute`. `log_id` is absent if the entry could not
    /// be created.
    Executed {
        log_id: Option<LogId>,
        state: ExecutionState,
    },
    /// An in-progress entry was reconciled through `resume`.
    Resumed { log_id: LogId, state: ExecutionState },
    /// The firing came after its window and was recorded as dropped.
    Dropped { log_id: Option<LogId> },
    /// Nothing ran.
    Skipped(SkipReason),
}

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Resume found no in-progress entry.
    NoInProgressLog,
    /// Resume found more than one in-progress entry.
    DuplicateInProgressLogs(usize),
    /// Resume could not read the log.
    LogQueryFailed,
    /// An attempt of the same firing already holds the operation id.
    ConcurrentRun,
}

impl RunOutcome {
    /// Final state of the attempt, if one was recorded or reported.
    pub fn state(&self) -> Option<ExecutionState> {
        match self {
            Self::Executed { state, .. } | Self::Resumed { state, .. } => Some(*state),
            Self::Dropped { .. } => Some(ExecutionState::DroppedOutOfWindow),
            Self::Skipped(_) => None,
        }
    }

    /// Whether the run touched the log and must be followed by retention.
    fn prunes(&self) -> bool {
        match self {
            Self::Skipped(reason) => matches!(reason, SkipReason::ConcurrentRun),
            _ => true,
        }
    }
}

// ============================================================================
// run
// ============================================================================

/// Run one firing of `op`.
///
/// Errors from `execute`/`resume` propagate after the entry is finished as
/// `failed` and retention has run. Log store errors never propagate.
pub async fn run(
    op: &dyn Operation,
    ctx: &OperationContext,
    definition: &OperationDefinition,
    params: &RunParameters,
) -> Result<RunOutcome> {
    run_at(op, ctx, definition, params, Utc::now()).await
}

/// [`run`] with an explicit notion of "now" for the window check.
pub async fn run_at(
    op: &dyn Operation,
    ctx: &OperationContext,
    definition: &OperationDefinition,
    params: &RunParameters,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let expired = params.is_expired_at(now);
    debug!(
        operation_id = %params.operation_id,
        kind = op.kind(),
        run_type = %params.run_type,
        expired,
        window_end = %params.window_end(),
        "Running operation"
    );

    let result = match params.run_type {
        RunType::Resume => run_resume(op, ctx, definition, params, expired, now).await,
        RunType::New => run_new(op, ctx, definition, params, expired, now).await,
    };

    if result.as_ref().map_or(true, RunOutcome::prunes) {
        prune(ctx, &params.operation_id).await;
    }

    result
}

async fn run_new(
    op: &dyn Operation,
    ctx: &OperationContext,
    definition: &OperationDefinition,
    params: &RunParameters,
    expired: bool,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let operation_id = params.operation_id.as_str();

    if expired {
        info!(
            operation_id,
            expect_start_time = %params.expect_start_time,
            window_seconds = params.window_time,
            "Firing is out of its window, dropping"
        );
        let overrides = LogUpdates::new()
            .state(ExecutionState::DroppedOutOfWindow)
            .end_time(now);
        let log_id = match ctx.logs().create_log(params, overrides).await {
            Ok(entry) => Some(entry.id),
            Err(e) => {
                error!(operation_id, error = %e, "Failed to record dropped firing");
                None
            }
        };
        return Ok(RunOutcome::Dropped { log_id });
    }

    let mut created = ctx.logs().create_log(params, LogUpdates::new()).await;
    if matches!(&created, Err(e) if e.is_conflict())
        && supersede_earlier_attempts(ctx, params).await
    {
        created = ctx.logs().create_log(params, LogUpdates::new()).await;
    }

    let mut entry = match created {
        Ok(entry) => Some(entry),
        Err(e) if e.is_conflict() => {
            warn!(
                operation_id,
                error = %e,
                "Another attempt of this firing is in progress, skipping"
            );
            return Ok(RunOutcome::Skipped(SkipReason::ConcurrentRun));
        }
        Err(e) => {
            error!(
                operation_id,
                error = %e,
                "Failed to create operation log, executing without it"
            );
            None
        }
    };

    let result = {
        let mut progress = Progress::new(ctx.logs(), &mut entry);
        op.execute(ctx, definition, params, &mut progress).await
    };
    let state = settle(ctx, &mut entry, result).await?;

    info!(operation_id, kind = op.kind(), state = %state, "Operation executed");
    Ok(RunOutcome::Executed {
        log_id: entry.map(|entry| entry.id),
        state,
    })
}

/// Finish in-progress entries left behind by earlier firings.
///
/// Returns true if at least one entry was closed and none of the same or a
/// later firing remains. Any store failure leaves the entries alone.
async fn supersede_earlier_attempts(ctx: &OperationContext, params: &RunParameters) -> bool {
    let operation_id = params.operation_id.as_str();

    let stale = match ctx.logs().in_progress(operation_id).await {
        Ok(found) => found,
        Err(e) => {
            warn!(operation_id, error = %e, "Failed to query in-progress logs");
            return false;
        }
    };
    if stale.is_empty()
        || stale
            .iter()
            .any(|entry| entry.expect_start_time >= params.expect_start_time)
    {
        return false;
    }

    let reason = format!(
        "superseded by the firing expected at {}",
        params.expect_start_time
    );
    for snapshot in stale {
        let log_id = snapshot.id.clone();
        warn!(
            operation_id,
            log_id = %log_id,
            expect_start_time = %snapshot.expect_start_time,
            "Superseding attempt left in progress by an earlier firing"
        );
        let mut entry = Some(snapshot);
        if let Err(e) = ctx
            .logs()
            .finish_log(
                &mut entry,
                ExecutionState::Failed,
                LogUpdates::new().error(reason.clone()),
            )
            .await
        {
            error!(operation_id, log_id = %log_id, error = %e, "Failed to close stale attempt");
            return false;
        }
    }
    true
}

async fn run_resume(
    op: &dyn Operation,
    ctx: &OperationContext,
    definition: &OperationDefinition,
    params: &RunParameters,
    expired: bool,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let operation_id = params.operation_id.as_str();

    let mut found = match ctx.logs().in_progress(operation_id).await {
        Ok(found) => found,
        Err(e) => {
            warn!(operation_id, error = %e, "Failed to query in-progress logs, nothing to resume");
            return Ok(RunOutcome::Skipped(SkipReason::LogQueryFailed));
        }
    };

    let snapshot: OperationExecutionLog = match (found.pop(), found.is_empty()) {
        (Some(entry), true) => entry,
        (None, _) => {
            info!(operation_id, "No in-progress log to resume");
            return Ok(RunOutcome::Skipped(SkipReason::NoInProgressLog));
        }
        (Some(_), false) => {
            let count = found.len() + 1;
            warn!(
                operation_id,
                count, "Multiple in-progress logs for one operation, refusing to act"
            );
            return Ok(RunOutcome::Skipped(SkipReason::DuplicateInProgressLogs(count)));
        }
    };

    let log_id = snapshot.id.clone();
    let mut entry = Some(snapshot.clone());

    if expired {
        info!(operation_id, log_id = %log_id, "In-progress attempt is out of its window, dropping");
        if let Err(e) = ctx
            .logs()
            .finish_log(
                &mut entry,
                ExecutionState::DroppedOutOfWindow,
                LogUpdates::new().end_time(now),
            )
            .await
        {
            error!(operation_id, log_id = %log_id, error = %e, "Failed to mark attempt dropped");
        }
        return Ok(RunOutcome::Dropped {
            log_id: Some(log_id),
        });
    }

    let result = {
        let mut progress = Progress::new(ctx.logs(), &mut entry);
        op.resume(ctx, definition, params, &snapshot, &mut progress)
            .await
    };
    let state = settle(ctx, &mut entry, result).await?;

    info!(operation_id, log_id = %log_id, state = %state, "Operation resumed");
    Ok(RunOutcome::Resumed { log_id, state })
}

/// Write the result of `execute`/`resume` to the entry.
///
/// A non-terminal completion only updates fields and leaves the entry in
/// progress for a later resume.
async fn settle(
    ctx: &OperationContext,
    entry: &mut Option<OperationExecutionLog>,
    result: Result<Completion>,
) -> Result<ExecutionState> {
    match result {
        Ok(completion) => {
            let state = completion.state;
            let updates = completion.into_updates();
            let written = if state.is_terminal() {
                ctx.logs().finish_log(entry, state, updates).await
            } else {
                ctx.logs().update_log(entry, updates).await
            };
            if let Err(e) = written {
                error!(state = %state, error = %e, "Failed to update operation log");
            }
            Ok(state)
        }
        Err(err) => {
            let updates = LogUpdates::new().error(err.to_string());
            if let Err(e) = ctx
                .logs()
                .finish_log(entry, ExecutionState::Failed, updates)
                .await
            {
                error!(error = %e, "Failed to mark operation log failed");
            }
            Err(err)
        }
    }
}

async fn prune(ctx: &OperationContext, operation_id: &str) {
    if let Err(e) = ctx
        .logs()
        .prune_logs(operation_id, ctx.retained_log_count())
        .await
    {
        warn!(operation_id, error = %e, "Failed to prune operation logs");
    }
}
