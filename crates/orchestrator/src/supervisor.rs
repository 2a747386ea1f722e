//! Retry and timeout supervisor.
//!
//! A background sweep with two duties: return expired work unit leases
//! to the queue with exponential backoff (or fail them once attempts
//! run out), and enforce the wall-clock ceiling on whole executions.
//! Lease expiry is the only crash-recovery mechanism; a worker that
//! dies mid-window is indistinguishable from a slow one until its lease
//! lapses here.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use overseer_core::error::FailureKind;
use overseer_core::log::{LogCategory, LogLevel, LogPhase};
use overseer_core::queue::retry_backoff;
use overseer_db::models::log_entry::CreateLogEntry;
use overseer_db::models::status::{BranchStatus, ExecutionStatus};
use overseer_db::models::work_unit::WorkUnit;
use overseer_db::repositories::{BranchRepo, ExecutionRepo, LogRepo, WorkUnitRepo, WorkerRepo};
use overseer_db::DbPool;
use overseer_events::{types as events, EventBus, OrchestrationEvent};

use crate::config::OrchestratorConfig;
use crate::coordinator;

/// Run the supervisor loop until `cancel` is triggered.
pub async fn run(
    pool: DbPool,
    config: OrchestratorConfig,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = config.supervisor_interval.as_secs(),
        lease_secs = config.lease.as_secs(),
        ceiling_secs = config.execution_ceiling.as_secs(),
        "Supervisor started"
    );
    let mut interval = tokio::time::interval(config.supervisor_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Supervisor stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = sweep_expired_leases(&pool, &config, &bus).await {
                    tracing::error!(error = %e, "Lease sweep failed");
                }
                if let Err(e) = sweep_overdue_executions(&pool, &config, &bus).await {
                    tracing::error!(error = %e, "Execution ceiling sweep failed");
                }
                if let Err(e) = sweep_stale_workers(&pool, &config).await {
                    tracing::error!(error = %e, "Stale worker sweep failed");
                }
            }
        }
    }
}

/// Requeue or exhaust every work unit whose lease has lapsed.
pub async fn sweep_expired_leases(
    pool: &DbPool,
    config: &OrchestratorConfig,
    bus: &EventBus,
) -> Result<(), sqlx::Error> {
    let expired = WorkUnitRepo::list_expired(pool).await?;
    for unit in expired {
        let Some(owner) = unit.lock_owner.clone() else {
            continue;
        };
        if unit.attempt_count >= unit.max_attempts {
            exhaust_unit(pool, bus, &unit, &owner).await?;
        } else {
            requeue_unit(pool, config, bus, &unit, &owner).await?;
        }
    }
    Ok(())
}

async fn requeue_unit(
    pool: &DbPool,
    config: &OrchestratorConfig,
    bus: &EventBus,
    unit: &WorkUnit,
    owner: &str,
) -> Result<(), sqlx::Error> {
    // attempt_count deliveries have happened; back off accordingly.
    let delay = retry_backoff(config.retry_base, unit.attempt_count as u32, config.retry_cap);
    let scheduled_for = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();

    if !WorkUnitRepo::requeue(pool, unit.id, owner, scheduled_for).await? {
        // Lost the race: the worker settled the unit after our read.
        return Ok(());
    }
    BranchRepo::bump_retry_count(pool, unit.branch_id).await?;

    if let Some(branch) = BranchRepo::find_by_id(pool, unit.branch_id).await? {
        let mut conn = pool.acquire().await?;
        LogRepo::insert(
            &mut *conn,
            CreateLogEntry {
                execution_id: branch.execution_id,
                branch_id: Some(branch.id),
                phase: LogPhase::ActionExecution.as_str().into(),
                level: LogLevel::Warning.as_str().into(),
                category: LogCategory::System.as_str().into(),
                message: format!(
                    "Lease expired on worker {}; requeued with {}s backoff",
                    owner,
                    delay.as_secs()
                ),
                detail: serde_json::json!({
                    "work_unit_id": unit.id,
                    "attempt_count": unit.attempt_count,
                    "max_attempts": unit.max_attempts,
                    "backoff_secs": delay.as_secs(),
                }),
            },
        )
        .await?;

        tracing::warn!(
            work_unit_id = unit.id,
            branch_serial = %branch.serial,
            owner,
            attempt = unit.attempt_count,
            backoff_secs = delay.as_secs(),
            "Expired lease requeued"
        );
        bus.publish(
            OrchestrationEvent::new(events::WORK_UNIT_REQUEUED)
                .with_source("work_unit", unit.id)
                .with_serial(&branch.serial)
                .with_payload(serde_json::json!({
                    "attempt_count": unit.attempt_count,
                    "backoff_secs": delay.as_secs(),
                })),
        );
    }
    Ok(())
}

async fn exhaust_unit(
    pool: &DbPool,
    bus: &EventBus,
    unit: &WorkUnit,
    owner: &str,
) -> Result<(), sqlx::Error> {
    if !WorkUnitRepo::mark_exhausted(pool, unit.id, owner).await? {
        return Ok(());
    }

    let Some(branch) = BranchRepo::find_by_id(pool, unit.branch_id).await? else {
        return Ok(());
    };
    let summary = format!(
        "Work unit exhausted {} attempts (actions {}..={})",
        unit.max_attempts, unit.action_from, unit.action_to
    );
    BranchRepo::finalize(pool, branch.id, BranchStatus::Failed.id(), None, &summary).await?;

    let mut conn = pool.acquire().await?;
    LogRepo::insert(
        &mut *conn,
        CreateLogEntry {
            execution_id: branch.execution_id,
            branch_id: Some(branch.id),
            phase: LogPhase::Completion.as_str().into(),
            level: LogLevel::Error.as_str().into(),
            category: LogCategory::System.as_str().into(),
            message: summary.clone(),
            detail: serde_json::json!({
                "work_unit_id": unit.id,
                "attempt_count": unit.attempt_count,
                "error_kind": FailureKind::RetriesExhausted.as_str(),
            }),
        },
    )
    .await?;
    drop(conn);

    tracing::error!(
        work_unit_id = unit.id,
        branch_serial = %branch.serial,
        attempts = unit.attempt_count,
        "Work unit retries exhausted"
    );
    bus.publish(
        OrchestrationEvent::new(events::WORK_UNIT_RETRIES_EXHAUSTED)
            .with_source("work_unit", unit.id)
            .with_serial(&branch.serial)
            .with_payload(serde_json::json!({
                "attempt_count": unit.attempt_count,
                "error_kind": FailureKind::RetriesExhausted.as_str(),
            })),
    );
    bus.publish(
        OrchestrationEvent::new(events::BRANCH_FAILED)
            .with_source("branch", branch.id)
            .with_serial(&branch.serial),
    );

    coordinator::rollup_execution(pool, bus, branch.execution_id).await?;
    Ok(())
}

/// Mark workers with lapsed heartbeats offline. Their leases are
/// reclaimed separately by the lease sweep once they expire.
pub async fn sweep_stale_workers(
    pool: &DbPool,
    config: &OrchestratorConfig,
) -> Result<(), sqlx::Error> {
    let marked = WorkerRepo::mark_stale_offline(pool, config.worker_stale.as_secs() as i64).await?;
    if marked > 0 {
        tracing::warn!(
            workers = marked,
            stale_secs = config.worker_stale.as_secs(),
            "Stale workers marked offline"
        );
    }
    Ok(())
}

/// Time out every execution whose wall clock ran past the ceiling.
pub async fn sweep_overdue_executions(
    pool: &DbPool,
    config: &OrchestratorConfig,
    bus: &EventBus,
) -> Result<(), sqlx::Error> {
    let ceiling = chrono::Duration::from_std(config.execution_ceiling).unwrap_or_default();
    let cutoff = Utc::now() - ceiling;
    let overdue = ExecutionRepo::list_overdue(pool, cutoff).await?;

    for execution in overdue {
        if !ExecutionRepo::finalize(pool, execution.id, ExecutionStatus::TimedOut.id()).await? {
            continue;
        }
        let in_flight = WorkUnitRepo::count_leased_for_execution(pool, execution.id).await?;
        let cancelled = WorkUnitRepo::cancel_queued_for_execution(pool, execution.id).await?;
        let branches =
            BranchRepo::force_terminal(pool, execution.id, BranchStatus::TimedOut.id()).await?;

        let mut conn = pool.acquire().await?;
        LogRepo::insert(
            &mut *conn,
            CreateLogEntry {
                execution_id: execution.id,
                branch_id: None,
                phase: LogPhase::Completion.as_str().into(),
                level: LogLevel::Error.as_str().into(),
                category: LogCategory::System.as_str().into(),
                message: format!(
                    "Execution exceeded wall-clock ceiling of {}s",
                    config.execution_ceiling.as_secs()
                ),
                detail: serde_json::json!({
                    "timed_out_branches": branches,
                    "cancelled_units": cancelled,
                    "units_in_flight": in_flight,
                    "error_kind": FailureKind::Timeout.as_str(),
                }),
            },
        )
        .await?;

        tracing::error!(
            execution_id = execution.id,
            serial = %execution.serial,
            timed_out_branches = branches,
            "Execution timed out at wall-clock ceiling"
        );
        bus.publish(
            OrchestrationEvent::new(events::EXECUTION_TIMED_OUT)
                .with_source("execution", execution.id)
                .with_serial(&execution.serial)
                .with_payload(serde_json::json!({
                    "ceiling_secs": config.execution_ceiling.as_secs(),
                })),
        );
    }
    Ok(())
}
