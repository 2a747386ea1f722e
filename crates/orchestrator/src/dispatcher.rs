//! Dispatch progression loop.
//!
//! The coordinator enqueues only the first dispatch stage. This loop
//! walks every open execution on an interval and enqueues the next
//! stage of each branch once the previous stage completed, releases the
//! next branch under serialize_targets, and finalizes branches whose
//! last window has resolved.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use overseer_core::queue::UnitWindow;
use overseer_core::state_machine;
use overseer_db::models::branch::Branch;
use overseer_db::models::job::Job;
use overseer_db::models::status::WorkUnitStatus;
use overseer_db::models::work_unit::WorkUnit;
use overseer_db::repositories::{BranchRepo, ExecutionRepo, JobRepo, WorkUnitRepo};
use overseer_db::DbPool;
use overseer_events::EventBus;

use crate::config::OrchestratorConfig;
use crate::coordinator::{self, plan_windows, unit_for_window};

/// Run the dispatch progression loop until `cancel` is triggered.
pub async fn run(
    pool: DbPool,
    config: OrchestratorConfig,
    bus: std::sync::Arc<EventBus>,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = config.dispatch_interval.as_secs(),
        "Dispatcher started"
    );
    let mut interval = tokio::time::interval(config.dispatch_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Dispatcher stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = sweep(&pool, &bus).await {
                    tracing::error!(error = %e, "Dispatch sweep failed");
                }
            }
        }
    }
}

/// One pass over all open executions.
pub async fn sweep(pool: &DbPool, bus: &EventBus) -> Result<(), sqlx::Error> {
    let open = ExecutionRepo::list_open(pool).await?;
    for execution in open {
        let Some(job) = JobRepo::find_by_id(pool, execution.job_id).await? else {
            continue;
        };
        let actions = JobRepo::list_actions(pool, execution.job_id).await?;
        let windows = plan_windows(&actions);
        let branches = BranchRepo::list_by_execution(pool, execution.id).await?;

        for (i, branch) in branches.iter().enumerate() {
            if state_machine::is_terminal(branch.status_id) {
                continue;
            }
            // Under serialize_targets a branch only dispatches once every
            // earlier branch (by serial order) is terminal.
            if job.serialize_targets
                && branches[..i]
                    .iter()
                    .any(|b| !state_machine::is_terminal(b.status_id))
            {
                continue;
            }
            advance_branch(pool, &job, branch, &windows).await?;
        }

        coordinator::rollup_execution(pool, bus, execution.id).await?;
    }
    Ok(())
}

/// Enqueue whatever the branch is ready for.
///
/// Stage N+1 windows are enqueued once every stage <= N window has a
/// completed unit. A failed or cancelled unit halts progression; the
/// worker pool and supervisor own that branch's terminal transition.
async fn advance_branch(
    pool: &DbPool,
    job: &Job,
    branch: &Branch,
    windows: &[UnitWindow],
) -> Result<(), sqlx::Error> {
    let units = WorkUnitRepo::list_by_branch(pool, branch.id).await?;
    let by_window: HashMap<(i32, i32), &WorkUnit> = units
        .iter()
        .map(|u| ((u.action_from, u.action_to), u))
        .collect();

    let halted = units.iter().any(|u| {
        u.status_id == WorkUnitStatus::Failed.id() || u.status_id == WorkUnitStatus::Cancelled.id()
    });
    if halted {
        return Ok(());
    }

    for window in windows {
        if by_window.contains_key(&(window.action_from, window.action_to)) {
            continue;
        }
        // All earlier stages must be fully complete first.
        let prior_complete = windows
            .iter()
            .filter(|w| w.stage < window.stage)
            .all(|w| {
                by_window
                    .get(&(w.action_from, w.action_to))
                    .map(|u| u.status_id == WorkUnitStatus::Completed.id())
                    .unwrap_or(false)
            });
        if !prior_complete {
            break;
        }

        let mut conn = pool.acquire().await?;
        WorkUnitRepo::enqueue(&mut *conn, unit_for_window(job, branch.id, window)).await?;
        tracing::debug!(
            branch_id = branch.id,
            action_from = window.action_from,
            action_to = window.action_to,
            stage = window.stage,
            "Enqueued work unit"
        );
    }

    Ok(())
}
