//! Worker: leases work units, runs their action windows, records
//! results, and finalizes branches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use overseer_core::error::FailureKind;
use overseer_core::log::{LogCategory, LogLevel, LogPhase};
use overseer_core::queue::retry_backoff;
use overseer_core::safety::SafetyRules;
use overseer_core::state_machine;
use overseer_db::models::action_result::CreateActionResult;
use overseer_db::models::branch::Branch;
use overseer_db::models::job::JobAction;
use overseer_db::models::log_entry::CreateLogEntry;
use overseer_db::models::status::{BranchStatus, WorkUnitStatus, WorkerStatus};
use overseer_db::models::work_unit::WorkUnit;
use overseer_db::repositories::{
    ActionResultRepo, BranchRepo, ExecutionRepo, JobRepo, LogRepo, SerialRepo, TargetRepo,
    WorkUnitRepo, WorkerRepo,
};
use overseer_db::DbPool;
use overseer_events::{types as events, EventBus, OrchestrationEvent};
use overseer_orchestrator::coordinator::{self, plan_windows};
use overseer_orchestrator::{OrchestratorConfig, ResolvedTarget};

use crate::artifact::ArtifactStore;
use crate::connection::ConnectionManager;
use crate::runner::{ActionRecord, ActionRunner};

/// How long an idle worker sleeps between lease polls.
const IDLE_POLL: Duration = Duration::from_secs(2);

/// A single worker loop. Run several for a pool.
pub struct Worker {
    name: String,
    pool: DbPool,
    config: OrchestratorConfig,
    bus: Arc<EventBus>,
    connections: Arc<ConnectionManager>,
    artifacts: Arc<dyn ArtifactStore>,
    runner: ActionRunner,
    worker_id: Option<i64>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        pool: DbPool,
        config: OrchestratorConfig,
        bus: Arc<EventBus>,
        connections: Arc<ConnectionManager>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let runner = ActionRunner::new(
            SafetyRules::default_rules(),
            config.inline_output_limit,
            Duration::from_secs(600),
        );
        Self {
            name: name.into(),
            pool,
            config,
            bus,
            connections,
            artifacts,
            runner,
            worker_id: None,
        }
    }

    /// Register, then lease and process units until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        match WorkerRepo::register(&self.pool, &self.name, hostname().as_deref()).await {
            Ok(node) => {
                self.worker_id = Some(node.id);
                tracing::info!(worker = %self.name, worker_id = node.id, "Worker registered");
            }
            Err(e) => {
                tracing::error!(worker = %self.name, error = %e, "Worker registration failed");
                return;
            }
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }
            match WorkUnitRepo::lease_next(
                &self.pool,
                &self.name,
                chrono::Duration::from_std(self.config.lease).unwrap_or_default(),
            )
            .await
            {
                Ok(Some(unit)) => {
                    self.heartbeat(WorkerStatus::Busy).await;
                    if let Err(e) = self.process_unit(&unit).await {
                        tracing::error!(
                            worker = %self.name,
                            work_unit_id = unit.id,
                            error = %e,
                            "Work unit processing failed"
                        );
                    }
                }
                Ok(None) => {
                    self.heartbeat(WorkerStatus::Idle).await;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(worker = %self.name, error = %e, "Lease poll failed");
                    tokio::time::sleep(IDLE_POLL).await;
                }
            }
        }

        self.heartbeat(WorkerStatus::Offline).await;
        tracing::info!(worker = %self.name, "Worker stopped");
    }

    async fn heartbeat(&self, status: WorkerStatus) {
        if let Some(id) = self.worker_id {
            if let Err(e) = WorkerRepo::heartbeat(&self.pool, id, status).await {
                tracing::warn!(worker = %self.name, error = %e, "Heartbeat failed");
            }
        }
    }

    /// Process one leased unit end to end.
    async fn process_unit(&self, unit: &WorkUnit) -> Result<(), sqlx::Error> {
        let Some(branch) = BranchRepo::find_by_id(&self.pool, unit.branch_id).await? else {
            WorkUnitRepo::settle(&self.pool, unit.id, &self.name, WorkUnitStatus::Cancelled)
                .await?;
            return Ok(());
        };
        let Some(execution) = ExecutionRepo::find_by_id(&self.pool, branch.execution_id).await?
        else {
            WorkUnitRepo::settle(&self.pool, unit.id, &self.name, WorkUnitStatus::Cancelled)
                .await?;
            return Ok(());
        };

        // Cooperative cancellation: a unit leased after the execution went
        // terminal is dropped without running anything.
        if state_machine::is_terminal(execution.status_id)
            || state_machine::is_terminal(branch.status_id)
        {
            WorkUnitRepo::settle(&self.pool, unit.id, &self.name, WorkUnitStatus::Cancelled)
                .await?;
            return Ok(());
        }

        ExecutionRepo::mark_started(&self.pool, execution.id).await?;
        if BranchRepo::mark_started(&self.pool, branch.id).await? {
            self.bus.publish(
                OrchestrationEvent::new(events::BRANCH_STARTED)
                    .with_source("branch", branch.id)
                    .with_serial(&branch.serial),
            );
        }

        let job = JobRepo::find_by_id(&self.pool, execution.job_id).await?;
        let default_timeout = job
            .map(|j| j.default_action_timeout_secs)
            .unwrap_or(600);
        let all_actions = JobRepo::list_actions(&self.pool, execution.job_id).await?;
        let window_actions: Vec<JobAction> = all_actions
            .iter()
            .filter(|a| a.position >= unit.action_from && a.position <= unit.action_to)
            .cloned()
            .map(|mut a| {
                // Per-action override wins; otherwise the job default.
                a.timeout_secs = a.timeout_secs.or(Some(default_timeout));
                a
            })
            .collect();

        // Resolve and connect.
        let target = match self.resolve_target(&branch).await? {
            Ok(target) => target,
            Err(message) => {
                self.fail_branch_fatal(
                    unit,
                    &branch,
                    FailureKind::TargetResolution,
                    &message,
                )
                .await?;
                return Ok(());
            }
        };

        tracing::debug!(
            worker = %self.name,
            branch_serial = %branch.serial,
            target = %target.hostname,
            actions = window_actions.len(),
            "Running work unit"
        );
        // A window whose combined timeouts outlast the lease would be
        // reclaimed mid-run; stretch the lease to cover it up front.
        let window_secs: i64 = window_actions
            .iter()
            .map(|a| a.timeout_secs.unwrap_or(default_timeout) as i64)
            .sum();
        if window_secs > self.config.lease.as_secs() as i64 {
            WorkUnitRepo::extend_lease(
                &self.pool,
                unit.id,
                &self.name,
                chrono::Duration::seconds(window_secs + 60),
            )
            .await?;
        }

        let session = match self.connections.open(&target).await {
            Ok(session) => session,
            Err(e) => {
                self.handle_connection_failure(unit, &branch, &e.to_string()).await?;
                return Ok(());
            }
        };

        let records = self
            .runner
            .run_window(session.as_ref(), &window_actions, self.artifacts.as_ref())
            .await;
        self.record_results(unit, &branch, &records).await?;

        // Retriable window failure: hand the unit back with backoff while
        // attempts remain. Everything else settles here.
        let retriable = records.iter().any(|r| {
            !r.informational_only
                && r.error_kind.map(|k| k.is_retriable()).unwrap_or(false)
        });
        let fatal = records
            .iter()
            .any(|r| !r.outcome().succeeded && !r.informational_only);

        if fatal && retriable && unit.attempt_count < unit.max_attempts {
            self.requeue_unit(unit, &branch).await?;
            return Ok(());
        }

        if fatal {
            let exit_code = records.iter().find_map(|r| match r.exit_code {
                Some(code) if code != 0 => Some(code),
                _ => None,
            });
            let summary = failure_summary(&records, exit_code);
            WorkUnitRepo::settle(&self.pool, unit.id, &self.name, WorkUnitStatus::Failed)
                .await?;
            self.finalize_branch(&branch, BranchStatus::Failed, exit_code.or(Some(1)), &summary)
                .await?;
            return Ok(());
        }

        if !WorkUnitRepo::settle(&self.pool, unit.id, &self.name, WorkUnitStatus::Completed)
            .await?
        {
            // Lease expired mid-run and the supervisor requeued the unit;
            // the results above stand as a recorded attempt.
            tracing::warn!(
                worker = %self.name,
                work_unit_id = unit.id,
                "Lease lost before settle, results recorded without settling"
            );
            return Ok(());
        }

        // Branch completes once every planned window has a completed unit.
        if self.branch_windows_complete(&all_actions, branch.id).await? {
            let hard_failures =
                ActionResultRepo::count_hard_failures(&self.pool, branch.id).await?;
            let (status, exit_code, summary) = if hard_failures == 0 {
                (BranchStatus::Completed, Some(0), "all actions completed".to_string())
            } else {
                (
                    BranchStatus::Failed,
                    Some(1),
                    format!("{hard_failures} action(s) failed"),
                )
            };
            self.finalize_branch(&branch, status, exit_code, &summary).await?;
        }

        Ok(())
    }

    async fn resolve_target(
        &self,
        branch: &Branch,
    ) -> Result<Result<ResolvedTarget, String>, sqlx::Error> {
        let Some(target_id) = branch.target_id else {
            return Ok(Err(format!(
                "target {} no longer exists",
                branch.target_serial
            )));
        };
        let Some(target) = TargetRepo::find_by_id(&self.pool, target_id).await? else {
            return Ok(Err(format!("target {target_id} not found")));
        };
        if !target.is_active() {
            return Ok(Err(format!(
                "target {} was deleted after the execution started",
                target.serial
            )));
        }
        Ok(Ok(ResolvedTarget {
            id: target.id,
            serial: target.serial,
            hostname: target.hostname,
            connection_method: target.connection_method,
            credentials_ref: target.credentials_ref,
        }))
    }

    /// Insert one action result row per record, serials allocated under
    /// the branch in one transaction.
    async fn record_results(
        &self,
        unit: &WorkUnit,
        branch: &Branch,
        records: &[ActionRecord],
    ) -> Result<(), sqlx::Error> {
        let scope = overseer_core::serial::child_scope(&branch.serial);
        let mut tx = self.pool.begin().await?;
        for record in records {
            let seq = SerialRepo::next_seq(&mut *tx, &scope).await?;
            let serial = overseer_core::serial::child_serial(&branch.serial, seq);
            ActionResultRepo::insert(
                &mut *tx,
                CreateActionResult {
                    serial,
                    branch_id: branch.id,
                    job_action_id: record.job_action_id,
                    position: record.position,
                    status_id: record.status_id,
                    exit_code: record.exit_code,
                    stdout: record.stdout.clone(),
                    stdout_ref: record.stdout_ref.clone(),
                    stderr: record.stderr.clone(),
                    stderr_ref: record.stderr_ref.clone(),
                    duration_ms: record.duration_ms,
                    retry_count: (unit.attempt_count - 1).max(0),
                    error_kind: record.error_kind.map(|k| k.as_str().to_string()),
                    error_message: record.error_message.clone(),
                },
            )
            .await?;
        }
        LogRepo::insert(
            &mut *tx,
            CreateLogEntry {
                execution_id: branch.execution_id,
                branch_id: Some(branch.id),
                phase: LogPhase::ResultCollection.as_str().into(),
                level: LogLevel::Info.as_str().into(),
                category: LogCategory::CommandExecution.as_str().into(),
                message: format!(
                    "Recorded {} action result(s) for window {}..={}",
                    records.len(),
                    unit.action_from,
                    unit.action_to
                ),
                detail: serde_json::json!({
                    "work_unit_id": unit.id,
                    "attempt_count": unit.attempt_count,
                }),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Non-retriable branch-level failure (target gone, safety, ...).
    async fn fail_branch_fatal(
        &self,
        unit: &WorkUnit,
        branch: &Branch,
        kind: FailureKind,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        WorkUnitRepo::settle(&self.pool, unit.id, &self.name, WorkUnitStatus::Failed).await?;

        let mut conn = self.pool.acquire().await?;
        LogRepo::insert(
            &mut *conn,
            CreateLogEntry {
                execution_id: branch.execution_id,
                branch_id: Some(branch.id),
                phase: LogPhase::TargetSelection.as_str().into(),
                level: LogLevel::Error.as_str().into(),
                category: LogCategory::System.as_str().into(),
                message: message.to_string(),
                detail: serde_json::json!({
                    "work_unit_id": unit.id,
                    "error_kind": kind.as_str(),
                }),
            },
        )
        .await?;
        drop(conn);

        self.finalize_branch(branch, BranchStatus::Failed, None, message).await
    }

    /// Connection failures are retriable until attempts run out.
    async fn handle_connection_failure(
        &self,
        unit: &WorkUnit,
        branch: &Branch,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        tracing::warn!(
            worker = %self.name,
            branch_serial = %branch.serial,
            attempt = unit.attempt_count,
            max_attempts = unit.max_attempts,
            message,
            "Connection failed"
        );
        let mut conn = self.pool.acquire().await?;
        LogRepo::insert(
            &mut *conn,
            CreateLogEntry {
                execution_id: branch.execution_id,
                branch_id: Some(branch.id),
                phase: LogPhase::Communication.as_str().into(),
                level: LogLevel::Warning.as_str().into(),
                category: LogCategory::Communication.as_str().into(),
                message: message.to_string(),
                detail: serde_json::json!({
                    "work_unit_id": unit.id,
                    "attempt_count": unit.attempt_count,
                    "error_kind": FailureKind::Connection.as_str(),
                }),
            },
        )
        .await?;
        drop(conn);

        if unit.attempt_count < unit.max_attempts {
            self.requeue_unit(unit, branch).await
        } else {
            WorkUnitRepo::settle(&self.pool, unit.id, &self.name, WorkUnitStatus::Failed)
                .await?;
            self.finalize_branch(
                branch,
                BranchStatus::Failed,
                None,
                &format!("connection failed after {} attempt(s)", unit.attempt_count),
            )
            .await
        }
    }

    /// Hand a retriable unit back to the queue with backoff.
    async fn requeue_unit(&self, unit: &WorkUnit, branch: &Branch) -> Result<(), sqlx::Error> {
        let delay = retry_backoff(
            self.config.retry_base,
            unit.attempt_count as u32,
            self.config.retry_cap,
        );
        let scheduled_for = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        if WorkUnitRepo::requeue(&self.pool, unit.id, &self.name, scheduled_for).await? {
            BranchRepo::bump_retry_count(&self.pool, branch.id).await?;
            tracing::info!(
                worker = %self.name,
                work_unit_id = unit.id,
                branch_serial = %branch.serial,
                backoff_secs = delay.as_secs(),
                "Work unit requeued for retry"
            );
            self.bus.publish(
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

    async fn finalize_branch(
        &self,
        branch: &Branch,
        status: BranchStatus,
        exit_code: Option<i32>,
        summary: &str,
    ) -> Result<(), sqlx::Error> {
        if !BranchRepo::finalize(&self.pool, branch.id, status.id(), exit_code, summary).await? {
            return Ok(());
        }
        tracing::info!(
            worker = %self.name,
            branch_serial = %branch.serial,
            status = state_machine::status_name(status.id()),
            "Branch finalized"
        );
        let event_type = if status == BranchStatus::Completed {
            events::BRANCH_COMPLETED
        } else {
            events::BRANCH_FAILED
        };
        self.bus.publish(
            OrchestrationEvent::new(event_type)
                .with_source("branch", branch.id)
                .with_serial(&branch.serial)
                .with_payload(serde_json::json!({"summary": summary})),
        );

        coordinator::rollup_execution(&self.pool, &self.bus, branch.execution_id).await
    }

    /// Whether every planned window of the branch has a completed unit.
    async fn branch_windows_complete(
        &self,
        all_actions: &[JobAction],
        branch_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let windows = plan_windows(all_actions);
        let units = WorkUnitRepo::list_by_branch(&self.pool, branch_id).await?;
        Ok(windows.iter().all(|w| {
            units.iter().any(|u| {
                u.action_from == w.action_from
                    && u.action_to == w.action_to
                    && u.status_id == WorkUnitStatus::Completed.id()
            })
        }))
    }
}

/// Summary line for a branch failing without a retry.
///
/// A plain non-zero exit carries no taxonomy kind; summarize it by exit
/// code instead of blaming the retry machinery.
fn failure_summary(records: &[ActionRecord], exit_code: Option<i32>) -> String {
    match records.iter().find_map(|r| r.error_kind) {
        Some(kind) => format!("failed with {kind}"),
        None => match exit_code {
            Some(code) => format!("failed with exit code {code}"),
            None => "action failed".to_string(),
        },
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok()
}

#[cfg(test)]
mod tests {
    use overseer_db::models::status::ActionStatus;

    use super::*;

    fn record(error_kind: Option<FailureKind>, exit_code: Option<i32>) -> ActionRecord {
        ActionRecord {
            job_action_id: 1,
            position: 1,
            status_id: ActionStatus::Failed.id(),
            exit_code,
            stdout: None,
            stdout_ref: None,
            stderr: None,
            stderr_ref: None,
            duration_ms: Some(5),
            error_kind,
            error_message: None,
            informational_only: false,
        }
    }

    #[test]
    fn summary_names_the_failure_kind_when_present() {
        let records = [record(Some(FailureKind::SafetyViolation), None)];
        assert_eq!(
            failure_summary(&records, None),
            "failed with safety_violation"
        );
    }

    #[test]
    fn plain_nonzero_exit_summarizes_by_exit_code() {
        let records = [record(None, Some(3))];
        assert_eq!(failure_summary(&records, Some(3)), "failed with exit code 3");
        assert_eq!(failure_summary(&records, None), "action failed");
    }
}
