//! Execution coordinator.
//!
//! Turns a job trigger into a persisted execution tree: the execution
//! row, one branch per resolved target, and the first dispatch stage of
//! work units, all inside a single transaction. Nothing is visible to
//! workers until the whole tree committed.

use std::sync::Arc;

use chrono::{Datelike, Utc};

use overseer_core::action::ActionKind;
use overseer_core::log::{LogCategory, LogLevel, LogPhase};
use overseer_core::queue::{self, PlannedAction, UnitWindow};
use overseer_core::types::DbId;
use overseer_db::models::execution::{Execution, ExecutionListQuery};
use overseer_db::models::job::{CreateJob, Job, JobAction};
use overseer_db::models::log_entry::CreateLogEntry;
use overseer_db::models::status::ExecutionStatus;
use overseer_db::models::work_unit::CreateWorkUnit;
use overseer_db::repositories::{
    BranchRepo, ExecutionRepo, JobRepo, LogRepo, SerialRepo, WorkUnitRepo,
};
use overseer_db::DbPool;
use overseer_events::{types as events, EventBus, OrchestrationEvent};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::targets::{self, TargetDirectory};

/// Front door of the orchestration engine.
pub struct Coordinator {
    pool: DbPool,
    config: OrchestratorConfig,
    bus: Arc<EventBus>,
    directory: Arc<dyn TargetDirectory>,
}

impl Coordinator {
    pub fn new(
        pool: DbPool,
        config: OrchestratorConfig,
        bus: Arc<EventBus>,
        directory: Arc<dyn TargetDirectory>,
    ) -> Self {
        Self {
            pool,
            config,
            bus,
            directory,
        }
    }

    // -----------------------------------------------------------------------
    // Job definitions
    // -----------------------------------------------------------------------

    /// Create a job with its ordered actions and target associations.
    ///
    /// The serial is allocated and the job inserted in one transaction, so
    /// serials are gapless under concurrent creation.
    pub async fn create_job(&self, input: CreateJob) -> Result<Job, OrchestratorError> {
        if input.actions.is_empty() {
            return Err(OrchestratorError::Validation(
                "a job needs at least one action".into(),
            ));
        }
        for action in &input.actions {
            if ActionKind::parse(&action.kind).is_none() {
                return Err(OrchestratorError::Validation(format!(
                    "unknown action kind: {}",
                    action.kind
                )));
            }
        }

        let year = Utc::now().year();
        let mut tx = self.pool.begin().await?;

        let seq = SerialRepo::next_seq(&mut *tx, &overseer_core::serial::job_scope(year)).await?;
        let serial = overseer_core::serial::job_serial(year, seq);
        let job = JobRepo::create(&mut *tx, &serial, &input).await?;

        tx.commit().await?;

        tracing::info!(job_id = job.id, serial = %job.serial, "Job created");
        Ok(job)
    }

    /// Jobs are frozen once they have run. Returns an error if the job
    /// has any execution, otherwise nothing (callers perform the edit).
    pub async fn ensure_mutable(&self, job_id: DbId) -> Result<(), OrchestratorError> {
        if JobRepo::has_executions(&self.pool, job_id).await? {
            return Err(OrchestratorError::InvalidState(
                "job has executions and is frozen".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Triggering
    // -----------------------------------------------------------------------

    /// Trigger an execution of a job.
    ///
    /// `explicit_target_ids` overrides the job's stored target set for this
    /// run. Target resolution failure aborts before anything persists:
    /// there is never an execution with zero branches.
    pub async fn start_execution(
        &self,
        job_id: DbId,
        explicit_target_ids: &[DbId],
        triggered_by: &str,
    ) -> Result<Execution, OrchestratorError> {
        let job = JobRepo::find_by_id(&self.pool, job_id)
            .await?
            .ok_or(OrchestratorError::NotFound {
                entity: "job",
                id: job_id,
            })?;
        let actions = JobRepo::list_actions(&self.pool, job_id).await?;
        if actions.is_empty() {
            return Err(OrchestratorError::InvalidState(
                "job has no actions".into(),
            ));
        }

        let resolved = targets::resolve_for_job(
            self.directory.as_ref(),
            &self.pool,
            job_id,
            explicit_target_ids,
            job.allow_all_targets_fallback,
        )
        .await?;

        // Deterministic branch order: by target serial. This is also the
        // rollout order under serialize_targets.
        let mut resolved = resolved;
        resolved.sort_by(|a, b| a.serial.cmp(&b.serial));

        let windows = plan_windows(&actions);

        let mut tx = self.pool.begin().await?;

        let exec_seq =
            SerialRepo::next_seq(&mut *tx, &overseer_core::serial::child_scope(&job.serial))
                .await?;
        let exec_serial = overseer_core::serial::child_serial(&job.serial, exec_seq);
        let execution =
            ExecutionRepo::create(&mut *tx, job.id, &exec_serial, job.priority, triggered_by)
                .await?;

        let branch_scope = overseer_core::serial::child_scope(&exec_serial);
        let mut branch_ids = Vec::with_capacity(resolved.len());
        for target in &resolved {
            let seq = SerialRepo::next_seq(&mut *tx, &branch_scope).await?;
            let serial = overseer_core::serial::child_serial(&exec_serial, seq);
            let branch =
                BranchRepo::create(&mut *tx, execution.id, &serial, target.id, &target.serial)
                    .await?;
            branch_ids.push(branch.id);
        }

        // First dispatch stage. Under serialize_targets only the first
        // branch is enqueued; the dispatcher releases the rest one at a
        // time as branches finish.
        let eligible = if job.serialize_targets {
            &branch_ids[..1]
        } else {
            &branch_ids[..]
        };
        for &branch_id in eligible {
            for window in windows.iter().filter(|w| w.stage == 0) {
                WorkUnitRepo::enqueue(&mut *tx, unit_for_window(&job, branch_id, window)).await?;
            }
        }

        LogRepo::insert(
            &mut *tx,
            CreateLogEntry {
                execution_id: execution.id,
                branch_id: None,
                phase: LogPhase::Creation.as_str().into(),
                level: LogLevel::Info.as_str().into(),
                category: LogCategory::System.as_str().into(),
                message: format!(
                    "Execution {} created with {} branch(es)",
                    exec_serial,
                    resolved.len()
                ),
                detail: serde_json::json!({
                    "job_serial": job.serial,
                    "branch_count": resolved.len(),
                    "serialize_targets": job.serialize_targets,
                    "target_serials": resolved.iter().map(|t| t.serial.as_str()).collect::<Vec<_>>(),
                    "triggered_by": triggered_by,
                }),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            execution_id = execution.id,
            serial = %execution.serial,
            branches = resolved.len(),
            "Execution started"
        );
        self.bus.publish(
            OrchestrationEvent::new(events::EXECUTION_STARTED)
                .with_source("execution", execution.id)
                .with_serial(&execution.serial)
                .with_payload(serde_json::json!({
                    "job_id": job.id,
                    "branch_count": resolved.len(),
                })),
        );

        Ok(execution)
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Request cancellation of an execution.
    ///
    /// Cooperative: queued branches and work units are cancelled
    /// immediately, in-flight work finishes its current window and is
    /// recorded, the execution lands on `cancelled` regardless of late
    /// results.
    pub async fn cancel_execution(&self, execution_id: DbId) -> Result<bool, OrchestratorError> {
        let execution = ExecutionRepo::find_by_id(&self.pool, execution_id)
            .await?
            .ok_or(OrchestratorError::NotFound {
                entity: "execution",
                id: execution_id,
            })?;

        let transitioned = ExecutionRepo::cancel(&self.pool, execution_id).await?;
        if !transitioned {
            // Already terminal.
            return Ok(false);
        }

        let units = WorkUnitRepo::cancel_queued_for_execution(&self.pool, execution_id).await?;
        let branches = BranchRepo::cancel_queued(&self.pool, execution_id).await?;

        let mut conn = self.pool.acquire().await?;
        LogRepo::insert(
            &mut *conn,
            CreateLogEntry {
                execution_id,
                branch_id: None,
                phase: LogPhase::Completion.as_str().into(),
                level: LogLevel::Warning.as_str().into(),
                category: LogCategory::System.as_str().into(),
                message: "Cancellation requested".into(),
                detail: serde_json::json!({
                    "cancelled_units": units,
                    "cancelled_branches": branches,
                    "error_kind": overseer_core::error::FailureKind::CancellationRequested.as_str(),
                }),
            },
        )
        .await?;

        tracing::info!(
            execution_id,
            serial = %execution.serial,
            cancelled_units = units,
            cancelled_branches = branches,
            "Execution cancelled"
        );
        self.bus.publish(
            OrchestrationEvent::new(events::EXECUTION_CANCELLED)
                .with_source("execution", execution_id)
                .with_serial(&execution.serial),
        );

        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    pub async fn get_execution(
        &self,
        execution_id: DbId,
    ) -> Result<Execution, OrchestratorError> {
        ExecutionRepo::find_by_id(&self.pool, execution_id)
            .await?
            .ok_or(OrchestratorError::NotFound {
                entity: "execution",
                id: execution_id,
            })
    }

    pub async fn list_executions(
        &self,
        job_id: DbId,
        query: &ExecutionListQuery,
    ) -> Result<Vec<Execution>, OrchestratorError> {
        Ok(ExecutionRepo::list_by_job(&self.pool, job_id, query).await?)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

/// Plan the dispatch windows for a job's action list.
pub fn plan_windows(actions: &[JobAction]) -> Vec<UnitWindow> {
    let planned: Vec<PlannedAction> = actions
        .iter()
        .map(|a| PlannedAction {
            position: a.position,
            kind: ActionKind::parse(&a.kind).unwrap_or(ActionKind::Command),
            parallel_safe: a.parallel_safe,
        })
        .collect();
    queue::plan_unit_windows(&planned)
}

/// Build the enqueue DTO for one window of one branch.
pub fn unit_for_window(job: &Job, branch_id: DbId, window: &UnitWindow) -> CreateWorkUnit {
    CreateWorkUnit {
        branch_id,
        queue_class: window.class.as_str().into(),
        priority: window.class.cap_priority(job.priority),
        scheduled_for: Utc::now(),
        max_attempts: job.max_attempts,
        action_from: window.action_from,
        action_to: window.action_to,
    }
}

/// Roll the execution status up from its branches and finalize + publish
/// when it lands on a terminal status. Shared by the dispatcher, the
/// supervisor, and the worker pool.
pub async fn rollup_execution(
    pool: &DbPool,
    bus: &EventBus,
    execution_id: DbId,
) -> Result<(), sqlx::Error> {
    let Some(execution) = ExecutionRepo::find_by_id(pool, execution_id).await? else {
        return Ok(());
    };
    if overseer_core::state_machine::is_terminal(execution.status_id) {
        return Ok(());
    }

    let branch_statuses = BranchRepo::list_status_ids(pool, execution_id).await?;
    let next = overseer_core::rollup::execution_status(execution.status_id, &branch_statuses);
    if !overseer_core::state_machine::is_terminal(next) {
        if next == overseer_core::state_machine::STATUS_RUNNING
            && execution.status_id == ExecutionStatus::Queued.id()
        {
            ExecutionRepo::mark_started(pool, execution_id).await?;
        }
        return Ok(());
    }

    if ExecutionRepo::finalize(pool, execution_id, next).await? {
        tracing::info!(
            execution_id,
            serial = %execution.serial,
            status = overseer_core::state_machine::status_name(next),
            "Execution finalized"
        );
        if let Some(event_type) = events::execution_terminal_event(next) {
            bus.publish(
                OrchestrationEvent::new(event_type)
                    .with_source("execution", execution_id)
                    .with_serial(&execution.serial),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job(priority: i32) -> Job {
        Job {
            id: 1,
            uuid: Uuid::now_v7(),
            serial: "J20250001".into(),
            name: "test".into(),
            description: None,
            priority,
            serialize_targets: false,
            allow_all_targets_fallback: false,
            default_action_timeout_secs: 600,
            max_attempts: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn system_class_units_are_capped_at_normal_priority() {
        use overseer_core::queue::{QueueClass, PRIORITY_CRITICAL, PRIORITY_NORMAL};

        let job = job(PRIORITY_CRITICAL);
        let exec_window = UnitWindow {
            action_from: 1,
            action_to: 2,
            stage: 0,
            class: QueueClass::Execution,
        };
        let sys_window = UnitWindow {
            action_from: 3,
            action_to: 3,
            stage: 1,
            class: QueueClass::System,
        };

        let exec_unit = unit_for_window(&job, 7, &exec_window);
        assert_eq!(exec_unit.priority, PRIORITY_CRITICAL);
        assert_eq!(exec_unit.queue_class, "execution");
        assert_eq!(exec_unit.action_from, 1);
        assert_eq!(exec_unit.action_to, 2);

        let sys_unit = unit_for_window(&job, 7, &sys_window);
        assert_eq!(sys_unit.priority, PRIORITY_NORMAL);
        assert_eq!(sys_unit.queue_class, "system");
    }

    #[test]
    fn units_inherit_the_job_max_attempts() {
        let job = job(0);
        let window = UnitWindow {
            action_from: 1,
            action_to: 1,
            stage: 0,
            class: overseer_core::queue::QueueClass::Execution,
        };
        let unit = unit_for_window(&job, 1, &window);
        assert_eq!(unit.max_attempts, 3);
        assert_eq!(unit.branch_id, 1);
    }
}
