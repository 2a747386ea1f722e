//! Integration tests for the coordinator: execution tree creation,
//! fan-out, serialized rollout gating, cancellation, and target
//! resolution failure.

use std::sync::Arc;

use sqlx::PgPool;

use overseer_db::models::execution::ExecutionListQuery;
use overseer_db::models::job::{CreateJob, CreateJobAction};
use overseer_db::models::status::{BranchStatus, ExecutionStatus, WorkUnitStatus};
use overseer_db::models::target::CreateTarget;
use overseer_db::repositories::{BranchRepo, ExecutionRepo, TargetRepo, WorkUnitRepo};
use overseer_events::EventBus;
use overseer_orchestrator::{
    Coordinator, OrchestratorConfig, OrchestratorError, PgTargetDirectory,
};

fn coordinator(pool: &PgPool) -> Coordinator {
    Coordinator::new(
        pool.clone(),
        OrchestratorConfig::default(),
        Arc::new(EventBus::default()),
        Arc::new(PgTargetDirectory::new(pool.clone())),
    )
}

async fn make_target(pool: &PgPool, serial: &str, name: &str) -> i64 {
    TargetRepo::create(
        pool,
        serial,
        &CreateTarget {
            name: name.into(),
            hostname: format!("{name}.internal"),
            connection_method: "local".into(),
            credentials_ref: None,
        },
    )
    .await
    .unwrap()
    .id
}

fn command(text: &str) -> CreateJobAction {
    CreateJobAction {
        kind: "command".into(),
        payload: serde_json::json!({"command": text}),
        timeout_secs: None,
        continue_on_failure: false,
        informational_only: false,
        parallel_safe: false,
    }
}

fn job_input(target_ids: Vec<i64>) -> CreateJob {
    CreateJob {
        name: "nightly patch".into(),
        description: None,
        priority: Some(10),
        serialize_targets: None,
        allow_all_targets_fallback: None,
        default_action_timeout_secs: None,
        max_attempts: None,
        actions: vec![command("uptime"), command("df -h")],
        target_ids,
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn start_execution_builds_the_full_tree(pool: PgPool) {
    let t1 = make_target(&pool, "T0001", "node-a").await;
    let t2 = make_target(&pool, "T0002", "node-b").await;
    let coord = coordinator(&pool);

    let job = coord.create_job(job_input(vec![t1, t2])).await.unwrap();
    assert!(job.serial.starts_with('J'));

    let execution = coord.start_execution(job.id, &[], "manual").await.unwrap();
    assert_eq!(execution.serial, format!("{}.0001", job.serial));
    assert_eq!(execution.status_id, ExecutionStatus::Queued.id());
    assert_eq!(execution.priority, 10);

    // Serial and UUID both address the same row.
    let by_serial = ExecutionRepo::find_by_serial(&pool, &execution.serial)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_serial.id, execution.id);
    let by_uuid = ExecutionRepo::find_by_uuid(&pool, execution.uuid).await.unwrap().unwrap();
    assert_eq!(by_uuid.id, execution.id);

    let branches = BranchRepo::list_by_execution(&pool, execution.id).await.unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0].serial, format!("{}.0001", execution.serial));
    assert_eq!(branches[1].serial, format!("{}.0002", execution.serial));
    assert!(branches.iter().all(|b| b.status_id == BranchStatus::Queued.id()));
    let branch = BranchRepo::find_by_serial(&pool, &branches[0].serial)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(branch.uuid, branches[0].uuid);

    // Both actions are sequential: one stage-0 unit per branch, covering
    // the whole window.
    for branch in &branches {
        let units = WorkUnitRepo::list_by_branch(&pool, branch.id).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].action_from, 1);
        assert_eq!(units[0].action_to, 2);
        assert_eq!(units[0].priority, 10);
        assert_eq!(units[0].status_id, WorkUnitStatus::Queued.id());
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn serialized_rollout_enqueues_only_the_first_branch(pool: PgPool) {
    let t1 = make_target(&pool, "T0001", "node-a").await;
    let t2 = make_target(&pool, "T0002", "node-b").await;
    let coord = coordinator(&pool);

    let mut input = job_input(vec![t1, t2]);
    input.serialize_targets = Some(true);
    let job = coord.create_job(input).await.unwrap();
    let execution = coord.start_execution(job.id, &[], "manual").await.unwrap();

    let branches = BranchRepo::list_by_execution(&pool, execution.id).await.unwrap();
    let first_units = WorkUnitRepo::list_by_branch(&pool, branches[0].id).await.unwrap();
    let second_units = WorkUnitRepo::list_by_branch(&pool, branches[1].id).await.unwrap();
    assert_eq!(first_units.len(), 1);
    assert!(second_units.is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn zero_resolvable_targets_aborts_before_anything_persists(pool: PgPool) {
    let t1 = make_target(&pool, "T0001", "node-a").await;
    TargetRepo::soft_delete(&pool, t1).await.unwrap();
    let coord = coordinator(&pool);

    let job = coord.create_job(job_input(vec![t1])).await.unwrap();
    let err = coord.start_execution(job.id, &[], "manual").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::TargetResolution(_)));

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM executions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn job_without_targets_needs_the_explicit_fallback(pool: PgPool) {
    let _t1 = make_target(&pool, "T0001", "node-a").await;
    let coord = coordinator(&pool);

    // No associations, no opt-in: refuse.
    let job = coord.create_job(job_input(vec![])).await.unwrap();
    let err = coord.start_execution(job.id, &[], "manual").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::TargetResolution(_)));

    // Opted in: fans out to all active targets.
    let mut input = job_input(vec![]);
    input.allow_all_targets_fallback = Some(true);
    let job = coord.create_job(input).await.unwrap();
    let execution = coord.start_execution(job.id, &[], "manual").await.unwrap();
    let branches = BranchRepo::list_by_execution(&pool, execution.id).await.unwrap();
    assert_eq!(branches.len(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_clears_queued_work_and_is_sticky(pool: PgPool) {
    let t1 = make_target(&pool, "T0001", "node-a").await;
    let coord = coordinator(&pool);
    let job = coord.create_job(job_input(vec![t1])).await.unwrap();
    let execution = coord.start_execution(job.id, &[], "manual").await.unwrap();

    assert!(coord.cancel_execution(execution.id).await.unwrap());
    // Second cancel is a no-op.
    assert!(!coord.cancel_execution(execution.id).await.unwrap());

    let row = coord.get_execution(execution.id).await.unwrap();
    assert_eq!(row.status_id, ExecutionStatus::Cancelled.id());

    let branches = BranchRepo::list_by_execution(&pool, execution.id).await.unwrap();
    assert!(branches.iter().all(|b| b.status_id == BranchStatus::Cancelled.id()));
    for branch in &branches {
        let units = WorkUnitRepo::list_by_branch(&pool, branch.id).await.unwrap();
        assert!(units.iter().all(|u| u.status_id == WorkUnitStatus::Cancelled.id()));
    }

    // Nothing is leasable after cancellation.
    assert!(WorkUnitRepo::lease_next(&pool, "w1", chrono::Duration::seconds(300))
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sequential_serials_across_executions(pool: PgPool) {
    let t1 = make_target(&pool, "T0001", "node-a").await;
    let coord = coordinator(&pool);
    let job = coord.create_job(job_input(vec![t1])).await.unwrap();

    let first = coord.start_execution(job.id, &[], "manual").await.unwrap();
    let second = coord.start_execution(job.id, &[], "schedule").await.unwrap();
    assert_eq!(first.serial, format!("{}.0001", job.serial));
    assert_eq!(second.serial, format!("{}.0002", job.serial));
    assert_eq!(second.triggered_by, "schedule");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn jobs_freeze_once_they_have_run(pool: PgPool) {
    let t1 = make_target(&pool, "T0001", "node-a").await;
    let coord = coordinator(&pool);
    let job = coord.create_job(job_input(vec![t1])).await.unwrap();

    coord.ensure_mutable(job.id).await.unwrap();
    coord.start_execution(job.id, &[], "manual").await.unwrap();
    let err = coord.ensure_mutable(job.id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState(_)));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn execution_listing_filters_and_pages(pool: PgPool) {
    let t1 = make_target(&pool, "T0001", "node-a").await;
    let coord = coordinator(&pool);
    let job = coord.create_job(job_input(vec![t1])).await.unwrap();

    let first = coord.start_execution(job.id, &[], "manual").await.unwrap();
    coord.start_execution(job.id, &[], "manual").await.unwrap();
    coord.cancel_execution(first.id).await.unwrap();

    let all = coord
        .list_executions(job.id, &ExecutionListQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let cancelled = coord
        .list_executions(
            job.id,
            &ExecutionListQuery {
                status_id: Some(ExecutionStatus::Cancelled.id()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, first.id);

    let page = coord
        .list_executions(
            job.id,
            &ExecutionListQuery {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}
