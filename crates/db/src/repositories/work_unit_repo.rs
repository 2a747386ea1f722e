//! Repository for the `work_units` table: the dispatch queue.
//!
//! Leasing is a single atomic UPDATE over a `FOR UPDATE SKIP LOCKED`
//! subquery, so any number of workers can poll the same queue without
//! ever double-claiming a unit.

use chrono::{Duration, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use overseer_core::types::{DbId, Timestamp};

use crate::models::status::WorkUnitStatus;
use crate::models::work_unit::{CreateWorkUnit, WorkUnit};

const COLUMNS: &str = "\
    id, uuid, branch_id, queue_class, priority, status_id, scheduled_for, \
    lock_owner, lock_expires_at, attempt_count, max_attempts, \
    action_from, action_to, created_at, updated_at";

/// Provides queue operations for work units.
pub struct WorkUnitRepo;

impl WorkUnitRepo {
    /// Enqueue a unit. Safe inside the coordinator's transaction.
    pub async fn enqueue(
        conn: &mut PgConnection,
        params: CreateWorkUnit,
    ) -> Result<WorkUnit, sqlx::Error> {
        let query = format!(
            "INSERT INTO work_units \
             (uuid, branch_id, queue_class, priority, status_id, scheduled_for, \
              max_attempts, action_from, action_to) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkUnit>(&query)
            .bind(Uuid::now_v7())
            .bind(params.branch_id)
            .bind(params.queue_class)
            .bind(params.priority)
            .bind(WorkUnitStatus::Queued.id())
            .bind(params.scheduled_for)
            .bind(params.max_attempts)
            .bind(params.action_from)
            .bind(params.action_to)
            .fetch_one(conn)
            .await
    }

    /// Atomically lease the next due unit for `owner`.
    ///
    /// Eligible units are queued with `scheduled_for` in the past;
    /// highest priority first, oldest `scheduled_for` breaking ties.
    /// The claim stamps the lease and counts the attempt in the same
    /// statement, so a worker that dies immediately after claiming has
    /// already consumed one attempt.
    pub async fn lease_next(
        pool: &PgPool,
        owner: &str,
        lease: Duration,
    ) -> Result<Option<WorkUnit>, sqlx::Error> {
        let expires_at = Utc::now() + lease;
        let query = format!(
            "UPDATE work_units \
             SET status_id = $2, \
                 lock_owner = $1, \
                 lock_expires_at = $3, \
                 attempt_count = attempt_count + 1, \
                 updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM work_units \
                 WHERE status_id = $4 AND scheduled_for <= NOW() \
                 ORDER BY priority DESC, scheduled_for ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkUnit>(&query)
            .bind(owner)
            .bind(WorkUnitStatus::Leased.id())
            .bind(expires_at)
            .bind(WorkUnitStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Extend the lease of a unit still held by `owner` (long windows).
    pub async fn extend_lease(
        pool: &PgPool,
        id: DbId,
        owner: &str,
        lease: Duration,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE work_units SET lock_expires_at = $3, updated_at = NOW() \
             WHERE id = $1 AND lock_owner = $2 AND status_id = $4",
        )
        .bind(id)
        .bind(owner)
        .bind(Utc::now() + lease)
        .bind(WorkUnitStatus::Leased.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a leased unit terminal. Guarded on `lock_owner`: a worker
    /// whose lease already expired and was requeued cannot clobber the
    /// next attempt. Returns whether the transition happened.
    pub async fn settle(
        pool: &PgPool,
        id: DbId,
        owner: &str,
        status: WorkUnitStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE work_units \
             SET status_id = $3, lock_owner = NULL, lock_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND lock_owner = $2 AND status_id = $4",
        )
        .bind(id)
        .bind(owner)
        .bind(status.id())
        .bind(WorkUnitStatus::Leased.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Leased units whose lock has expired (crash recovery sweep).
    pub async fn list_expired(pool: &PgPool) -> Result<Vec<WorkUnit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM work_units \
             WHERE status_id = $1 AND lock_expires_at < NOW() \
             ORDER BY lock_expires_at ASC"
        );
        sqlx::query_as::<_, WorkUnit>(&query)
            .bind(WorkUnitStatus::Leased.id())
            .fetch_all(pool)
            .await
    }

    /// Return an expired unit to the queue with a backoff delay.
    /// Guarded on the lease still being the one the sweep observed.
    pub async fn requeue(
        pool: &PgPool,
        id: DbId,
        owner: &str,
        scheduled_for: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE work_units \
             SET status_id = $3, scheduled_for = $4, \
                 lock_owner = NULL, lock_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND lock_owner = $2 AND status_id = $5",
        )
        .bind(id)
        .bind(owner)
        .bind(WorkUnitStatus::Queued.id())
        .bind(scheduled_for)
        .bind(WorkUnitStatus::Leased.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an expired unit failed after its attempts ran out.
    pub async fn mark_exhausted(
        pool: &PgPool,
        id: DbId,
        owner: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE work_units \
             SET status_id = $3, lock_owner = NULL, lock_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND lock_owner = $2 AND status_id = $4",
        )
        .bind(id)
        .bind(owner)
        .bind(WorkUnitStatus::Failed.id())
        .bind(WorkUnitStatus::Leased.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel every queued unit belonging to an execution's branches.
    pub async fn cancel_queued_for_execution(
        pool: &PgPool,
        execution_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE work_units \
             SET status_id = $2, updated_at = NOW() \
             WHERE status_id = $3 AND branch_id IN \
               (SELECT id FROM branches WHERE execution_id = $1)",
        )
        .bind(execution_id)
        .bind(WorkUnitStatus::Cancelled.id())
        .bind(WorkUnitStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// All units of a branch, in window order.
    pub async fn list_by_branch(
        pool: &PgPool,
        branch_id: DbId,
    ) -> Result<Vec<WorkUnit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM work_units \
             WHERE branch_id = $1 ORDER BY action_from ASC"
        );
        sqlx::query_as::<_, WorkUnit>(&query)
            .bind(branch_id)
            .fetch_all(pool)
            .await
    }


    /// Whether any branch of an execution holds an unexpired lease right
    /// now (used before forcing a timeout to log what was in flight).
    pub async fn count_leased_for_execution(
        pool: &PgPool,
        execution_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM work_units \
             WHERE status_id = $2 AND branch_id IN \
               (SELECT id FROM branches WHERE execution_id = $1)",
        )
        .bind(execution_id)
        .bind(WorkUnitStatus::Leased.id())
        .fetch_one(pool)
        .await
    }
}
