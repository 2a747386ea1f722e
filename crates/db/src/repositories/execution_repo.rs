//! Repository for the `executions` table.
//!
//! Status transitions are single-row guarded UPDATEs: every terminal
//! transition carries a `status_id IN (queued, running)` predicate so it
//! is idempotent and can never resurrect a terminal execution.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use overseer_core::types::{DbId, Timestamp};

use crate::models::execution::{Execution, ExecutionListQuery};
use crate::models::status::{ExecutionStatus, StatusId};

/// Column list for `executions` queries.
const COLUMNS: &str = "\
    id, uuid, serial, job_id, status_id, priority, triggered_by, \
    scheduled_at, started_at, completed_at, created_at, updated_at";

/// Maximum page size for execution listing.
const MAX_LIMIT: i64 = 200;

/// Default page size for execution listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD operations for executions.
pub struct ExecutionRepo;

impl ExecutionRepo {
    /// Insert a queued execution. Takes a connection so creation joins the
    /// coordinator's all-or-nothing transaction.
    pub async fn create(
        conn: &mut PgConnection,
        job_id: DbId,
        serial: &str,
        priority: i32,
        triggered_by: &str,
    ) -> Result<Execution, sqlx::Error> {
        let query = format!(
            "INSERT INTO executions (uuid, serial, job_id, status_id, priority, triggered_by, scheduled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Execution>(&query)
            .bind(Uuid::now_v7())
            .bind(serial)
            .bind(job_id)
            .bind(ExecutionStatus::Queued.id())
            .bind(priority)
            .bind(triggered_by)
            .fetch_one(conn)
            .await
    }

    /// Find an execution by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Execution>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM executions WHERE id = $1");
        sqlx::query_as::<_, Execution>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an execution by its canonical UUID.
    pub async fn find_by_uuid(
        pool: &PgPool,
        uuid: Uuid,
    ) -> Result<Option<Execution>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM executions WHERE uuid = $1");
        sqlx::query_as::<_, Execution>(&query)
            .bind(uuid)
            .fetch_optional(pool)
            .await
    }

    /// Find an execution by its human-facing serial.
    pub async fn find_by_serial(
        pool: &PgPool,
        serial: &str,
    ) -> Result<Option<Execution>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM executions WHERE serial = $1");
        sqlx::query_as::<_, Execution>(&query)
            .bind(serial)
            .fetch_optional(pool)
            .await
    }

    /// List executions for a job, newest first, with optional status
    /// filter and pagination.
    pub async fn list_by_job(
        pool: &PgPool,
        job_id: DbId,
        params: &ExecutionListQuery,
    ) -> Result<Vec<Execution>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let (filter, query) = if params.status_id.is_some() {
            (
                true,
                format!(
                    "SELECT {COLUMNS} FROM executions \
                     WHERE job_id = $1 AND status_id = $2 \
                     ORDER BY scheduled_at DESC LIMIT $3 OFFSET $4"
                ),
            )
        } else {
            (
                false,
                format!(
                    "SELECT {COLUMNS} FROM executions \
                     WHERE job_id = $1 \
                     ORDER BY scheduled_at DESC LIMIT $2 OFFSET $3"
                ),
            )
        };

        let mut q = sqlx::query_as::<_, Execution>(&query).bind(job_id);
        if filter {
            q = q.bind(params.status_id.unwrap_or_default());
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// List all non-terminal executions (for the dispatcher's progression
    /// loop).
    pub async fn list_open(pool: &PgPool) -> Result<Vec<Execution>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM executions \
             WHERE status_id IN ($1, $2) \
             ORDER BY priority DESC, scheduled_at ASC"
        );
        sqlx::query_as::<_, Execution>(&query)
            .bind(ExecutionStatus::Queued.id())
            .bind(ExecutionStatus::Running.id())
            .fetch_all(pool)
            .await
    }

    /// List non-terminal executions scheduled before `cutoff` (candidates
    /// for the supervisor's wall-clock ceiling).
    pub async fn list_overdue(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<Execution>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM executions \
             WHERE status_id IN ($1, $2) AND scheduled_at < $3 \
             ORDER BY scheduled_at ASC"
        );
        sqlx::query_as::<_, Execution>(&query)
            .bind(ExecutionStatus::Queued.id())
            .bind(ExecutionStatus::Running.id())
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Set `started_at` and flip to running the first time a branch is
    /// leased. Idempotent: later calls are no-ops.
    pub async fn mark_started(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE executions \
             SET status_id = $2, started_at = COALESCE(started_at, NOW()), updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(ExecutionStatus::Running.id())
        .bind(ExecutionStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Finalize an execution with a terminal status.
    ///
    /// Guarded on non-terminal current status, so the transition happens
    /// exactly once; returns `true` if this call performed it.
    pub async fn finalize(
        pool: &PgPool,
        id: DbId,
        status: StatusId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE executions \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4)",
        )
        .bind(id)
        .bind(status)
        .bind(ExecutionStatus::Queued.id())
        .bind(ExecutionStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel an execution if it is not already terminal.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::finalize(pool, id, ExecutionStatus::Cancelled.id()).await
    }
}
