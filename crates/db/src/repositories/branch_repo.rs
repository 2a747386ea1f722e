//! Repository for the `branches` table.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use overseer_core::types::DbId;

use crate::models::branch::Branch;
use crate::models::status::{BranchStatus, StatusId};

/// Column list for `branches` queries.
const COLUMNS: &str = "\
    id, uuid, serial, execution_id, target_id, target_serial, status_id, \
    exit_code, result_summary, retry_count, started_at, completed_at, \
    created_at, updated_at";

/// Provides CRUD operations for branches.
pub struct BranchRepo;

impl BranchRepo {
    /// Insert a queued branch inside the coordinator's transaction.
    pub async fn create(
        conn: &mut PgConnection,
        execution_id: DbId,
        serial: &str,
        target_id: DbId,
        target_serial: &str,
    ) -> Result<Branch, sqlx::Error> {
        let query = format!(
            "INSERT INTO branches (uuid, serial, execution_id, target_id, target_serial, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Branch>(&query)
            .bind(Uuid::now_v7())
            .bind(serial)
            .bind(execution_id)
            .bind(target_id)
            .bind(target_serial)
            .bind(BranchStatus::Queued.id())
            .fetch_one(conn)
            .await
    }

    /// Find a branch by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Branch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM branches WHERE id = $1");
        sqlx::query_as::<_, Branch>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a branch by its canonical UUID.
    pub async fn find_by_uuid(pool: &PgPool, uuid: Uuid) -> Result<Option<Branch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM branches WHERE uuid = $1");
        sqlx::query_as::<_, Branch>(&query)
            .bind(uuid)
            .fetch_optional(pool)
            .await
    }

    /// Find a branch by its human-facing serial.
    pub async fn find_by_serial(
        pool: &PgPool,
        serial: &str,
    ) -> Result<Option<Branch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM branches WHERE serial = $1");
        sqlx::query_as::<_, Branch>(&query)
            .bind(serial)
            .fetch_optional(pool)
            .await
    }

    /// List an execution's branches in serial order.
    pub async fn list_by_execution(
        pool: &PgPool,
        execution_id: DbId,
    ) -> Result<Vec<Branch>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM branches WHERE execution_id = $1 ORDER BY serial ASC"
        );
        sqlx::query_as::<_, Branch>(&query)
            .bind(execution_id)
            .fetch_all(pool)
            .await
    }

    /// Status IDs of all branches of an execution (roll-up input).
    pub async fn list_status_ids(
        pool: &PgPool,
        execution_id: DbId,
    ) -> Result<Vec<StatusId>, sqlx::Error> {
        sqlx::query_scalar::<_, StatusId>(
            "SELECT status_id FROM branches WHERE execution_id = $1",
        )
        .bind(execution_id)
        .fetch_all(pool)
        .await
    }

    /// Flip a queued branch to running and stamp `started_at`. Idempotent.
    pub async fn mark_started(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE branches \
             SET status_id = $2, started_at = COALESCE(started_at, NOW()), updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(BranchStatus::Running.id())
        .bind(BranchStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Finalize a branch with a terminal status, aggregate exit code, and
    /// summary.
    ///
    /// Guarded on non-terminal current status: a cancelled or timed-out
    /// branch keeps its status even when a late in-flight result arrives,
    /// and the terminal transition happens exactly once. Returns whether
    /// this call performed the transition.
    pub async fn finalize(
        pool: &PgPool,
        id: DbId,
        status: StatusId,
        exit_code: Option<i32>,
        result_summary: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE branches \
             SET status_id = $2, exit_code = $3, result_summary = $4, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($5, $6)",
        )
        .bind(id)
        .bind(status)
        .bind(exit_code)
        .bind(result_summary)
        .bind(BranchStatus::Queued.id())
        .bind(BranchStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Increment a branch's retry counter (work unit requeue).
    pub async fn bump_retry_count(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE branches SET retry_count = retry_count + 1, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Cancel every still-queued branch of an execution. Returns the
    /// number of branches cancelled. Running branches are left to finish
    /// naturally (cooperative cancellation).
    pub async fn cancel_queued(pool: &PgPool, execution_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE branches \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE execution_id = $1 AND status_id = $3",
        )
        .bind(execution_id)
        .bind(BranchStatus::Cancelled.id())
        .bind(BranchStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Force a terminal status on all non-terminal branches of an
    /// execution (supervisor wall-clock ceiling). Returns the number of
    /// branches transitioned.
    pub async fn force_terminal(
        pool: &PgPool,
        execution_id: DbId,
        status: StatusId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE branches \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE execution_id = $1 AND status_id IN ($3, $4)",
        )
        .bind(execution_id)
        .bind(status)
        .bind(BranchStatus::Queued.id())
        .bind(BranchStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
