//! Repository for the `action_results` table.

use sqlx::{PgConnection, PgPool};

use overseer_core::types::DbId;

use crate::models::action_result::{ActionResult, CreateActionResult};
use crate::models::status::ActionStatus;

const COLUMNS: &str = "\
    id, serial, branch_id, job_action_id, position, status_id, exit_code, \
    stdout, stdout_ref, stderr, stderr_ref, duration_ms, retry_count, \
    error_kind, error_message, created_at";

/// Provides insert and read operations for per-action results.
pub struct ActionResultRepo;

impl ActionResultRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        params: CreateActionResult,
    ) -> Result<ActionResult, sqlx::Error> {
        let query = format!(
            "INSERT INTO action_results \
             (serial, branch_id, job_action_id, position, status_id, exit_code, \
              stdout, stdout_ref, stderr, stderr_ref, duration_ms, retry_count, \
              error_kind, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActionResult>(&query)
            .bind(params.serial)
            .bind(params.branch_id)
            .bind(params.job_action_id)
            .bind(params.position)
            .bind(params.status_id)
            .bind(params.exit_code)
            .bind(params.stdout)
            .bind(params.stdout_ref)
            .bind(params.stderr)
            .bind(params.stderr_ref)
            .bind(params.duration_ms)
            .bind(params.retry_count)
            .bind(params.error_kind)
            .bind(params.error_message)
            .fetch_one(conn)
            .await
    }

    /// All results for a branch in action order. Retried windows produce
    /// one row per attempt at the same position; `created_at` breaks the
    /// tie so the latest attempt sorts last.
    pub async fn list_by_branch(
        pool: &PgPool,
        branch_id: DbId,
    ) -> Result<Vec<ActionResult>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM action_results \
             WHERE branch_id = $1 ORDER BY position ASC, created_at ASC"
        );
        sqlx::query_as::<_, ActionResult>(&query)
            .bind(branch_id)
            .fetch_all(pool)
            .await
    }

    /// Count the failed, non-informational results of a branch.
    ///
    /// Retried windows leave one row per attempt at the same position;
    /// only the latest attempt per position counts, so a failure that a
    /// later attempt recovered from does not fail the branch.
    pub async fn count_hard_failures(
        pool: &PgPool,
        branch_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM ( \
                 SELECT DISTINCT ON (ar.position) ar.status_id, ja.informational_only \
                 FROM action_results ar \
                 JOIN job_actions ja ON ja.id = ar.job_action_id \
                 WHERE ar.branch_id = $1 \
                 ORDER BY ar.position, ar.created_at DESC, ar.id DESC \
             ) latest \
             WHERE latest.status_id = $2 AND NOT latest.informational_only",
        )
        .bind(branch_id)
        .bind(ActionStatus::Failed.id())
        .fetch_one(pool)
        .await
    }
}
