//! Repository for the `jobs`, `job_actions`, and `job_targets` tables.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use overseer_core::types::DbId;

use crate::models::job::{CreateJob, CreateJobAction, Job, JobAction};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, uuid, serial, name, description, priority, \
    serialize_targets, allow_all_targets_fallback, \
    default_action_timeout_secs, max_attempts, \
    created_at, updated_at";

/// Column list for `job_actions` queries.
const ACTION_COLUMNS: &str = "\
    id, job_id, position, kind, payload, timeout_secs, \
    continue_on_failure, informational_only, parallel_safe, created_at";

/// Default per-action timeout when the job does not specify one.
const DEFAULT_ACTION_TIMEOUT_SECS: i32 = 600;

/// Default work unit delivery attempts.
const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Provides CRUD operations for job definitions.
pub struct JobRepo;

impl JobRepo {
    /// Insert a job row together with its actions and target
    /// associations. Takes a connection so the caller controls the
    /// transaction boundary (the serial is allocated in the same
    /// transaction).
    pub async fn create(
        conn: &mut PgConnection,
        serial: &str,
        input: &CreateJob,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (uuid, serial, name, description, priority, serialize_targets, \
                  allow_all_targets_fallback, default_action_timeout_secs, max_attempts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(Uuid::now_v7())
            .bind(serial)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.priority.unwrap_or(0))
            .bind(input.serialize_targets.unwrap_or(false))
            .bind(input.allow_all_targets_fallback.unwrap_or(false))
            .bind(
                input
                    .default_action_timeout_secs
                    .unwrap_or(DEFAULT_ACTION_TIMEOUT_SECS),
            )
            .bind(input.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS))
            .fetch_one(&mut *conn)
            .await?;

        for (idx, action) in input.actions.iter().enumerate() {
            Self::insert_action(conn, job.id, (idx + 1) as i32, action).await?;
        }

        for target_id in &input.target_ids {
            sqlx::query("INSERT INTO job_targets (job_id, target_id) VALUES ($1, $2)")
                .bind(job.id)
                .bind(target_id)
                .execute(&mut *conn)
                .await?;
        }

        Ok(job)
    }

    async fn insert_action(
        conn: &mut PgConnection,
        job_id: DbId,
        position: i32,
        action: &CreateJobAction,
    ) -> Result<JobAction, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_actions \
                 (job_id, position, kind, payload, timeout_secs, \
                  continue_on_failure, informational_only, parallel_safe) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ACTION_COLUMNS}"
        );
        sqlx::query_as::<_, JobAction>(&query)
            .bind(job_id)
            .bind(position)
            .bind(&action.kind)
            .bind(&action.payload)
            .bind(action.timeout_secs)
            .bind(action.continue_on_failure)
            .bind(action.informational_only)
            .bind(action.parallel_safe)
            .fetch_one(conn)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by its UUID.
    pub async fn find_by_uuid(pool: &PgPool, uuid: Uuid) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE uuid = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(uuid)
            .fetch_optional(pool)
            .await
    }

    /// List a job's actions in execution order.
    pub async fn list_actions(pool: &PgPool, job_id: DbId) -> Result<Vec<JobAction>, sqlx::Error> {
        let query = format!(
            "SELECT {ACTION_COLUMNS} FROM job_actions WHERE job_id = $1 ORDER BY position ASC"
        );
        sqlx::query_as::<_, JobAction>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    /// List the target IDs associated with a job.
    pub async fn list_target_ids(pool: &PgPool, job_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT target_id FROM job_targets WHERE job_id = $1 ORDER BY target_id ASC",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
    }

    /// Whether any execution references this job.
    ///
    /// Once true, the definition is frozen: edits apply only to jobs that
    /// have never run.
    pub async fn has_executions(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM executions WHERE job_id = $1)",
        )
        .bind(job_id)
        .fetch_one(pool)
        .await
    }
}
