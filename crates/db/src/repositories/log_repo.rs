//! Repository for the `log_entries` table.

use sqlx::{PgConnection, PgPool};

use overseer_core::types::DbId;

use crate::models::log_entry::{CreateLogEntry, LogEntry};

const COLUMNS: &str = "\
    id, execution_id, branch_id, phase, level, category, message, detail, created_at";

/// Append-only store of taxonomy-tagged lifecycle logs.
pub struct LogRepo;

impl LogRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        params: CreateLogEntry,
    ) -> Result<LogEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO log_entries \
             (execution_id, branch_id, phase, level, category, message, detail) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LogEntry>(&query)
            .bind(params.execution_id)
            .bind(params.branch_id)
            .bind(params.phase)
            .bind(params.level)
            .bind(params.category)
            .bind(params.message)
            .bind(params.detail)
            .fetch_one(conn)
            .await
    }

    /// All entries for an execution in insertion order, including
    /// branch-scoped rows.
    pub async fn list_by_execution(
        pool: &PgPool,
        execution_id: DbId,
    ) -> Result<Vec<LogEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM log_entries \
             WHERE execution_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, LogEntry>(&query)
            .bind(execution_id)
            .fetch_all(pool)
            .await
    }

    /// Entries scoped to one branch, in insertion order.
    pub async fn list_by_branch(
        pool: &PgPool,
        branch_id: DbId,
    ) -> Result<Vec<LogEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM log_entries \
             WHERE branch_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, LogEntry>(&query)
            .bind(branch_id)
            .fetch_all(pool)
            .await
    }
}
