//! Repository for the `targets` table.

use sqlx::PgPool;
use uuid::Uuid;

use overseer_core::types::DbId;

use crate::models::target::{CreateTarget, Target};

/// Column list for `targets` queries.
const COLUMNS: &str = "\
    id, uuid, serial, name, hostname, connection_method, \
    credentials_ref, deleted_at, created_at, updated_at";

/// Provides CRUD operations for targets.
pub struct TargetRepo;

impl TargetRepo {
    /// Register a new target. The serial is allocated from the `targets`
    /// serial scope by the caller.
    pub async fn create(
        pool: &PgPool,
        serial: &str,
        input: &CreateTarget,
    ) -> Result<Target, sqlx::Error> {
        let query = format!(
            "INSERT INTO targets (uuid, serial, name, hostname, connection_method, credentials_ref) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Target>(&query)
            .bind(Uuid::now_v7())
            .bind(serial)
            .bind(&input.name)
            .bind(&input.hostname)
            .bind(&input.connection_method)
            .bind(&input.credentials_ref)
            .fetch_one(pool)
            .await
    }

    /// Find a target by its ID, including soft-deleted rows (audit reads
    /// must keep working after deletion).
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Target>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM targets WHERE id = $1");
        sqlx::query_as::<_, Target>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the given targets, keeping only rows that exist and are not
    /// soft-deleted. The caller compares lengths to detect stale IDs.
    pub async fn find_active_by_ids(
        pool: &PgPool,
        ids: &[DbId],
    ) -> Result<Vec<Target>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM targets \
             WHERE id = ANY($1) AND deleted_at IS NULL \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Target>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// List all active targets (the opt-in all-targets fallback path).
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Target>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM targets WHERE deleted_at IS NULL ORDER BY id ASC"
        );
        sqlx::query_as::<_, Target>(&query).fetch_all(pool).await
    }

    /// Soft-delete a target. Returns `false` if already deleted or absent.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
