//! Repository for the `workers` registry.

use sqlx::PgPool;

use overseer_core::types::DbId;

use crate::models::status::WorkerStatus;
use crate::models::worker::WorkerNode;

const COLUMNS: &str = "\
    id, name, hostname, status_id, last_heartbeat_at, registered_at, \
    created_at, updated_at";

/// Provides registration and liveness operations for worker nodes.
pub struct WorkerRepo;

impl WorkerRepo {
    /// Register a worker by name, or revive an existing row. A node that
    /// restarts under the same name reclaims its registration.
    pub async fn register(
        pool: &PgPool,
        name: &str,
        hostname: Option<&str>,
    ) -> Result<WorkerNode, sqlx::Error> {
        let query = format!(
            "INSERT INTO workers (name, hostname, status_id, last_heartbeat_at, registered_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) \
             ON CONFLICT (name) DO UPDATE \
             SET hostname = EXCLUDED.hostname, \
                 status_id = EXCLUDED.status_id, \
                 last_heartbeat_at = NOW(), \
                 registered_at = NOW(), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkerNode>(&query)
            .bind(name)
            .bind(hostname)
            .bind(WorkerStatus::Idle.id())
            .fetch_one(pool)
            .await
    }

    /// Record a heartbeat and the node's current busy/idle state.
    pub async fn heartbeat(
        pool: &PgPool,
        id: DbId,
        status: WorkerStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE workers SET status_id = $2, last_heartbeat_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Flip workers whose heartbeat is older than `stale_secs` to
    /// offline. Returns the number of workers transitioned.
    pub async fn mark_stale_offline(
        pool: &PgPool,
        stale_secs: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workers SET status_id = $1, updated_at = NOW() \
             WHERE status_id IN ($2, $3) \
               AND last_heartbeat_at < NOW() - make_interval(secs => $4)",
        )
        .bind(WorkerStatus::Offline.id())
        .bind(WorkerStatus::Idle.id())
        .bind(WorkerStatus::Busy.id())
        .bind(stale_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_name(
        pool: &PgPool,
        name: &str,
    ) -> Result<Option<WorkerNode>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers WHERE name = $1");
        sqlx::query_as::<_, WorkerNode>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<WorkerNode>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workers ORDER BY name ASC");
        sqlx::query_as::<_, WorkerNode>(&query).fetch_all(pool).await
    }
}
