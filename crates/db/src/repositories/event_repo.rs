//! Repository for the `events` table.

use sqlx::PgPool;

use overseer_core::types::DbId;

use crate::models::event::Event;

const COLUMNS: &str = "\
    id, event_type, source_entity_type, source_entity_id, source_serial, \
    payload, created_at";

/// Persists bus events for audit and replay.
pub struct EventRepo;

impl EventRepo {
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        source_entity_type: Option<&str>,
        source_entity_id: Option<DbId>,
        source_serial: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<Event, sqlx::Error> {
        let query = format!(
            "INSERT INTO events \
             (event_type, source_entity_type, source_entity_id, source_serial, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(event_type)
            .bind(source_entity_type)
            .bind(source_entity_id)
            .bind(source_serial)
            .bind(payload)
            .fetch_one(pool)
            .await
    }

    /// Most recent events, newest first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events ORDER BY id DESC LIMIT $1"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Events correlated to a serial prefix (a job serial matches its
    /// whole subtree).
    pub async fn list_by_serial_prefix(
        pool: &PgPool,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE source_serial = $1 OR source_serial LIKE $1 || '.%' \
             ORDER BY id DESC LIMIT $2"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(prefix)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
