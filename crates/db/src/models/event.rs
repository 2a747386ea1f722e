//! Persisted platform events.

use serde::Serialize;
use sqlx::FromRow;

use overseer_core::types::{DbId, Timestamp};

/// A row from the `events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub id: DbId,
    /// Dot-separated event name, e.g. `"execution.started"`.
    pub event_type: String,
    /// Optional source entity kind (e.g. `"execution"`, `"work_unit"`).
    pub source_entity_type: Option<String>,
    /// Optional source entity database id.
    pub source_entity_id: Option<DbId>,
    /// Hierarchical serial for correlation, when the source has one.
    pub source_serial: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
