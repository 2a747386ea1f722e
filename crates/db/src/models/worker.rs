//! Worker node registry models.
//!
//! Workers register by name so `work_units.lock_owner` always refers to a
//! known node and stale workers are observable through heartbeats.

use serde::Serialize;
use sqlx::FromRow;

use overseer_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `workers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkerNode {
    pub id: DbId,
    /// Unique node name, used as the lease `lock_owner`.
    pub name: String,
    pub hostname: Option<String>,
    pub status_id: StatusId,
    pub last_heartbeat_at: Option<Timestamp>,
    pub registered_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
