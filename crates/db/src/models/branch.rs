//! Branch models: the per-target slice of an execution.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use overseer_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `branches` table.
///
/// Exactly one branch exists per (execution, target) pair. The target
/// serial is denormalised so audit history stays readable even if the
/// target row is later soft-deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Branch {
    pub id: DbId,
    pub uuid: Uuid,
    /// Hierarchical serial, e.g. `J20250001.0001.0002`.
    pub serial: String,
    pub execution_id: DbId,
    pub target_id: Option<DbId>,
    /// Denormalised target serial for audit stability.
    pub target_serial: String,
    pub status_id: StatusId,
    /// Aggregate exit code: 0 on full success, else the first fatal
    /// non-zero code.
    pub exit_code: Option<i32>,
    /// One-line human summary of the branch outcome.
    pub result_summary: Option<String>,
    pub retry_count: i32,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
