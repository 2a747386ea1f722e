//! Execution models: one invocation of a job.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use overseer_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `executions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Execution {
    pub id: DbId,
    /// Canonical external key.
    pub uuid: Uuid,
    /// Hierarchical serial, e.g. `J20250001.0001`.
    pub serial: String,
    pub job_id: DbId,
    pub status_id: StatusId,
    /// Priority snapshot taken from the job at trigger time.
    pub priority: i32,
    /// What triggered the run (`manual`, `schedule`, `api`).
    pub triggered_by: String,
    pub scheduled_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Query parameters for listing executions of a job.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionListQuery {
    /// Filter by status ID.
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
