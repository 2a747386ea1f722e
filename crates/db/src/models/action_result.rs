//! Per-action execution records.

use serde::Serialize;
use sqlx::FromRow;

use overseer_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `action_results` table: one action run on one branch.
///
/// Output below the inline threshold is stored in `stdout`/`stderr`;
/// larger output lives in the artifact store and is referenced by
/// `stdout_ref`/`stderr_ref`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActionResult {
    pub id: DbId,
    /// Hierarchical serial, e.g. `J20250001.0001.0002.0001`.
    pub serial: String,
    pub branch_id: DbId,
    pub job_action_id: DbId,
    /// 1-based order index; strictly increasing per branch.
    pub position: i32,
    pub status_id: StatusId,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stdout_ref: Option<String>,
    pub stderr: Option<String>,
    pub stderr_ref: Option<String>,
    pub duration_ms: Option<i64>,
    pub retry_count: i32,
    /// Structured failure kind (`overseer_core::error::FailureKind`).
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting an action result after the action resolves.
#[derive(Debug, Clone)]
pub struct CreateActionResult {
    pub serial: String,
    pub branch_id: DbId,
    pub job_action_id: DbId,
    pub position: i32,
    pub status_id: StatusId,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stdout_ref: Option<String>,
    pub stderr: Option<String>,
    pub stderr_ref: Option<String>,
    pub duration_ms: Option<i64>,
    pub retry_count: i32,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}
