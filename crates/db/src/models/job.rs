//! Job definition models and DTOs.
//!
//! A job is the reusable recipe: ordered actions plus a default target
//! set. It is frozen once the first execution references it — edits only
//! apply to jobs that have never run.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use overseer_core::types::{DbId, Timestamp};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub uuid: Uuid,
    /// Human-facing serial, e.g. `J20250001`.
    pub serial: String,
    pub name: String,
    pub description: Option<String>,
    /// Dispatch priority; higher runs first (see `overseer_core::queue`).
    pub priority: i32,
    /// Canary-style rollout: branch N+1 waits for branch N to finish.
    pub serialize_targets: bool,
    /// Explicit opt-in: a job with zero target associations runs against
    /// all active targets. Never a silent default.
    pub allow_all_targets_fallback: bool,
    /// Default per-action timeout, overridable per action.
    pub default_action_timeout_secs: i32,
    /// Default delivery attempts per work unit.
    pub max_attempts: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `job_actions` table: one ordered step of a job.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobAction {
    pub id: DbId,
    pub job_id: DbId,
    /// 1-based order index; strictly increasing per job.
    pub position: i32,
    /// Snake_case action kind (see `overseer_core::action::ActionKind`).
    pub kind: String,
    /// Kind-specific payload (command text, script body, transfer paths).
    pub payload: serde_json::Value,
    /// Per-action timeout override.
    pub timeout_secs: Option<i32>,
    /// Keep running later actions after this one fails.
    pub continue_on_failure: bool,
    /// A failure here never fails the branch.
    pub informational_only: bool,
    /// Safe to run concurrently with adjacent parallel-safe actions.
    pub parallel_safe: bool,
    pub created_at: Timestamp,
}

/// DTO for creating a job with its actions and target associations.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJob {
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub serialize_targets: Option<bool>,
    pub allow_all_targets_fallback: Option<bool>,
    pub default_action_timeout_secs: Option<i32>,
    pub max_attempts: Option<i32>,
    pub actions: Vec<CreateJobAction>,
    pub target_ids: Vec<DbId>,
}

/// DTO for one action within [`CreateJob`].
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobAction {
    pub kind: String,
    pub payload: serde_json::Value,
    pub timeout_secs: Option<i32>,
    #[serde(default)]
    pub continue_on_failure: bool,
    #[serde(default)]
    pub informational_only: bool,
    #[serde(default)]
    pub parallel_safe: bool,
}
