//! Work unit models: the queueable, lockable dispatch of a branch.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use overseer_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `work_units` table.
///
/// Normally one unit covers a branch's whole action sequence; runs of
/// parallel-safe actions are split into single-action sub-units. The
/// lease fields (`lock_owner`, `lock_expires_at`) carry the
/// at-most-one-worker guarantee: a unit with an unexpired lock is
/// invisible to every other worker, and lock expiry is the sole
/// crash-recovery mechanism.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkUnit {
    pub id: DbId,
    pub uuid: Uuid,
    pub branch_id: DbId,
    /// `execution` or `system` (see `overseer_core::queue::QueueClass`).
    pub queue_class: String,
    /// Effective priority after queue-class capping.
    pub priority: i32,
    pub status_id: StatusId,
    /// Earliest lease eligibility; retry backoff pushes this forward.
    pub scheduled_for: Timestamp,
    /// Worker name of the current lease holder.
    pub lock_owner: Option<String>,
    pub lock_expires_at: Option<Timestamp>,
    /// Number of times the unit has been handed to a worker.
    pub attempt_count: i32,
    pub max_attempts: i32,
    /// First action position covered by this unit (inclusive).
    pub action_from: i32,
    /// Last action position covered by this unit (inclusive).
    pub action_to: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for enqueueing a work unit.
#[derive(Debug, Clone)]
pub struct CreateWorkUnit {
    pub branch_id: DbId,
    pub queue_class: String,
    pub priority: i32,
    pub scheduled_for: Timestamp,
    pub max_attempts: i32,
    pub action_from: i32,
    pub action_to: i32,
}
