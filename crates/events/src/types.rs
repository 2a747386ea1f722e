//! Canonical event type names.
//!
//! Dot-separated `entity.verb` names. Keep this list in sync with
//! whatever consumers filter on; there is no lookup table to enforce it.

pub const EXECUTION_STARTED: &str = "execution.started";
pub const EXECUTION_COMPLETED: &str = "execution.completed";
pub const EXECUTION_FAILED: &str = "execution.failed";
pub const EXECUTION_CANCELLED: &str = "execution.cancelled";
pub const EXECUTION_TIMED_OUT: &str = "execution.timed_out";

pub const BRANCH_STARTED: &str = "branch.started";
pub const BRANCH_COMPLETED: &str = "branch.completed";
pub const BRANCH_FAILED: &str = "branch.failed";

pub const WORK_UNIT_REQUEUED: &str = "work_unit.requeued";
pub const WORK_UNIT_RETRIES_EXHAUSTED: &str = "work_unit.retries_exhausted";

/// Event type for an execution's terminal status ID, or `None` while the
/// execution is still open.
pub fn execution_terminal_event(status_id: i16) -> Option<&'static str> {
    match status_id {
        overseer_core::state_machine::STATUS_COMPLETED => Some(EXECUTION_COMPLETED),
        overseer_core::state_machine::STATUS_FAILED => Some(EXECUTION_FAILED),
        overseer_core::state_machine::STATUS_CANCELLED => Some(EXECUTION_CANCELLED),
        overseer_core::state_machine::STATUS_TIMED_OUT => Some(EXECUTION_TIMED_OUT),
        _ => None,
    }
}
