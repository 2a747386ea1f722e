//! Execution/branch status state machine.
//!
//! Status IDs are intentionally duplicated from the `db` crate's status
//! enums (seed order, 1-based) because `core` must have zero internal
//! dependencies. Executions and branches share the same status set.

/// Waiting to be dispatched.
pub const STATUS_QUEUED: i16 = 1;
/// At least one work unit has been leased.
pub const STATUS_RUNNING: i16 = 2;
/// All work finished with success.
pub const STATUS_COMPLETED: i16 = 3;
/// At least one fatal failure.
pub const STATUS_FAILED: i16 = 4;
/// Operator-requested cancellation (cooperative, best-effort).
pub const STATUS_CANCELLED: i16 = 5;
/// Forced terminal by the wall-clock ceiling.
pub const STATUS_TIMED_OUT: i16 = 6;

/// Whether a status is terminal. Terminal transitions are one-way.
pub fn is_terminal(status: i16) -> bool {
    matches!(
        status,
        STATUS_COMPLETED | STATUS_FAILED | STATUS_CANCELLED | STATUS_TIMED_OUT
    )
}

/// Returns the set of valid target status IDs reachable from `from`.
///
/// Terminal states return an empty slice: once an execution or branch is
/// completed/failed/cancelled/timed-out it never changes again. This is
/// what makes the `RetriesExhausted` and cancellation transitions
/// idempotent.
pub fn valid_transitions(from: i16) -> &'static [i16] {
    match from {
        STATUS_QUEUED => &[
            STATUS_RUNNING,
            STATUS_FAILED,
            STATUS_CANCELLED,
            STATUS_TIMED_OUT,
        ],
        STATUS_RUNNING => &[
            STATUS_COMPLETED,
            STATUS_FAILED,
            STATUS_CANCELLED,
            STATUS_TIMED_OUT,
        ],
        // Terminal states: no further transitions.
        STATUS_COMPLETED | STATUS_FAILED | STATUS_CANCELLED | STATUS_TIMED_OUT => &[],
        // Unknown status: no transitions allowed.
        _ => &[],
    }
}

/// Check whether a transition from `from` to `to` is valid.
pub fn can_transition(from: i16, to: i16) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a state transition, returning an error message for invalid ones.
pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
    if can_transition(from, to) {
        Ok(())
    } else {
        let from_name = status_name(from);
        let to_name = status_name(to);
        Err(format!(
            "Invalid transition: {from_name} ({from}) -> {to_name} ({to})"
        ))
    }
}

/// Human-readable name for a status ID (for error messages).
pub fn status_name(id: i16) -> &'static str {
    match id {
        STATUS_QUEUED => "Queued",
        STATUS_RUNNING => "Running",
        STATUS_COMPLETED => "Completed",
        STATUS_FAILED => "Failed",
        STATUS_CANCELLED => "Cancelled",
        STATUS_TIMED_OUT => "TimedOut",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_can_start_or_terminate() {
        assert!(can_transition(STATUS_QUEUED, STATUS_RUNNING));
        assert!(can_transition(STATUS_QUEUED, STATUS_CANCELLED));
        assert!(can_transition(STATUS_QUEUED, STATUS_FAILED));
        assert!(!can_transition(STATUS_QUEUED, STATUS_COMPLETED));
    }

    #[test]
    fn running_can_reach_any_terminal() {
        assert!(can_transition(STATUS_RUNNING, STATUS_COMPLETED));
        assert!(can_transition(STATUS_RUNNING, STATUS_FAILED));
        assert!(can_transition(STATUS_RUNNING, STATUS_CANCELLED));
        assert!(can_transition(STATUS_RUNNING, STATUS_TIMED_OUT));
    }

    #[test]
    fn terminal_states_are_sticky() {
        for terminal in [
            STATUS_COMPLETED,
            STATUS_FAILED,
            STATUS_CANCELLED,
            STATUS_TIMED_OUT,
        ] {
            assert!(valid_transitions(terminal).is_empty());
            assert!(is_terminal(terminal));
        }
        assert!(!is_terminal(STATUS_QUEUED));
        assert!(!is_terminal(STATUS_RUNNING));
    }

    #[test]
    fn validate_reports_names() {
        let err = validate_transition(STATUS_COMPLETED, STATUS_RUNNING).unwrap_err();
        assert!(err.contains("Completed"));
        assert!(err.contains("Running"));
    }

    #[test]
    fn unknown_status_has_no_transitions() {
        assert!(valid_transitions(99).is_empty());
        assert_eq!(status_name(99), "Unknown");
    }
}
