//! Status roll-up: branch status from its action results, execution
//! status from its branches.
//!
//! Roll-up flows one way, bottom-up, and never overrides an operator or
//! supervisor decision: cancelled and timed-out statuses are sticky.

use crate::state_machine::{
    is_terminal, STATUS_CANCELLED, STATUS_COMPLETED, STATUS_FAILED, STATUS_RUNNING,
    STATUS_TIMED_OUT,
};

/// The outcome of one action as seen by the roll-up.
#[derive(Debug, Clone, Copy)]
pub struct ActionOutcome {
    /// The action ran to completion with exit code 0.
    pub succeeded: bool,
    /// The job marked this action informational-only: its failure never
    /// fails the branch.
    pub informational_only: bool,
}

/// Roll up a branch's terminal status from its resolved action outcomes.
///
/// `completed` iff every action succeeded or is an informational-only
/// failure; otherwise `failed`. A failed `continue_on_failure` action
/// still fails the branch — it only permits later actions to run first.
pub fn branch_status(outcomes: &[ActionOutcome]) -> i16 {
    let any_fatal = outcomes
        .iter()
        .any(|o| !o.succeeded && !o.informational_only);
    if any_fatal {
        STATUS_FAILED
    } else {
        STATUS_COMPLETED
    }
}

/// Roll up an execution's status from its current status and the statuses
/// of all its branches.
///
/// - Cancelled / timed-out executions keep their status (sticky): late
///   branch results are recorded but never flip the execution back.
/// - While any branch is non-terminal the execution is `running`.
/// - Once all branches are terminal: `completed` iff every branch
///   completed, otherwise `failed`. Partial success stays visible at the
///   branch level.
pub fn execution_status(current: i16, branch_statuses: &[i16]) -> i16 {
    if current == STATUS_CANCELLED || current == STATUS_TIMED_OUT {
        return current;
    }

    if branch_statuses.iter().any(|s| !is_terminal(*s)) {
        return STATUS_RUNNING;
    }

    if branch_statuses.iter().all(|s| *s == STATUS_COMPLETED) {
        STATUS_COMPLETED
    } else {
        STATUS_FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::STATUS_QUEUED;

    fn ok() -> ActionOutcome {
        ActionOutcome {
            succeeded: true,
            informational_only: false,
        }
    }

    fn fatal() -> ActionOutcome {
        ActionOutcome {
            succeeded: false,
            informational_only: false,
        }
    }

    fn informational_failure() -> ActionOutcome {
        ActionOutcome {
            succeeded: false,
            informational_only: true,
        }
    }

    #[test]
    fn all_actions_succeeding_completes_the_branch() {
        assert_eq!(branch_status(&[ok(), ok(), ok()]), STATUS_COMPLETED);
    }

    #[test]
    fn one_fatal_failure_fails_the_branch() {
        assert_eq!(branch_status(&[ok(), fatal(), ok()]), STATUS_FAILED);
    }

    #[test]
    fn informational_failures_do_not_fail_the_branch() {
        assert_eq!(
            branch_status(&[ok(), informational_failure(), ok()]),
            STATUS_COMPLETED
        );
    }

    #[test]
    fn non_fatal_but_not_informational_still_fails_overall() {
        // continue_on_failure lets later actions run, but the roll-up
        // still reports the branch failed.
        assert_eq!(
            branch_status(&[fatal(), ok()]),
            STATUS_FAILED
        );
    }

    #[test]
    fn execution_runs_while_any_branch_is_open() {
        assert_eq!(
            execution_status(STATUS_RUNNING, &[STATUS_COMPLETED, STATUS_QUEUED]),
            STATUS_RUNNING
        );
    }

    #[test]
    fn execution_completes_only_when_every_branch_completes() {
        assert_eq!(
            execution_status(STATUS_RUNNING, &[STATUS_COMPLETED, STATUS_COMPLETED]),
            STATUS_COMPLETED
        );
        assert_eq!(
            execution_status(STATUS_RUNNING, &[STATUS_COMPLETED, STATUS_FAILED]),
            STATUS_FAILED
        );
    }

    #[test]
    fn cancelled_execution_is_sticky() {
        // In-flight branches finished successfully after the cancel, but
        // the execution stays cancelled.
        assert_eq!(
            execution_status(STATUS_CANCELLED, &[STATUS_COMPLETED, STATUS_COMPLETED]),
            STATUS_CANCELLED
        );
    }

    #[test]
    fn timed_out_execution_is_sticky() {
        assert_eq!(
            execution_status(STATUS_TIMED_OUT, &[STATUS_COMPLETED]),
            STATUS_TIMED_OUT
        );
    }

    #[test]
    fn spec_scenario_two_actions_two_targets() {
        // Two sequential actions, the second deliberately failing, across
        // two targets: both branches fail, so the execution fails.
        let per_branch = [ok(), fatal()];
        let b1 = branch_status(&per_branch);
        let b2 = branch_status(&per_branch);
        assert_eq!(b1, STATUS_FAILED);
        assert_eq!(b2, STATUS_FAILED);
        assert_eq!(execution_status(STATUS_RUNNING, &[b1, b2]), STATUS_FAILED);
    }
}
