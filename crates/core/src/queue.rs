//! Queue classification, priority model, retry backoff, and work unit
//! window planning.
//!
//! This module is the pure half of the Queue Dispatcher: everything here
//! is deterministic over a job's action list and needs no database.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::action::ActionKind;

// ---------------------------------------------------------------------------
// Priority constants
// ---------------------------------------------------------------------------

/// Priority value for low-urgency jobs. Dispatched last.
pub const PRIORITY_LOW: i32 = -10;

/// Priority value for normal jobs. Default.
pub const PRIORITY_NORMAL: i32 = 0;

/// Priority value for high-urgency jobs.
pub const PRIORITY_HIGH: i32 = 10;

/// Priority value for critical jobs. Dispatched before all others.
pub const PRIORITY_CRITICAL: i32 = 20;

// ---------------------------------------------------------------------------
// Queue classes
// ---------------------------------------------------------------------------

/// Which queue a work unit is dispatched on.
///
/// Target I/O rides the `execution` queue; maintenance, discovery, and
/// health probes ride the `system` queue so they can never starve live
/// executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueClass {
    Execution,
    System,
}

impl QueueClass {
    /// Stable snake_case name matching the `work_units.queue_class` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::System => "system",
        }
    }

    /// Parse from the database column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "execution" => Some(Self::Execution),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Explicit mapping from action kind to queue class.
    pub fn for_action(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Command
            | ActionKind::Script
            | ActionKind::FileTransfer
            | ActionKind::Composite => Self::Execution,
            ActionKind::Maintenance | ActionKind::Discovery | ActionKind::HealthCheck => {
                Self::System
            }
        }
    }

    /// Cap a job priority for this queue class.
    ///
    /// System-queue work is capped at [`PRIORITY_NORMAL`] regardless of the
    /// job's configured priority.
    pub fn cap_priority(self, job_priority: i32) -> i32 {
        match self {
            Self::Execution => job_priority,
            Self::System => job_priority.min(PRIORITY_NORMAL),
        }
    }
}

impl std::fmt::Display for QueueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Retry backoff
// ---------------------------------------------------------------------------

/// Compute the exponential backoff delay before attempt `attempt + 1`.
///
/// `base * 2^attempt`, saturating, capped at `cap`. `attempt` is the number
/// of deliveries already made (so the first retry after attempt 1 waits
/// `base * 2`).
pub fn retry_backoff(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

// ---------------------------------------------------------------------------
// Work unit window planning
// ---------------------------------------------------------------------------

/// A step in a branch's dispatch plan, as seen by the planner.
#[derive(Debug, Clone, Copy)]
pub struct PlannedAction {
    /// 1-based order index within the branch.
    pub position: i32,
    pub kind: ActionKind,
    /// Whether the job marked this action safe to run concurrently with
    /// its parallel-safe neighbours.
    pub parallel_safe: bool,
}

/// A contiguous window of actions dispatched as one work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitWindow {
    /// First action position in the window (inclusive).
    pub action_from: i32,
    /// Last action position in the window (inclusive).
    pub action_to: i32,
    /// Dispatch stage: all windows of stage N must complete before any
    /// window of stage N+1 is enqueued. Windows sharing a stage may run
    /// concurrently.
    pub stage: u32,
    pub class: QueueClass,
}

/// Plan the work unit windows for one branch.
///
/// Default is one unit covering the whole branch. Runs of parallel-safe
/// actions are split into one single-action unit each, all sharing a
/// stage so they may be leased concurrently; surrounding sequential
/// actions are grouped into shared windows on their own stages.
///
/// A window's queue class is `system` if any action in it is system-class.
pub fn plan_unit_windows(actions: &[PlannedAction]) -> Vec<UnitWindow> {
    let mut windows = Vec::new();
    let mut stage = 0u32;
    let mut i = 0;

    while i < actions.len() {
        if actions[i].parallel_safe {
            // Maximal run of parallel-safe actions: one unit per action,
            // all in the same stage.
            while i < actions.len() && actions[i].parallel_safe {
                windows.push(UnitWindow {
                    action_from: actions[i].position,
                    action_to: actions[i].position,
                    stage,
                    class: QueueClass::for_action(actions[i].kind),
                });
                i += 1;
            }
            stage += 1;
        } else {
            // Maximal run of sequential actions: one shared unit.
            let from = actions[i].position;
            let mut class = QueueClass::Execution;
            let mut to = from;
            while i < actions.len() && !actions[i].parallel_safe {
                to = actions[i].position;
                if QueueClass::for_action(actions[i].kind) == QueueClass::System {
                    class = QueueClass::System;
                }
                i += 1;
            }
            windows.push(UnitWindow {
                action_from: from,
                action_to: to,
                stage,
                class,
            });
            stage += 1;
        }
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(position: i32, kind: ActionKind) -> PlannedAction {
        PlannedAction {
            position,
            kind,
            parallel_safe: false,
        }
    }

    fn par(position: i32, kind: ActionKind) -> PlannedAction {
        PlannedAction {
            position,
            kind,
            parallel_safe: true,
        }
    }

    #[test]
    fn target_io_maps_to_execution_queue() {
        assert_eq!(
            QueueClass::for_action(ActionKind::Command),
            QueueClass::Execution
        );
        assert_eq!(
            QueueClass::for_action(ActionKind::FileTransfer),
            QueueClass::Execution
        );
    }

    #[test]
    fn housekeeping_maps_to_system_queue() {
        assert_eq!(
            QueueClass::for_action(ActionKind::Maintenance),
            QueueClass::System
        );
        assert_eq!(
            QueueClass::for_action(ActionKind::Discovery),
            QueueClass::System
        );
        assert_eq!(
            QueueClass::for_action(ActionKind::HealthCheck),
            QueueClass::System
        );
    }

    #[test]
    fn system_queue_caps_priority_at_normal() {
        assert_eq!(
            QueueClass::System.cap_priority(PRIORITY_CRITICAL),
            PRIORITY_NORMAL
        );
        assert_eq!(QueueClass::System.cap_priority(PRIORITY_LOW), PRIORITY_LOW);
        assert_eq!(
            QueueClass::Execution.cap_priority(PRIORITY_CRITICAL),
            PRIORITY_CRITICAL
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(30);
        let cap = Duration::from_secs(900);
        assert_eq!(retry_backoff(base, 0, cap), Duration::from_secs(30));
        assert_eq!(retry_backoff(base, 1, cap), Duration::from_secs(60));
        assert_eq!(retry_backoff(base, 2, cap), Duration::from_secs(120));
        assert_eq!(retry_backoff(base, 5, cap), Duration::from_secs(900));
        // No overflow for absurd attempt counts.
        assert_eq!(retry_backoff(base, 64, cap), cap);
    }

    #[test]
    fn all_sequential_actions_yield_a_single_window() {
        let actions = [
            seq(1, ActionKind::Command),
            seq(2, ActionKind::Script),
            seq(3, ActionKind::FileTransfer),
        ];
        let windows = plan_unit_windows(&actions);
        assert_eq!(
            windows,
            vec![UnitWindow {
                action_from: 1,
                action_to: 3,
                stage: 0,
                class: QueueClass::Execution,
            }]
        );
    }

    #[test]
    fn parallel_run_splits_into_per_action_units_sharing_a_stage() {
        let actions = [
            seq(1, ActionKind::Command),
            par(2, ActionKind::Command),
            par(3, ActionKind::Command),
            seq(4, ActionKind::Command),
        ];
        let windows = plan_unit_windows(&actions);
        assert_eq!(windows.len(), 4);
        assert_eq!((windows[0].action_from, windows[0].action_to), (1, 1));
        assert_eq!(windows[0].stage, 0);
        assert_eq!(windows[1].stage, 1);
        assert_eq!(windows[2].stage, 1);
        assert_eq!((windows[3].action_from, windows[3].action_to), (4, 4));
        assert_eq!(windows[3].stage, 2);
    }

    #[test]
    fn window_with_any_system_action_routes_to_system_queue() {
        let actions = [
            seq(1, ActionKind::Command),
            seq(2, ActionKind::Maintenance),
        ];
        let windows = plan_unit_windows(&actions);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].class, QueueClass::System);
    }

    #[test]
    fn empty_action_list_yields_no_windows() {
        assert!(plan_unit_windows(&[]).is_empty());
    }
}
