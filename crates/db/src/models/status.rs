//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table. Executions and
//! branches share one status set; the IDs also match the constants
//! duplicated in `overseer_core::state_machine`.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Execution lifecycle status (shared with branches).
    ExecutionStatus {
        Queued = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
        Cancelled = 5,
        TimedOut = 6,
    }
}

define_status_enum! {
    /// Branch lifecycle status. Same set and IDs as executions so the
    /// roll-up never translates.
    BranchStatus {
        Queued = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
        Cancelled = 5,
        TimedOut = 6,
    }
}

define_status_enum! {
    /// Per-action execution record status.
    ActionStatus {
        Pending = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
        /// Never ran because an earlier fatal action stopped the branch.
        Skipped = 5,
    }
}

define_status_enum! {
    /// Work unit queue status.
    WorkUnitStatus {
        Queued = 1,
        Leased = 2,
        Completed = 3,
        Failed = 4,
        Cancelled = 5,
    }
}

define_status_enum! {
    /// Worker node availability status.
    WorkerStatus {
        Idle = 1,
        Busy = 2,
        Offline = 3,
        Draining = 4,
    }
}

#[cfg(test)]
mod tests {
    use overseer_core::state_machine;

    use super::*;

    #[test]
    fn execution_status_ids_match_seed_data() {
        assert_eq!(ExecutionStatus::Queued.id(), 1);
        assert_eq!(ExecutionStatus::Running.id(), 2);
        assert_eq!(ExecutionStatus::Completed.id(), 3);
        assert_eq!(ExecutionStatus::Failed.id(), 4);
        assert_eq!(ExecutionStatus::Cancelled.id(), 5);
        assert_eq!(ExecutionStatus::TimedOut.id(), 6);
    }

    #[test]
    fn branch_ids_mirror_execution_ids() {
        assert_eq!(BranchStatus::Queued.id(), ExecutionStatus::Queued.id());
        assert_eq!(BranchStatus::Failed.id(), ExecutionStatus::Failed.id());
        assert_eq!(BranchStatus::TimedOut.id(), ExecutionStatus::TimedOut.id());
    }

    #[test]
    fn ids_match_core_state_machine_constants() {
        assert_eq!(ExecutionStatus::Queued.id(), state_machine::STATUS_QUEUED);
        assert_eq!(ExecutionStatus::Running.id(), state_machine::STATUS_RUNNING);
        assert_eq!(
            ExecutionStatus::Completed.id(),
            state_machine::STATUS_COMPLETED
        );
        assert_eq!(ExecutionStatus::Failed.id(), state_machine::STATUS_FAILED);
        assert_eq!(
            ExecutionStatus::Cancelled.id(),
            state_machine::STATUS_CANCELLED
        );
        assert_eq!(
            ExecutionStatus::TimedOut.id(),
            state_machine::STATUS_TIMED_OUT
        );
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = WorkUnitStatus::Leased.into();
        assert_eq!(id, 2);
    }
}
