//! Error types shared across the orchestration core.
//!
//! [`FailureKind`] is the structured failure taxonomy recorded on action
//! results and log entries; [`CoreError`] covers validation and lookup
//! failures in pure domain code.

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Structured taxonomy for every terminal or retriable failure produced by
/// the orchestration core.
///
/// The string form (via [`FailureKind::as_str`]) is what gets persisted on
/// `action_results.error_kind` and in log entry details, so downstream
/// consumers can distinguish transient network trouble from logic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No valid targets could be resolved for an execution.
    TargetResolution,
    /// A hierarchical serial could not be allocated.
    SerialGeneration,
    /// The action payload matched a configured deny-list pattern.
    SafetyViolation,
    /// The action payload is malformed or missing a required field.
    InvalidPayload,
    /// The target could not be reached after the configured attempts.
    Connection,
    /// The action exceeded its configured timeout.
    Timeout,
    /// A work unit exhausted its `max_attempts`.
    RetriesExhausted,
    /// An operator requested cancellation of the execution.
    CancellationRequested,
}

impl FailureKind {
    /// Stable snake_case name used in persisted rows and event payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TargetResolution => "target_resolution",
            Self::SerialGeneration => "serial_generation",
            Self::SafetyViolation => "safety_violation",
            Self::InvalidPayload => "invalid_payload",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::RetriesExhausted => "retries_exhausted",
            Self::CancellationRequested => "cancellation_requested",
        }
    }

    /// Whether the retry supervisor may re-enqueue work that failed with
    /// this kind. Safety violations and configuration errors are terminal.
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_kinds() {
        assert!(FailureKind::Connection.is_retriable());
        assert!(FailureKind::Timeout.is_retriable());
        assert!(!FailureKind::SafetyViolation.is_retriable());
        assert!(!FailureKind::InvalidPayload.is_retriable());
        assert!(!FailureKind::RetriesExhausted.is_retriable());
        assert!(!FailureKind::TargetResolution.is_retriable());
    }

    #[test]
    fn kind_round_trips_through_str() {
        assert_eq!(FailureKind::SafetyViolation.as_str(), "safety_violation");
        assert_eq!(FailureKind::Connection.to_string(), "connection");
    }
}
