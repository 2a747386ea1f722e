//! Log entry taxonomy.
//!
//! Every log entry attached to an execution or branch is tagged with a
//! phase, level, and category so audit consumers can filter without
//! parsing message text. Stored as snake_case text columns.

use serde::{Deserialize, Serialize};

/// Which lifecycle phase produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogPhase {
    Creation,
    TargetSelection,
    Authentication,
    Communication,
    ActionExecution,
    ResultCollection,
    Completion,
}

/// Severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Functional category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Authentication,
    Communication,
    CommandExecution,
    FileTransfer,
    System,
}

impl LogPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::TargetSelection => "target_selection",
            Self::Authentication => "authentication",
            Self::Communication => "communication",
            Self::ActionExecution => "action_execution",
            Self::ResultCollection => "result_collection",
            Self::Completion => "completion",
        }
    }
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl LogCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Communication => "communication",
            Self::CommandExecution => "command_execution",
            Self::FileTransfer => "file_transfer",
            Self::System => "system",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_strings_match_serde_names() {
        let phase = serde_json::to_string(&LogPhase::ActionExecution).unwrap();
        assert_eq!(phase, format!("\"{}\"", LogPhase::ActionExecution.as_str()));

        let level = serde_json::to_string(&LogLevel::Warning).unwrap();
        assert_eq!(level, format!("\"{}\"", LogLevel::Warning.as_str()));

        let category = serde_json::to_string(&LogCategory::CommandExecution).unwrap();
        assert_eq!(
            category,
            format!("\"{}\"", LogCategory::CommandExecution.as_str())
        );
    }
}
