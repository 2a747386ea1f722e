//! Action kinds and payload accessors.
//!
//! A job is an ordered list of actions. The kind decides both how the
//! worker executes the action and which queue its work unit lands on
//! (see [`crate::queue::QueueClass`]).

use serde::{Deserialize, Serialize};

/// The kind of a single job action.
///
/// Stored as snake_case text in `job_actions.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A single remote command line.
    Command,
    /// A multi-line script shipped to the target and executed there.
    Script,
    /// Copy a file to or from the target.
    FileTransfer,
    /// A nested sequence of actions treated as one step.
    Composite,
    /// Housekeeping work (cache cleanup, log rotation, ...).
    Maintenance,
    /// Network/service discovery probes.
    Discovery,
    /// Liveness/health probes against a target.
    HealthCheck,
}

impl ActionKind {
    /// Stable snake_case name matching the database column values.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Script => "script",
            Self::FileTransfer => "file_transfer",
            Self::Composite => "composite",
            Self::Maintenance => "maintenance",
            Self::Discovery => "discovery",
            Self::HealthCheck => "health_check",
        }
    }

    /// Parse from the database column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "command" => Some(Self::Command),
            "script" => Some(Self::Script),
            "file_transfer" => Some(Self::FileTransfer),
            "composite" => Some(Self::Composite),
            "maintenance" => Some(Self::Maintenance),
            "discovery" => Some(Self::Discovery),
            "health_check" => Some(Self::HealthCheck),
            _ => None,
        }
    }

}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a file transfer the target is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Copy `src` from the worker host to `dest` on the target.
    #[default]
    Push,
    /// Copy `src` from the target to `dest` on the worker host.
    Pull,
}

/// Parsed `file_transfer` payload: `{"src", "dest", "direction"?}`.
///
/// `direction` defaults to `push`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileTransferSpec {
    pub src: String,
    pub dest: String,
    #[serde(default)]
    pub direction: TransferDirection,
}

/// Extract the executable text from an action payload, if any.
///
/// Command and the system probe kinds (maintenance, discovery,
/// health_check) carry `{"command": "..."}`; script payloads carry
/// `{"body": "..."}`. File transfers and composites have no single
/// executable text — see [`transfer_spec`] and [`composite_commands`].
pub fn executable_text(kind: ActionKind, payload: &serde_json::Value) -> Option<&str> {
    match kind {
        ActionKind::Command
        | ActionKind::Maintenance
        | ActionKind::Discovery
        | ActionKind::HealthCheck => payload.get("command").and_then(|v| v.as_str()),
        ActionKind::Script => payload.get("body").and_then(|v| v.as_str()),
        ActionKind::FileTransfer | ActionKind::Composite => None,
    }
}

/// Parse a `file_transfer` payload.
pub fn transfer_spec(payload: &serde_json::Value) -> Result<FileTransferSpec, serde_json::Error> {
    serde_json::from_value(payload.clone())
}

/// Extract the command list from a `composite` payload:
/// `{"commands": ["...", ...]}`. `None` if the key is missing, empty,
/// or holds anything but strings.
pub fn composite_commands(payload: &serde_json::Value) -> Option<Vec<&str>> {
    let commands: Vec<&str> = payload
        .get("commands")?
        .as_array()?
        .iter()
        .map(|v| v.as_str())
        .collect::<Option<_>>()?;
    if commands.is_empty() {
        return None;
    }
    Some(commands)
}
