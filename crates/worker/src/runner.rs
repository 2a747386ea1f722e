//! Action runner: executes one work unit's action window on an open
//! session and produces result drafts for persistence.

use std::path::Path;
use std::time::{Duration, Instant};

use overseer_core::action::{self, ActionKind, TransferDirection};
use overseer_core::error::FailureKind;
use overseer_core::exec::ExecOutput;
use overseer_core::rollup::ActionOutcome;
use overseer_core::safety::SafetyRules;
use overseer_db::models::job::JobAction;
use overseer_db::models::status::{ActionStatus, StatusId};

use crate::artifact::ArtifactStore;
use crate::connection::{Session, SessionError};

/// One action's result before it gets a serial and a branch id.
#[derive(Debug)]
pub struct ActionRecord {
    pub job_action_id: i64,
    pub position: i32,
    pub status_id: StatusId,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stdout_ref: Option<String>,
    pub stderr: Option<String>,
    pub stderr_ref: Option<String>,
    pub duration_ms: Option<i64>,
    pub error_kind: Option<FailureKind>,
    pub error_message: Option<String>,
    /// Copied from the job action so the roll-up does not need a join.
    pub informational_only: bool,
}

impl ActionRecord {
    pub fn outcome(&self) -> ActionOutcome {
        ActionOutcome {
            succeeded: self.status_id == ActionStatus::Completed.id(),
            informational_only: self.informational_only,
        }
    }
}

/// Executes action windows against a session.
pub struct ActionRunner {
    safety: SafetyRules,
    inline_limit: usize,
    default_timeout: Duration,
}

impl ActionRunner {
    pub fn new(safety: SafetyRules, inline_limit: usize, default_timeout: Duration) -> Self {
        Self {
            safety,
            inline_limit,
            default_timeout,
        }
    }

    /// Run `actions` in order on `session`.
    ///
    /// A fatal failure (not informational, not continue_on_failure)
    /// stops the window; later actions are recorded as skipped. Safety
    /// violations never reach the target.
    pub async fn run_window(
        &self,
        session: &dyn Session,
        actions: &[JobAction],
        artifacts: &dyn ArtifactStore,
    ) -> Vec<ActionRecord> {
        let mut records = Vec::with_capacity(actions.len());
        let mut halted = false;

        for act in actions {
            if halted {
                records.push(skipped(act));
                continue;
            }

            let record = self.run_action(session, act, artifacts).await;
            let fatal = record.status_id == ActionStatus::Failed.id()
                && !act.informational_only
                && !act.continue_on_failure;
            records.push(record);
            if fatal {
                halted = true;
            }
        }
        records
    }

    async fn run_action(
        &self,
        session: &dyn Session,
        act: &JobAction,
        artifacts: &dyn ArtifactStore,
    ) -> ActionRecord {
        let kind = match ActionKind::parse(&act.kind) {
            Some(k) => k,
            None => {
                return failed(
                    act,
                    None,
                    FailureKind::InvalidPayload,
                    format!("unknown action kind: {}", act.kind),
                );
            }
        };
        match kind {
            ActionKind::FileTransfer => self.run_transfer(session, act).await,
            ActionKind::Composite => self.run_composite(session, act, artifacts).await,
            _ => self.run_exec(session, act, artifacts, kind).await,
        }
    }

    /// Command, script, and system probe kinds: one text, one run.
    async fn run_exec(
        &self,
        session: &dyn Session,
        act: &JobAction,
        artifacts: &dyn ArtifactStore,
        kind: ActionKind,
    ) -> ActionRecord {
        let Some(text) = action::executable_text(kind, &act.payload) else {
            return failed(
                act,
                None,
                FailureKind::InvalidPayload,
                "action payload has no executable text".into(),
            );
        };

        if let Some(record) = self.deny_check(act, text) {
            return record;
        }

        match session.run(text, self.timeout_for(act)).await {
            Ok(output) => self.record_output(act, output, artifacts).await,
            Err(e) => session_failure(act, e),
        }
    }

    /// Copy a file between the worker host and the target.
    async fn run_transfer(&self, session: &dyn Session, act: &JobAction) -> ActionRecord {
        let spec = match action::transfer_spec(&act.payload) {
            Ok(spec) => spec,
            Err(e) => {
                return failed(
                    act,
                    None,
                    FailureKind::InvalidPayload,
                    format!("bad file_transfer payload: {e}"),
                );
            }
        };

        let start = Instant::now();
        let result = match spec.direction {
            TransferDirection::Push => {
                session.put_file(Path::new(&spec.src), Path::new(&spec.dest)).await
            }
            TransferDirection::Pull => {
                session.get_file(Path::new(&spec.src), Path::new(&spec.dest)).await
            }
        };
        let duration_ms = start.elapsed().as_millis() as i64;

        match result {
            Ok(()) => ActionRecord {
                job_action_id: act.id,
                position: act.position,
                status_id: ActionStatus::Completed.id(),
                exit_code: Some(0),
                stdout: Some(format!(
                    "transferred {} -> {} ({:?})",
                    spec.src, spec.dest, spec.direction
                )),
                stdout_ref: None,
                stderr: None,
                stderr_ref: None,
                duration_ms: Some(duration_ms),
                error_kind: None,
                error_message: None,
                informational_only: act.informational_only,
            },
            Err(e) => {
                let mut record = session_failure(act, e);
                record.duration_ms = record.duration_ms.or(Some(duration_ms));
                record
            }
        }
    }

    /// Run a composite's commands in order on the same session; the
    /// first non-zero exit stops the sequence and fails the action.
    async fn run_composite(
        &self,
        session: &dyn Session,
        act: &JobAction,
        artifacts: &dyn ArtifactStore,
    ) -> ActionRecord {
        let Some(commands) = action::composite_commands(&act.payload) else {
            return failed(
                act,
                None,
                FailureKind::InvalidPayload,
                "composite payload has no commands".into(),
            );
        };
        // Every step clears the deny-list before the first one runs.
        for command in &commands {
            if let Some(record) = self.deny_check(act, command) {
                return record;
            }
        }

        let timeout = self.timeout_for(act);
        let mut combined = ExecOutputAccumulator::default();
        for command in &commands {
            match session.run(command, timeout).await {
                Ok(output) => {
                    let halted = combined.absorb(output);
                    if halted {
                        break;
                    }
                }
                Err(e) => {
                    let mut record = session_failure(act, e);
                    record.duration_ms =
                        record.duration_ms.or(Some(combined.duration_ms));
                    return record;
                }
            }
        }
        self.record_output(act, combined.into_output(), artifacts).await
    }

    fn timeout_for(&self, act: &JobAction) -> Duration {
        act.timeout_secs
            .map(|s| Duration::from_secs(s.max(1) as u64))
            .unwrap_or(self.default_timeout)
    }

    /// Deny-list gate: `Some(record)` when the text is blocked.
    fn deny_check(&self, act: &JobAction, text: &str) -> Option<ActionRecord> {
        let pattern = self.safety.is_dangerous(text)?;
        tracing::warn!(
            position = act.position,
            pattern,
            "Action blocked by safety deny-list"
        );
        Some(failed(
            act,
            None,
            FailureKind::SafetyViolation,
            format!("blocked by deny-list pattern: {pattern}"),
        ))
    }

    async fn record_output(
        &self,
        act: &JobAction,
        output: ExecOutput,
        artifacts: &dyn ArtifactStore,
    ) -> ActionRecord {
        let status = if output.succeeded() {
            ActionStatus::Completed
        } else {
            ActionStatus::Failed
        };
        let (stdout, stdout_ref) = self.capture(artifacts, &output.stdout).await;
        let (stderr, stderr_ref) = self.capture(artifacts, &output.stderr).await;
        ActionRecord {
            job_action_id: act.id,
            position: act.position,
            status_id: status.id(),
            exit_code: Some(output.exit_code),
            stdout,
            stdout_ref,
            stderr,
            stderr_ref,
            duration_ms: Some(output.duration_ms as i64),
            error_kind: None,
            error_message: if output.succeeded() {
                None
            } else {
                Some(format!("exit code {}", output.exit_code))
            },
            informational_only: act.informational_only,
        }
    }

    /// Store output inline or in the artifact store, by size.
    async fn capture(
        &self,
        artifacts: &dyn ArtifactStore,
        text: &str,
    ) -> (Option<String>, Option<String>) {
        if text.len() <= self.inline_limit {
            return (Some(text.to_string()), None);
        }
        match artifacts.put(text.as_bytes()).await {
            Ok(pointer) => (None, Some(pointer)),
            Err(e) => {
                // Keep a truncated inline copy rather than losing the
                // output entirely.
                tracing::error!(error = %e, "Artifact store write failed, truncating inline");
                let truncated: String = text.chars().take(self.inline_limit).collect();
                (Some(truncated), None)
            }
        }
    }
}

/// Map a session error onto a failed record with the retry taxonomy.
fn session_failure(act: &JobAction, e: SessionError) -> ActionRecord {
    match e {
        SessionError::Timeout { elapsed_ms } => {
            let mut record = failed(
                act,
                None,
                FailureKind::Timeout,
                format!("timed out after {elapsed_ms}ms"),
            );
            record.duration_ms = Some(elapsed_ms as i64);
            record
        }
        SessionError::Transport(message) => {
            failed(act, None, FailureKind::Connection, message)
        }
    }
}

/// Folds the outputs of a composite's steps into one [`ExecOutput`].
#[derive(Default)]
struct ExecOutputAccumulator {
    stdout: String,
    stderr: String,
    exit_code: i32,
    duration_ms: i64,
}

impl ExecOutputAccumulator {
    /// Absorb one step's output; returns `true` when the step failed and
    /// the sequence must halt.
    fn absorb(&mut self, output: ExecOutput) -> bool {
        if !output.stdout.is_empty() {
            if !self.stdout.is_empty() {
                self.stdout.push('\n');
            }
            self.stdout.push_str(&output.stdout);
        }
        if !output.stderr.is_empty() {
            if !self.stderr.is_empty() {
                self.stderr.push('\n');
            }
            self.stderr.push_str(&output.stderr);
        }
        self.duration_ms += output.duration_ms as i64;
        if !output.succeeded() {
            self.exit_code = output.exit_code;
            return true;
        }
        false
    }

    fn into_output(self) -> ExecOutput {
        ExecOutput {
            stdout: self.stdout,
            stderr: self.stderr,
            exit_code: self.exit_code,
            duration_ms: self.duration_ms.max(0) as u64,
        }
    }
}

fn skipped(act: &JobAction) -> ActionRecord {
    ActionRecord {
        job_action_id: act.id,
        position: act.position,
        status_id: ActionStatus::Skipped.id(),
        exit_code: None,
        stdout: None,
        stdout_ref: None,
        stderr: None,
        stderr_ref: None,
        duration_ms: None,
        error_kind: None,
        error_message: Some("skipped after earlier fatal failure".into()),
        informational_only: act.informational_only,
    }
}

fn failed(
    act: &JobAction,
    exit_code: Option<i32>,
    kind: FailureKind,
    message: String,
) -> ActionRecord {
    ActionRecord {
        job_action_id: act.id,
        position: act.position,
        status_id: ActionStatus::Failed.id(),
        exit_code,
        stdout: None,
        stdout_ref: None,
        stderr: None,
        stderr_ref: None,
        duration_ms: None,
        error_kind: Some(kind),
        error_message: Some(message),
        informational_only: act.informational_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use overseer_core::exec::ExecOutput;
    use crate::artifact::{ArtifactError, ArtifactStore};

    /// Scripted session: maps command text to canned outputs.
    struct FakeSession {
        outputs: HashMap<String, Result<ExecOutput, String>>,
        calls: Mutex<Vec<String>>,
        transfers: Mutex<Vec<String>>,
        fail_transfers: bool,
    }

    impl FakeSession {
        fn new() -> Self {
            Self {
                outputs: HashMap::new(),
                calls: Mutex::new(Vec::new()),
                transfers: Mutex::new(Vec::new()),
                fail_transfers: false,
            }
        }

        fn ok(mut self, command: &str, exit_code: i32, stdout: &str) -> Self {
            self.outputs.insert(
                command.to_string(),
                Ok(ExecOutput {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    exit_code,
                    duration_ms: 5,
                }),
            );
            self
        }

        fn timeout(mut self, command: &str) -> Self {
            self.outputs
                .insert(command.to_string(), Err("timeout".to_string()));
            self
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        async fn run(
            &self,
            command: &str,
            _timeout: Duration,
        ) -> Result<ExecOutput, SessionError> {
            self.calls.lock().unwrap().push(command.to_string());
            match self.outputs.get(command) {
                Some(Ok(output)) => Ok(output.clone()),
                Some(Err(_)) => Err(SessionError::Timeout { elapsed_ms: 1000 }),
                None => Err(SessionError::Transport(format!(
                    "no canned output for: {command}"
                ))),
            }
        }

        async fn put_file(&self, local: &Path, remote: &Path) -> Result<(), SessionError> {
            if self.fail_transfers {
                return Err(SessionError::Transport("transfer refused".into()));
            }
            self.transfers
                .lock()
                .unwrap()
                .push(format!("put {} {}", local.display(), remote.display()));
            Ok(())
        }

        async fn get_file(&self, remote: &Path, local: &Path) -> Result<(), SessionError> {
            if self.fail_transfers {
                return Err(SessionError::Transport("transfer refused".into()));
            }
            self.transfers
                .lock()
                .unwrap()
                .push(format!("get {} {}", remote.display(), local.display()));
            Ok(())
        }
    }

    /// In-memory store, counts writes.
    struct MemArtifacts {
        writes: Mutex<Vec<Vec<u8>>>,
    }

    impl MemArtifacts {
        fn new() -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ArtifactStore for MemArtifacts {
        async fn put(&self, bytes: &[u8]) -> Result<String, ArtifactError> {
            let mut writes = self.writes.lock().unwrap();
            writes.push(bytes.to_vec());
            Ok(format!("mem:{}", writes.len() - 1))
        }

        async fn get(&self, pointer: &str) -> Result<Vec<u8>, ArtifactError> {
            let idx: usize = pointer.trim_start_matches("mem:").parse().unwrap();
            Ok(self.writes.lock().unwrap()[idx].clone())
        }
    }

    fn action(id: i64, position: i32, kind: &str, payload: serde_json::Value) -> JobAction {
        JobAction {
            id,
            job_id: 1,
            position,
            kind: kind.into(),
            payload,
            timeout_secs: Some(30),
            continue_on_failure: false,
            informational_only: false,
            parallel_safe: false,
            created_at: Utc::now(),
        }
    }

    fn command_action(id: i64, position: i32, command: &str) -> JobAction {
        action(id, position, "command", serde_json::json!({"command": command}))
    }

    fn runner() -> ActionRunner {
        ActionRunner::new(
            SafetyRules::default_rules(),
            1024,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn successful_window_records_all_actions() {
        let session = FakeSession::new()
            .ok("echo one", 0, "one")
            .ok("echo two", 0, "two");
        let actions = [
            command_action(1, 1, "echo one"),
            command_action(2, 2, "echo two"),
        ];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.status_id == ActionStatus::Completed.id()));
        assert_eq!(records[0].stdout.as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn fatal_failure_skips_the_rest_of_the_window() {
        let session = FakeSession::new()
            .ok("echo one", 0, "one")
            .ok("false", 1, "");
        let actions = [
            command_action(1, 1, "echo one"),
            command_action(2, 2, "false"),
            command_action(3, 3, "echo never"),
        ];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[1].status_id, ActionStatus::Failed.id());
        assert_eq!(records[2].status_id, ActionStatus::Skipped.id());
        // The skipped command was never sent to the session.
        assert!(!session.calls.lock().unwrap().contains(&"echo never".to_string()));
    }

    #[tokio::test]
    async fn continue_on_failure_runs_later_actions_but_window_still_fails() {
        let session = FakeSession::new()
            .ok("false", 1, "")
            .ok("echo after", 0, "after");
        let mut first = command_action(1, 1, "false");
        first.continue_on_failure = true;
        let actions = [first, command_action(2, 2, "echo after")];

        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].status_id, ActionStatus::Failed.id());
        assert_eq!(records[1].status_id, ActionStatus::Completed.id());
        let outcomes: Vec<_> = records.iter().map(|r| r.outcome()).collect();
        assert_eq!(
            overseer_core::rollup::branch_status(&outcomes),
            overseer_core::state_machine::STATUS_FAILED
        );
    }

    #[tokio::test]
    async fn informational_failure_does_not_halt_or_fail() {
        let session = FakeSession::new()
            .ok("false", 1, "")
            .ok("echo after", 0, "after");
        let mut first = command_action(1, 1, "false");
        first.informational_only = true;
        let actions = [first, command_action(2, 2, "echo after")];

        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[1].status_id, ActionStatus::Completed.id());
        let outcomes: Vec<_> = records.iter().map(|r| r.outcome()).collect();
        assert_eq!(
            overseer_core::rollup::branch_status(&outcomes),
            overseer_core::state_machine::STATUS_COMPLETED
        );
    }

    #[tokio::test]
    async fn dangerous_command_is_blocked_before_the_session() {
        let session = FakeSession::new();
        let actions = [command_action(1, 1, "rm -rf / --no-preserve-root")];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].status_id, ActionStatus::Failed.id());
        assert_eq!(records[0].error_kind, Some(FailureKind::SafetyViolation));
        assert!(session.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn timeout_maps_to_timeout_failure_kind() {
        let session = FakeSession::new().timeout("sleep 999");
        let actions = [command_action(1, 1, "sleep 999")];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].error_kind, Some(FailureKind::Timeout));
        assert!(records[0].error_kind.unwrap().is_retriable());
    }

    #[tokio::test]
    async fn file_transfer_goes_through_the_session() {
        let session = FakeSession::new();
        let actions = [action(
            1,
            1,
            "file_transfer",
            serde_json::json!({"src": "/tmp/build.tar", "dest": "/opt/build.tar"}),
        )];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].status_id, ActionStatus::Completed.id());
        assert_eq!(records[0].exit_code, Some(0));
        assert_eq!(records[0].error_kind, None);
        assert_eq!(
            session.transfers.lock().unwrap().as_slice(),
            ["put /tmp/build.tar /opt/build.tar"]
        );
    }

    #[tokio::test]
    async fn pull_transfer_copies_from_the_target() {
        let session = FakeSession::new();
        let actions = [action(
            1,
            1,
            "file_transfer",
            serde_json::json!({"src": "/var/log/app.log", "dest": "/tmp/app.log", "direction": "pull"}),
        )];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].status_id, ActionStatus::Completed.id());
        assert_eq!(
            session.transfers.lock().unwrap().as_slice(),
            ["get /var/log/app.log /tmp/app.log"]
        );
    }

    #[tokio::test]
    async fn failed_transfer_maps_to_connection_failure() {
        let mut session = FakeSession::new();
        session.fail_transfers = true;
        let actions = [action(
            1,
            1,
            "file_transfer",
            serde_json::json!({"src": "/a", "dest": "/b"}),
        )];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].status_id, ActionStatus::Failed.id());
        assert_eq!(records[0].error_kind, Some(FailureKind::Connection));
        assert!(records[0].error_kind.unwrap().is_retriable());
    }

    #[tokio::test]
    async fn malformed_transfer_payload_is_invalid_not_a_safety_violation() {
        let session = FakeSession::new();
        let actions = [action(
            1,
            1,
            "file_transfer",
            serde_json::json!({"src": "/a"}),
        )];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].status_id, ActionStatus::Failed.id());
        assert_eq!(records[0].error_kind, Some(FailureKind::InvalidPayload));
        assert!(session.transfers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn composite_runs_steps_in_order_and_merges_output() {
        let session = FakeSession::new()
            .ok("systemctl stop app", 0, "stopped")
            .ok("systemctl start app", 0, "started");
        let actions = [action(
            1,
            1,
            "composite",
            serde_json::json!({"commands": ["systemctl stop app", "systemctl start app"]}),
        )];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].status_id, ActionStatus::Completed.id());
        assert_eq!(records[0].stdout.as_deref(), Some("stopped\nstarted"));
        assert_eq!(
            session.calls.lock().unwrap().as_slice(),
            ["systemctl stop app", "systemctl start app"]
        );
    }

    #[tokio::test]
    async fn composite_halts_at_the_first_failing_step() {
        let session = FakeSession::new()
            .ok("step-one", 1, "")
            .ok("step-two", 0, "never");
        let actions = [action(
            1,
            1,
            "composite",
            serde_json::json!({"commands": ["step-one", "step-two"]}),
        )];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].status_id, ActionStatus::Failed.id());
        assert_eq!(records[0].exit_code, Some(1));
        assert_eq!(session.calls.lock().unwrap().as_slice(), ["step-one"]);
    }

    #[tokio::test]
    async fn composite_with_a_dangerous_step_never_reaches_the_session() {
        let session = FakeSession::new().ok("echo fine", 0, "fine");
        let actions = [action(
            1,
            1,
            "composite",
            serde_json::json!({"commands": ["echo fine", "rm -rf / --no-preserve-root"]}),
        )];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].error_kind, Some(FailureKind::SafetyViolation));
        assert!(session.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn system_probe_kinds_run_their_command() {
        for kind in ["maintenance", "discovery", "health_check"] {
            let session = FakeSession::new().ok("probe", 0, "ok");
            let actions = [action(1, 1, kind, serde_json::json!({"command": "probe"}))];
            let records = runner()
                .run_window(&session, &actions, &MemArtifacts::new())
                .await;

            assert_eq!(
                records[0].status_id,
                ActionStatus::Completed.id(),
                "{kind} should execute its probe command"
            );
        }
    }

    #[tokio::test]
    async fn unknown_kind_is_an_invalid_payload() {
        let session = FakeSession::new();
        let actions = [action(1, 1, "teleport", serde_json::json!({}))];
        let records = runner()
            .run_window(&session, &actions, &MemArtifacts::new())
            .await;

        assert_eq!(records[0].error_kind, Some(FailureKind::InvalidPayload));
        assert!(!records[0].error_kind.unwrap().is_retriable());
        assert!(session.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_output_goes_to_the_artifact_store() {
        let big = "x".repeat(4096);
        let session = FakeSession::new().ok("cat big", 0, &big);
        let actions = [command_action(1, 1, "cat big")];
        let artifacts = MemArtifacts::new();
        let records = runner().run_window(&session, &actions, &artifacts).await;

        assert!(records[0].stdout.is_none());
        let pointer = records[0].stdout_ref.as_deref().expect("pointer");
        let stored = artifacts.get(pointer).await.expect("stored");
        assert_eq!(stored.len(), 4096);
    }
}
