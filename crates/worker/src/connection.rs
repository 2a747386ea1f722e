//! Target connection seam.
//!
//! The runner talks to targets through [`Session`]; [`Connector`] opens
//! sessions by transport name. The built-in [`LocalConnector`] executes
//! on the worker host itself, which is what the `local` transport and
//! the test suite use. SSH/WinRM transports plug in behind the same
//! traits.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use overseer_core::exec::{self, ExecError, ExecOutput, ExecSpec};
use overseer_orchestrator::ResolvedTarget;

/// Delay between connection attempts.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Unknown connection method: {0}")]
    UnknownMethod(String),

    #[error("Connection to {hostname} failed: {message}")]
    Failed { hostname: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Command timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<ExecError> for SessionError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Timeout { elapsed_ms } => Self::Timeout { elapsed_ms },
            ExecError::Io(io) => Self::Transport(io.to_string()),
        }
    }
}

/// An open session against one target.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run one command under the given timeout and capture its output.
    async fn run(&self, command: &str, timeout: Duration) -> Result<ExecOutput, SessionError>;

    /// Copy a file from the worker host onto the target.
    async fn put_file(&self, local: &Path, remote: &Path) -> Result<(), SessionError>;

    /// Copy a file from the target onto the worker host.
    async fn get_file(&self, remote: &Path, local: &Path) -> Result<(), SessionError>;
}

/// Opens sessions for one transport.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &ResolvedTarget) -> Result<Box<dyn Session>, ConnectError>;
}

// ---------------------------------------------------------------------------
// Local transport
// ---------------------------------------------------------------------------

/// Executes on the worker host through a shell.
pub struct LocalConnector;

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self, _target: &ResolvedTarget) -> Result<Box<dyn Session>, ConnectError> {
        Ok(Box::new(LocalSession))
    }
}

/// Session over the local shell.
pub struct LocalSession;

#[async_trait]
impl Session for LocalSession {
    async fn run(&self, command: &str, timeout: Duration) -> Result<ExecOutput, SessionError> {
        let spec = ExecSpec::new(
            "bash",
            vec!["-c".to_string(), command.to_string()],
            timeout,
        );
        Ok(exec::run_process(&spec).await?)
    }

    // On the local transport both sides of a transfer are the worker
    // host, so push and pull are the same copy.
    async fn put_file(&self, local: &Path, remote: &Path) -> Result<(), SessionError> {
        copy_local(local, remote).await
    }

    async fn get_file(&self, remote: &Path, local: &Path) -> Result<(), SessionError> {
        copy_local(remote, local).await
    }
}

async fn copy_local(from: &Path, to: &Path) -> Result<(), SessionError> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
    }
    tokio::fs::copy(from, to)
        .await
        .map(|_| ())
        .map_err(|e| SessionError::Transport(format!("copy {} -> {}: {e}", from.display(), to.display())))
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Routes targets to connectors by transport name and retries transient
/// connection failures.
pub struct ConnectionManager {
    connectors: HashMap<String, Arc<dyn Connector>>,
    attempts: u32,
}

impl ConnectionManager {
    /// A manager with only the `local` transport registered.
    pub fn new(attempts: u32) -> Self {
        let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
        connectors.insert("local".to_string(), Arc::new(LocalConnector));
        Self {
            connectors,
            attempts: attempts.max(1),
        }
    }

    /// Register a transport under a `connection_method` name.
    pub fn register(&mut self, method: impl Into<String>, connector: Arc<dyn Connector>) {
        self.connectors.insert(method.into(), connector);
    }

    /// Open a session, retrying up to the configured attempt count.
    pub async fn open(&self, target: &ResolvedTarget) -> Result<Box<dyn Session>, ConnectError> {
        let connector = self
            .connectors
            .get(&target.connection_method)
            .ok_or_else(|| ConnectError::UnknownMethod(target.connection_method.clone()))?;

        let mut last_err = None;
        for attempt in 1..=self.attempts {
            match connector.connect(target).await {
                Ok(session) => return Ok(session),
                Err(e @ ConnectError::UnknownMethod(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        target_serial = %target.serial,
                        hostname = %target.hostname,
                        attempt,
                        attempts = self.attempts,
                        error = %e,
                        "Connection attempt failed"
                    );
                    last_err = Some(e);
                    if attempt < self.attempts {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ConnectError::Failed {
            hostname: target.hostname.clone(),
            message: "no connection attempts made".into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_target() -> ResolvedTarget {
        ResolvedTarget {
            id: 1,
            serial: "T0001".into(),
            hostname: "localhost".into(),
            connection_method: "local".into(),
            credentials_ref: None,
        }
    }

    #[tokio::test]
    async fn local_session_runs_commands() {
        let manager = ConnectionManager::new(1);
        let session = manager.open(&local_target()).await.expect("connect");
        let out = session
            .run("echo hello", Duration::from_secs(5))
            .await
            .expect("run");
        assert!(out.succeeded());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn local_session_copies_files_both_ways() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src.txt");
        tokio::fs::write(&src, b"payload").await.expect("write");

        let session = LocalSession;
        let pushed = dir.path().join("out/pushed.txt");
        session.put_file(&src, &pushed).await.expect("put");
        let pulled = dir.path().join("pulled.txt");
        session.get_file(&pushed, &pulled).await.expect("get");
        assert_eq!(tokio::fs::read(&pulled).await.expect("read"), b"payload");

        assert!(matches!(
            session.put_file(&dir.path().join("missing"), &pulled).await,
            Err(SessionError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn unknown_method_fails_without_retry() {
        let manager = ConnectionManager::new(3);
        let mut target = local_target();
        target.connection_method = "telepathy".into();
        assert!(matches!(
            manager.open(&target).await,
            Err(ConnectError::UnknownMethod(_))
        ));
    }
}
