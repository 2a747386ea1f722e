//! Local subprocess execution primitives.
//!
//! [`run_process`] is the shared spawn + I/O + timeout path used by the
//! worker's local transport for command, script, and health-check
//! actions. Remote transports (SSH, WinRM) implement the same contract
//! behind the worker's `Session` trait.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated to prevent memory exhaustion
/// from extremely verbose actions.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// What to spawn and under which constraints.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Additional environment variables for the child process.
    pub env: Vec<(String, String)>,
    /// Working directory (current dir if `None`).
    pub cwd: Option<String>,
    /// Bytes piped to the child's stdin, then closed.
    pub stdin: Option<Vec<u8>>,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

impl ExecSpec {
    /// A bare spec with no env, cwd, or stdin.
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            cwd: None,
            stdin: None,
            timeout,
        }
    }
}

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Complete stdout (UTF-8 lossy, capped at [`MAX_OUTPUT_BYTES`]).
    pub stdout: String,
    /// Complete stderr (UTF-8 lossy, capped at [`MAX_OUTPUT_BYTES`]).
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ExecOutput {
    /// Whether the process exited cleanly with code 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors from spawning or supervising the process.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The process exceeded its timeout and was killed.
    #[error("Process timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// An I/O error occurred while spawning or communicating.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Spawn the process described by `spec`, pipe stdin, capture
/// stdout/stderr, and enforce the timeout.
///
/// `kill_on_drop(true)` guarantees the child is killed when the timeout
/// fires and the handle is dropped.
pub async fn run_process(spec: &ExecSpec) -> Result<ExecOutput, ExecError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Some(bytes) = &spec.stdin {
            // Best-effort write; if the process closes stdin early,
            // ignore the error.
            let _ = stdin.write_all(bytes).await;
        }
        drop(stdin);
    }

    // Read stdout/stderr in spawned tasks so `child.wait()` can borrow
    // the child mutably at the same time.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    match tokio::time::timeout(spec.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            Ok(ExecOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(ExecError::Io(e)),
        Err(_elapsed) => {
            // Timeout expired. Dropping `child` kills the process because
            // of kill_on_drop(true).
            Err(ExecError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at
/// [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn bash(script: &str, timeout: Duration) -> ExecSpec {
        ExecSpec::new(
            "bash",
            vec!["-c".to_string(), script.to_string()],
            timeout,
        )
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = run_process(&bash("echo hi", Duration::from_secs(5)))
            .await
            .expect("run");
        assert_eq!(out.exit_code, 0);
        assert!(out.succeeded());
        assert_eq!(out.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn captures_nonzero_exit() {
        let out = run_process(&bash("echo oops >&2; exit 42", Duration::from_secs(5)))
            .await
            .expect("run");
        assert_eq!(out.exit_code, 42);
        assert!(!out.succeeded());
        assert!(out.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn kills_on_timeout() {
        let result = run_process(&bash("sleep 60", Duration::from_millis(200))).await;
        assert_matches!(result, Err(ExecError::Timeout { .. }));
    }

    #[tokio::test]
    async fn pipes_stdin() {
        let mut spec = bash("cat", Duration::from_secs(5));
        spec.stdin = Some(b"payload".to_vec());
        let out = run_process(&spec).await.expect("run");
        assert_eq!(out.stdout, "payload");
    }

    #[tokio::test]
    async fn applies_env_vars() {
        let mut spec = bash("echo $OVERSEER_TEST_VAR", Duration::from_secs(5));
        spec.env.push(("OVERSEER_TEST_VAR".to_string(), "set".to_string()));
        let out = run_process(&spec).await.expect("run");
        assert_eq!(out.stdout.trim(), "set");
    }

    #[tokio::test]
    async fn applies_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut spec = bash("pwd", Duration::from_secs(5));
        spec.cwd = Some(dir.path().to_str().expect("path").to_string());
        let out = run_process(&spec).await.expect("run");
        // The resolved path may differ due to symlinks, so canonicalize.
        let expected = dir.path().canonicalize().expect("canonicalize");
        assert_eq!(out.stdout.trim(), expected.to_str().expect("path"));
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let spec = ExecSpec::new(
            "definitely-not-a-real-binary",
            vec![],
            Duration::from_secs(1),
        );
        assert_matches!(run_process(&spec).await, Err(ExecError::Io(_)));
    }
}
