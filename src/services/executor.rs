//! Sandboxed execution of generated code units.
//!
//! Each run stages the code unit in a fresh temporary directory and executes
//! it with the configured interpreter in its own process group, under a hard
//! wall-clock budget. Stdout and stderr are captured up to a per-stream byte
//! cap; past the cap the streams are still drained so the child never blocks
//! on a full pipe. Cleanup is unconditional on every exit path: the temp
//! directory is removed on drop, the process group is killed on timeout or
//! cancellation, and `kill_on_drop` reaps anything that slips through.
//!
//! The executor never retries; retry policy belongs to the controller.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::errors::SandboxError;
use crate::domain::models::{ExecutionReport, ExecutorConfig, ProcessOutcome};

/// Name the code unit is staged under inside its sandbox directory.
const UNIT_FILE_NAME: &str = "analysis.py";

/// Runs code units in isolated subprocesses.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    config: ExecutorConfig,
}

impl SandboxExecutor {
    /// Create an executor with the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Execute one code unit and report how it went.
    ///
    /// Returns `Err` only for infrastructure faults (staging or spawning);
    /// every way the code itself can fail - non-zero exit, timeout,
    /// cancellation, empty unit - comes back as an `ExecutionReport` with
    /// `succeeded = false`.
    pub async fn run(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, SandboxError> {
        if code.trim().is_empty() {
            debug!("empty code unit, nothing to run");
            return Ok(ExecutionReport::nothing_to_run());
        }

        let started = Instant::now();

        let dir = tempfile::Builder::new()
            .prefix("hepcode-run-")
            .tempdir()
            .map_err(SandboxError::Stage)?;
        let script = dir.path().join(UNIT_FILE_NAME);
        tokio::fs::write(&script, code)
            .await
            .map_err(SandboxError::Stage)?;

        let mut cmd = Command::new(&self.config.interpreter);
        cmd.args(&self.config.interpreter_args)
            .arg(&script)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
            command: self.config.interpreter.clone(),
            source,
        })?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::Stage(std::io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SandboxError::Stage(std::io::Error::other("stderr not captured")))?;

        let cap = self.config.max_output_bytes;
        let stdout_task = tokio::spawn(read_capped(stdout, cap));
        let stderr_task = tokio::spawn(read_capped(stderr, cap));

        let budget = Duration::from_secs(self.config.timeout_secs);
        let waited = tokio::select! {
            status = child.wait() => WaitEvent::Exited(status),
            () = tokio::time::sleep(budget) => WaitEvent::TimedOut,
            () = cancel.cancelled() => WaitEvent::Cancelled,
        };

        let outcome = match waited {
            WaitEvent::Exited(status) => {
                let status = status.map_err(SandboxError::Wait)?;
                ProcessOutcome::Exited { code: exit_code(&status) }
            }
            WaitEvent::TimedOut => {
                warn!(timeout_secs = self.config.timeout_secs, "code unit exceeded time budget, killing");
                kill_group(pid, &mut child).await;
                ProcessOutcome::TimedOut
            }
            WaitEvent::Cancelled => {
                warn!("session cancelled, killing in-flight code unit");
                kill_group(pid, &mut child).await;
                ProcessOutcome::Cancelled
            }
        };

        let (stdout_text, stdout_truncated) = stdout_task.await.unwrap_or_default();
        let (stderr_text, stderr_truncated) = stderr_task.await.unwrap_or_default();

        let report = ExecutionReport {
            succeeded: outcome.is_success(),
            outcome,
            stdout: stdout_text,
            stderr: stderr_text,
            truncated: stdout_truncated || stderr_truncated,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        debug!(
            succeeded = report.succeeded,
            outcome = ?report.outcome,
            truncated = report.truncated,
            duration_ms = report.duration_ms,
            "sandbox run finished"
        );

        Ok(report)
    }
}

/// How the wait on the child resolved, before any cleanup.
enum WaitEvent {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Map an exit status to a code, folding a fatal signal into `128 + signo`.
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status
            .code()
            .or_else(|| status.signal().map(|s| 128 + s))
            .unwrap_or(-1)
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(-1)
    }
}

/// Kill the child's whole process group, then the child itself as a fallback.
async fn kill_group(pid: Option<u32>, child: &mut Child) {
    #[cfg(unix)]
    if let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(raw), Signal::SIGKILL);
    }
    #[cfg(not(unix))]
    let _ = pid;
    let _ = child.kill().await;
}

/// Read a stream to EOF, keeping at most `cap` bytes and flagging truncation.
async fn read_capped<R: AsyncRead + Unpin>(mut stream: R, cap: usize) -> (String, bool) {
    let mut kept: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut truncated = false;

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if kept.len() < cap {
                    let take = n.min(cap - kept.len());
                    kept.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    // Past the cap: discard, but keep draining the pipe.
                    truncated = true;
                }
            }
        }
    }

    (String::from_utf8_lossy(&kept).into_owned(), truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_unit_is_a_failure_without_spawning() {
        let executor = SandboxExecutor::new(ExecutorConfig::default());
        let report = executor
            .run("   \n\t ", &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.succeeded);
        assert_eq!(report.outcome, ProcessOutcome::NothingToRun);
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_an_infrastructure_fault() {
        let executor = SandboxExecutor::new(ExecutorConfig {
            interpreter: "hepcode-no-such-interpreter".to_string(),
            ..ExecutorConfig::default()
        });
        let err = executor
            .run("echo hi", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_read_capped_flags_and_drains_excess() {
        let data = vec![b'x'; 10_000];
        let (text, truncated) = read_capped(&data[..], 100).await;
        assert_eq!(text.len(), 100);
        assert!(truncated);
    }

    #[tokio::test]
    async fn test_read_capped_under_cap() {
        let data = b"short output".to_vec();
        let (text, truncated) = read_capped(&data[..], 100).await;
        assert_eq!(text, "short output");
        assert!(!truncated);
    }
}
