//! Child-process invocation: process-group isolation, piped capture, and
//! graceful-then-forceful timeout kills enforced from the parent side.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::warn;

use crate::resolver::Invocation;

/// Grace period between SIGTERM and SIGKILL on timeout.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Raw outcome of one child invocation.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// Exit code; 1 when the child was signal-killed without a code.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

/// Run a resolved invocation with extra arguments and a hard timeout.
///
/// The child runs in its own process group so a timeout kill takes its
/// descendants with it. On timeout the group receives SIGTERM, then SIGKILL
/// after a short grace period, and `timed_out` is set; callers synthesize
/// the timeout `ValidationResult` from that flag.
pub async fn run_with_timeout(
    invocation: &Invocation,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
    search_path: Option<&OsStr>,
) -> Result<ExecOutcome> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.prefix_args)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(path) = search_path {
        cmd.env("PATH", path);
    }

    // Isolate the child in its own process group so group-wide signals
    // cannot reach the parent.
    // SAFETY: setsid() is async-signal-safe and runs before exec.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let start = Instant::now();
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {}", invocation.program.display()))?;

    let stdout = child.stdout.take().context("child stdout not piped")?;
    let stderr = child.stderr.take().context("child stderr not piped")?;
    // Drain both pipes concurrently with the wait so a chatty child can
    // never deadlock on a full pipe buffer.
    let stdout_task = tokio::spawn(read_to_end(stdout));
    let stderr_task = tokio::spawn(read_to_end(stderr));

    let (status, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => (Some(status.context("failed to wait for child")?), false),
        Err(_) => {
            warn!(
                program = %invocation.program.display(),
                timeout_secs = timeout.as_secs(),
                "tool exceeded its timeout; terminating"
            );
            terminate(&mut child).await;
            (None, true)
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let exit_code = match status {
        Some(status) => status.code().unwrap_or(1),
        None => 1,
    };

    Ok(ExecOutcome {
        exit_code,
        stdout,
        stderr,
        duration: start.elapsed(),
        timed_out,
    })
}

async fn read_to_end(mut stream: impl tokio::io::AsyncRead + Unpin) -> String {
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

/// SIGTERM the child's process group, give it a grace period, then SIGKILL.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: kill() is async-signal-safe; the negative PID targets
            // the process group created by setsid in pre_exec.
            unsafe {
                libc::kill(-(pid as i32), libc::SIGTERM);
            }
            if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
                return;
            }
            // SAFETY: as above; escalation after the grace period.
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
            let _ = child.wait().await;
            return;
        }
    }

    let _ = child.kill().await;
}
