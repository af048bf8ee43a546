//! Parent side of non-blocking validation: spawn a detached child that
//! re-executes the validator, with its streams redirected to the per-run
//! log file. The parent never waits; it returns as soon as the spawn
//! completes (well under the 100 ms budget).

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::info;

use crate::store::RunStore;

/// Spawn the detached background validator.
///
/// `exe` is the validator binary (normally `std::env::current_exe()`), and
/// `args` its full argument list; the child is expected to write the PID
/// file, create and update the run record under `run_id`, and finalize it
/// on exit. Returns the child's process id.
pub fn fork_validation(
    store: &RunStore,
    run_id: &str,
    exe: &PathBuf,
    args: &[String],
) -> Result<u32> {
    store.ensure_dirs()?;
    let log_path = store.log_path(run_id);
    let log = std::fs::File::create(&log_path)
        .with_context(|| format!("create run log {}", log_path.display()))?;
    let log_err = log.try_clone().context("clone log handle for stderr")?;

    let mut cmd = Command::new(exe);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));

    // Detach: new session so the child survives the parent (and the hook's
    // terminal) going away.
    // SAFETY: setsid() is async-signal-safe and runs before exec.
    #[cfg(unix)]
    unsafe {
        use std::os::unix::process::CommandExt;
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let child = cmd
        .spawn()
        .with_context(|| format!("fork validation child {}", exe.display()))?;
    let pid = child.id();
    // The Child handle is dropped without waiting; cleanup_zombies reaps it
    // later if this process is still around.
    drop(child);

    info!(run_id = %run_id, pid, "forked background validator");
    Ok(pid)
}
